use crate::categorize::{Categorizer, Category};
use crate::config::ReportFormat;
use crate::error::Result;
use crate::results::ProductRecord;
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CSV_HEADER: &str = "Title,Price,Image,Link,Rating,Reviews,Site,Category";

/// Worksheet the spreadsheet report is written to
pub const SHEET_NAME: &str = "Products";

/// Records sharing a category, in discovery order
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryGroup<'a> {
    pub category: Category,
    pub records: Vec<&'a ProductRecord>,
}

/// Group records by category
///
/// Groups appear in the order their category is first seen; records keep
/// their relative order inside each group.
pub fn group_by_category<'a>(
    records: &'a [ProductRecord],
    categorizer: &Categorizer,
) -> Vec<CategoryGroup<'a>> {
    let mut groups: Vec<CategoryGroup<'a>> = Vec::new();
    for record in records {
        let category = categorizer.categorize(record);
        match groups.iter_mut().find(|g| g.category == category) {
            Some(group) => group.records.push(record),
            None => groups.push(CategoryGroup {
                category,
                records: vec![record],
            }),
        }
    }
    groups
}

/// Column values of one report row, in `CSV_HEADER` order
fn row_values<'r>(record: &'r ProductRecord, categorizer: &Categorizer) -> [&'r str; 8] {
    [
        &record.title,
        &record.price,
        &record.image,
        &record.link,
        &record.rating,
        &record.reviews,
        &record.site,
        categorizer.categorize(record).label(),
    ]
}

/// Comma-joined rows, one per record in record order. Values are not escaped.
pub fn to_csv(records: &[ProductRecord], categorizer: &Categorizer) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for record in records {
        out.push_str(&row_values(record, categorizer).join(","));
        out.push('\n');
    }
    out
}

pub fn to_markdown(groups: &[CategoryGroup<'_>], title: &str) -> String {
    let mut out = format!("# {}\n", title);
    for group in groups {
        out.push_str(&format!("\n## {}\n", group.category));
        for record in &group.records {
            out.push_str(&format!("\n### {}\n\n", record.title));
            out.push_str(&format!("- Price: {}\n", record.price));
            out.push_str(&format!("- Rating: {}\n", record.rating));
            out.push_str(&format!("- Reviews: {}\n", record.reviews));
            out.push_str(&format!("- Image: {}\n", record.image));
            out.push_str(&format!("- Link: {}\n", record.link));
            out.push_str(&format!("- Site: {}\n", record.site));
        }
    }
    out
}

#[derive(Serialize)]
struct ReportRow<'a> {
    #[serde(flatten)]
    record: &'a ProductRecord,
    category: Category,
}

pub fn to_json(records: &[ProductRecord], categorizer: &Categorizer) -> Result<String> {
    let rows: Vec<ReportRow<'_>> = records
        .iter()
        .map(|record| ReportRow {
            record,
            category: categorizer.categorize(record),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

/// One sheet with a bold header row and the CSV columns, every cell a string
pub fn write_xlsx(path: &Path, records: &[ProductRecord], categorizer: &Categorizer) -> Result<()> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, name) in CSV_HEADER.split(',').enumerate() {
        sheet.write_string_with_format(0, col as u16, name, &bold)?;
    }
    for (i, record) in records.iter().enumerate() {
        let row = i as u32 + 1;
        for (col, value) in row_values(record, categorizer).into_iter().enumerate() {
            sheet.write_string(row, col as u16, value)?;
        }
    }

    workbook.save(path)?;
    Ok(())
}

fn file_name(format: ReportFormat) -> &'static str {
    match format {
        ReportFormat::Csv => "products.csv",
        ReportFormat::Markdown => "products.md",
        ReportFormat::Json => "products.json",
        ReportFormat::Xlsx => "products.xlsx",
    }
}

/// Write one file per requested format into `dir`, returning the paths written
pub fn write_reports(
    dir: &Path,
    formats: &[ReportFormat],
    records: &[ProductRecord],
    categorizer: &Categorizer,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(formats.len());
    for &format in formats {
        let path = dir.join(file_name(format));
        match format {
            ReportFormat::Csv => fs::write(&path, to_csv(records, categorizer))?,
            ReportFormat::Markdown => {
                let groups = group_by_category(records, categorizer);
                fs::write(&path, to_markdown(&groups, "Product report"))?
            }
            ReportFormat::Json => fs::write(&path, to_json(records, categorizer)?)?,
            ReportFormat::Xlsx => write_xlsx(&path, records, categorizer)?,
        }
        ::log::info!("Wrote {} record(s) to {}", records.len(), path.display());
        written.push(path);
    }
    Ok(written)
}
