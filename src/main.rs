use clap::Parser;
use shelf_scout::categorize::Categorizer;
use shelf_scout::report::write_reports;
use shelf_scout::results::{RunOutcome, SiteOutcome};
use shelf_scout::{Result, ScrapeConfig, ScrapeOrchestrator, SiteCatalog, SnapshotDriver};
use std::path::PathBuf;
use std::process::ExitCode;

mod args;
use args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ::log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => {
            ::log::info!("Loading configuration from {}", path.display());
            ScrapeConfig::from_file(path)?
        }
        None => ScrapeConfig::default(),
    };
    apply_overrides(&mut config, &args);
    config.validate()?;

    let catalog = select_sites(config.catalog()?, &args)?;

    if args.list_sites {
        for site in catalog.iter() {
            println!(
                "{}\t{:?}\t{} page(s)\t{}",
                site.name, site.pagination_type, site.max_pages, site.url
            );
        }
        return Ok(());
    }

    let outcome = match &args.snapshots {
        Some(dir) => {
            ::log::info!("Replaying snapshots from {}", dir.display());
            let driver = SnapshotDriver::from_dir(dir)?;
            ScrapeOrchestrator::new(driver, catalog, config.clone()).run().await
        }
        None => {
            println!("Note: Live scraping requires a WebDriver server (e.g., ChromeDriver).");
            println!(
                "Set WEBDRIVER_URL environment variable if not using the default http://localhost:4444"
            );
            shelf_scout::scrape_with_webdriver(config.clone(), catalog).await?
        }
    };

    log_summary(&outcome);

    let written = write_reports(
        &PathBuf::from(&config.output_dir),
        &config.formats,
        &outcome.records,
        &Categorizer::default(),
    )?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

/// Command-line values win over the environment, which wins over the file
fn apply_overrides(config: &mut ScrapeConfig, args: &Args) {
    // Override the WebDriver URL with an environment variable if provided
    if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
        if !webdriver_url.is_empty() {
            config.webdriver_url = webdriver_url;
        }
    }
    if let Some(url) = &args.webdriver_url {
        config.webdriver_url = url.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.display().to_string();
    }
    if !args.formats.is_empty() {
        config.formats = args.formats.clone();
    }
}

fn select_sites(catalog: SiteCatalog, args: &Args) -> Result<SiteCatalog> {
    let catalog = if args.sites.is_empty() {
        catalog
    } else {
        catalog.restrict_to(&args.sites)?
    };
    match args.max_pages {
        Some(max_pages) => catalog.with_page_cap(max_pages),
        None => Ok(catalog),
    }
}

fn log_summary(outcome: &RunOutcome) {
    for site in &outcome.sites {
        match &site.outcome {
            SiteOutcome::Exhausted => ::log::info!(
                "{}: {} record(s), {} page(s)",
                site.site,
                site.records,
                site.pages
            ),
            SiteOutcome::Failed(reason) => ::log::warn!(
                "{}: {} record(s), {} page(s), stopped early: {}",
                site.site,
                site.records,
                site.pages,
                reason
            ),
        }
    }
    ::log::info!(
        "{} record(s) in total, {} site(s) failed",
        outcome.records.len(),
        outcome.failed_sites().count()
    );
}
