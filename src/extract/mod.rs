pub mod normalize;


use crate::catalog::{Field, FieldSelectors};
use crate::drivers::PageDriver;
use crate::error::DriverResult;
use crate::results::ProductRecord;
use crate::utils::resolve_reference;
use std::future::Future;
use url::Url;

/// Value of any field that could not be resolved
pub const SENTINEL: &str = "N/A";

/// Try each candidate selector in order and return the first usable value
///
/// A candidate is usable when `attempt` finds an element and the value is
/// non-empty after `normalize`. Read errors count as a miss.
pub async fn try_in_order<'c, F, Fut, N>(
    candidates: &'c [String],
    mut attempt: F,
    normalize: N,
) -> Option<String>
where
    F: FnMut(&'c str) -> Fut,
    Fut: Future<Output = DriverResult<Option<String>>>,
    N: Fn(&str) -> String,
{
    for selector in candidates {
        match attempt(selector.as_str()).await {
            Ok(Some(raw)) => {
                let value = normalize(&raw);
                if !value.is_empty() {
                    return Some(value);
                }
                ::log::trace!("Selector {} matched an empty value", selector);
            }
            Ok(None) => ::log::trace!("Selector {} matched nothing", selector),
            Err(e) => ::log::trace!("Selector {} read failed: {}", selector, e),
        }
    }
    None
}

/// Resolves the fields of a product from its container element
pub struct FieldExtractor<'a, D: PageDriver> {
    driver: &'a D,
    selectors: &'a FieldSelectors,
    base_url: Option<Url>,
}

impl<'a, D: PageDriver> FieldExtractor<'a, D> {
    pub fn new(driver: &'a D, selectors: &'a FieldSelectors) -> Self {
        Self {
            driver,
            selectors,
            base_url: None,
        }
    }

    /// Page URL relative image and link references are resolved against
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = Url::parse(url).ok();
        self
    }

    fn normalize(&self, field: Field, raw: &str) -> String {
        match field {
            Field::Price => normalize::normalize_price(&normalize::sanitize_text(raw)),
            Field::Image | Field::Link => {
                let raw = raw.trim();
                if raw.is_empty() {
                    String::new()
                } else {
                    resolve_reference(raw, self.base_url.as_ref())
                }
            }
            _ => normalize::sanitize_text(raw),
        }
    }

    /// Value of one field, or the sentinel when no candidate resolves
    pub async fn extract_field(&self, container: &D::Element, field: Field) -> String {
        let driver = self.driver;
        let resolved = try_in_order(
            self.selectors.candidates(field),
            |selector| async move {
                match field.attribute() {
                    Some(name) => driver.read_attribute(container, selector, name).await,
                    None => driver.read_text(container, selector).await,
                }
            },
            |raw| self.normalize(field, raw),
        )
        .await;

        resolved.unwrap_or_else(|| {
            ::log::trace!("Field {} unresolved, using {}", field, SENTINEL);
            SENTINEL.to_string()
        })
    }

    /// Build a record from every field of `container`
    pub async fn extract_record(&self, container: &D::Element, site: &str) -> ProductRecord {
        let mut record = ProductRecord::unresolved(site);
        for field in Field::ALL {
            let value = self.extract_field(container, field).await;
            record.set(field, value);
        }
        record
    }
}
