use crate::catalog::Field;
use crate::extract::SENTINEL;
use serde::{Deserialize, Serialize};

/// One product extracted from a listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub title: String,
    pub price: String,
    pub image: String,
    pub link: String,
    pub rating: String,
    pub reviews: String,

    /// Name of the site the product was listed on
    pub site: String,
}

impl ProductRecord {
    /// A record for `site` with every field unresolved
    pub fn unresolved(site: &str) -> Self {
        Self {
            title: SENTINEL.to_string(),
            price: SENTINEL.to_string(),
            image: SENTINEL.to_string(),
            link: SENTINEL.to_string(),
            rating: SENTINEL.to_string(),
            reviews: SENTINEL.to_string(),
            site: site.to_string(),
        }
    }

    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Price => &self.price,
            Field::Image => &self.image,
            Field::Link => &self.link,
            Field::Rating => &self.rating,
            Field::Reviews => &self.reviews,
        }
    }

    pub(crate) fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Price => &mut self.price,
            Field::Image => &mut self.image,
            Field::Link => &mut self.link,
            Field::Rating => &mut self.rating,
            Field::Reviews => &mut self.reviews,
        };
        *slot = value;
    }

    /// True when no field could be resolved
    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|f| self.field(*f) == SENTINEL)
    }
}

/// How a site's pagination ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SiteOutcome {
    /// No further pages, or the page bound was reached
    Exhausted,
    /// Stopped on an error; records from earlier pages are kept
    Failed(String),
}

/// Per-site accounting of a run
#[derive(Debug, Clone, Serialize)]
pub struct SiteSummary {
    pub site: String,
    pub pages: usize,
    pub records: usize,
    pub outcome: SiteOutcome,
}

/// Everything a run produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunOutcome {
    /// Records in discovery order
    pub records: Vec<ProductRecord>,
    pub sites: Vec<SiteSummary>,
}

impl RunOutcome {
    pub fn failed_sites(&self) -> impl Iterator<Item = &SiteSummary> {
        self.sites
            .iter()
            .filter(|s| matches!(s.outcome, SiteOutcome::Failed(_)))
    }
}
