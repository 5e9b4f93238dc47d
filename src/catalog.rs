use crate::error::{Result, ScrapeError};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// One logical field of a product record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Title,
    Price,
    Image,
    Link,
    Rating,
    Reviews,
}

impl Field {
    /// All fields, in record order
    pub const ALL: [Field; 6] = [
        Field::Title,
        Field::Price,
        Field::Image,
        Field::Link,
        Field::Rating,
        Field::Reviews,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Price => "price",
            Field::Image => "image",
            Field::Link => "link",
            Field::Rating => "rating",
            Field::Reviews => "reviews",
        }
    }

    /// Attribute read instead of text content, if any
    pub fn attribute(&self) -> Option<&'static str> {
        match self {
            Field::Image => Some("src"),
            Field::Link => Some("href"),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a site exposes further result pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaginationStrategy {
    /// A "next" control that navigates to the following page
    NextControl,
    /// Content appended below as the page is scrolled
    InfiniteScroll,
    /// Single page only
    None,
}

/// Ordered candidate selectors for every field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldSelectors {
    #[serde(default)]
    pub title: Vec<String>,
    #[serde(default)]
    pub price: Vec<String>,
    #[serde(default)]
    pub image: Vec<String>,
    #[serde(default)]
    pub link: Vec<String>,
    #[serde(default)]
    pub rating: Vec<String>,
    #[serde(default)]
    pub reviews: Vec<String>,
}

impl FieldSelectors {
    /// Candidate selectors for a field, most specific first
    pub fn candidates(&self, field: Field) -> &[String] {
        match field {
            Field::Title => &self.title,
            Field::Price => &self.price,
            Field::Image => &self.image,
            Field::Link => &self.link,
            Field::Rating => &self.rating,
            Field::Reviews => &self.reviews,
        }
    }
}

/// Static description of one listing site
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteDescriptor {
    /// Name used in logs and on every record
    pub name: String,

    /// First listing page
    pub url: String,

    pub pagination_type: PaginationStrategy,

    /// Control clicked to reach the next page (NextControl only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_selector: Option<String>,

    /// Upper bound on listing pages visited
    pub max_pages: usize,

    /// Selector matching one container element per listed product
    pub container_selector: String,

    /// Cookie banner button dismissed after the first navigation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_selector: Option<String>,

    pub selectors: FieldSelectors,
}

impl SiteDescriptor {
    /// Check the invariants a descriptor must hold before a run starts
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(ScrapeError::Config(format!("site {}: {}", self.name, msg)));

        if self.name.trim().is_empty() {
            return Err(ScrapeError::Config("site with an empty name".to_string()));
        }
        if let Err(e) = Url::parse(&self.url) {
            return fail(format!("invalid url {}: {}", self.url, e));
        }
        if self.max_pages == 0 {
            return fail("maxPages must be positive".to_string());
        }
        if self.container_selector.trim().is_empty() {
            return fail("containerSelector is empty".to_string());
        }
        match (self.pagination_type, &self.next_page_selector) {
            (PaginationStrategy::NextControl, None) => {
                return fail("NextControl pagination requires nextPageSelector".to_string());
            }
            (PaginationStrategy::InfiniteScroll | PaginationStrategy::None, Some(_)) => {
                return fail(format!(
                    "nextPageSelector is only valid with NextControl, not {:?}",
                    self.pagination_type
                ));
            }
            _ => {}
        }
        for field in Field::ALL {
            if self.selectors.candidates(field).is_empty() {
                return fail(format!("no candidate selectors for {}", field));
            }
        }
        Ok(())
    }
}

/// Immutable, ordered set of sites scraped in one run
#[derive(Debug, Clone)]
pub struct SiteCatalog {
    sites: Vec<SiteDescriptor>,
}

impl SiteCatalog {
    /// Build a catalog, validating every descriptor
    pub fn new(sites: Vec<SiteDescriptor>) -> Result<Self> {
        if sites.is_empty() {
            return Err(ScrapeError::Config("the site catalog is empty".to_string()));
        }
        for (i, site) in sites.iter().enumerate() {
            site.validate()?;
            if sites[..i].iter().any(|s| s.name == site.name) {
                return Err(ScrapeError::Config(format!("duplicate site name {}", site.name)));
            }
        }
        Ok(Self { sites })
    }

    /// Sites shipped with the crate
    pub fn builtin() -> Self {
        Self {
            sites: vec![
                amazon_bestsellers(),
                amazon_new_releases(),
                aliexpress_deals(),
            ],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteDescriptor> {
        self.sites.iter()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&SiteDescriptor> {
        self.sites.iter().find(|s| s.name == name)
    }

    /// Keep only the named sites, in catalog order
    pub fn restrict_to(&self, names: &[String]) -> Result<Self> {
        if let Some(unknown) = names.iter().find(|n| self.get(n).is_none()) {
            return Err(ScrapeError::Config(format!("unknown site {}", unknown)));
        }
        let sites = self
            .sites
            .iter()
            .filter(|s| names.contains(&s.name))
            .cloned()
            .collect();
        Self::new(sites)
    }

    /// Lower every site's page bound to at most `max_pages`
    pub fn with_page_cap(&self, max_pages: usize) -> Result<Self> {
        let sites = self
            .sites
            .iter()
            .cloned()
            .map(|mut s| {
                s.max_pages = s.max_pages.min(max_pages);
                s
            })
            .collect();
        Self::new(sites)
    }
}

fn selectors(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn amazon_bestsellers() -> SiteDescriptor {
    SiteDescriptor {
        name: "amazon-es-bestsellers".to_string(),
        url: "https://www.amazon.es/gp/bestsellers".to_string(),
        pagination_type: PaginationStrategy::NextControl,
        next_page_selector: Some("ul.a-pagination li.a-last a".to_string()),
        max_pages: 2,
        container_selector: "div#gridItemRoot".to_string(),
        consent_selector: Some("#sp-cc-accept".to_string()),
        selectors: amazon_selectors(),
    }
}

fn amazon_new_releases() -> SiteDescriptor {
    SiteDescriptor {
        name: "amazon-es-new-releases".to_string(),
        url: "https://www.amazon.es/gp/new-releases".to_string(),
        pagination_type: PaginationStrategy::None,
        next_page_selector: None,
        max_pages: 1,
        container_selector: "div#gridItemRoot".to_string(),
        consent_selector: Some("#sp-cc-accept".to_string()),
        selectors: amazon_selectors(),
    }
}

fn amazon_selectors() -> FieldSelectors {
    FieldSelectors {
        title: selectors(&[
            "div.p13n-sc-truncate-desktop-type2",
            "div._cDEzb_p13n-sc-css-line-clamp-3_g3dy1",
            "div[class*='p13n-sc-css-line-clamp']",
            "a.a-link-normal span div",
        ]),
        price: selectors(&[
            "span._cDEzb_p13n-sc-price_3mJ9Z",
            "span.p13n-sc-price",
            "span.a-color-price",
            ".a-price .a-offscreen",
        ]),
        image: selectors(&["img.p13n-product-image", "img.a-dynamic-image", "img"]),
        link: selectors(&["a.a-link-normal[href*='/dp/']", "a.a-link-normal"]),
        rating: selectors(&[
            "i.a-icon-star-small span.a-icon-alt",
            "i.a-icon-star span.a-icon-alt",
            "span.a-icon-alt",
        ]),
        reviews: selectors(&[
            "a[href*='product-reviews'] span.a-size-small",
            "div.a-icon-row span.a-size-small",
            "span.a-size-small",
        ]),
    }
}

fn aliexpress_deals() -> SiteDescriptor {
    SiteDescriptor {
        name: "aliexpress-es-deals".to_string(),
        url: "https://es.aliexpress.com/w/wholesale-ofertas.html".to_string(),
        pagination_type: PaginationStrategy::InfiniteScroll,
        next_page_selector: None,
        max_pages: 8,
        container_selector: "div.search-item-card-wrapper-gallery".to_string(),
        consent_selector: Some("button.btn-accept".to_string()),
        selectors: FieldSelectors {
            title: selectors(&["h3.multi--titleText--nXeOvyr", "div[title]", "h3"]),
            price: selectors(&["div.multi--price-sale--U-S0jtj", "div[class*='price-sale']"]),
            image: selectors(&["img.images--item--3XZa6xf", "img"]),
            link: selectors(&["a.search-card-item", "a"]),
            rating: selectors(&["span.multi--evaluation--3dK0gUK", "div[class*='evaluation']"]),
            reviews: selectors(&["span.multi--trade--Ktbl2jB", "span[class*='trade']"]),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn next_control_site() -> SiteDescriptor {
        SiteDescriptor {
            name: "shop".to_string(),
            url: "https://shop.example/list".to_string(),
            pagination_type: PaginationStrategy::NextControl,
            next_page_selector: Some("a.next".to_string()),
            max_pages: 3,
            container_selector: "li.item".to_string(),
            consent_selector: None,
            selectors: FieldSelectors {
                title: selectors(&["h2"]),
                price: selectors(&[".price"]),
                image: selectors(&["img"]),
                link: selectors(&["a"]),
                rating: selectors(&[".rating"]),
                reviews: selectors(&[".reviews"]),
            },
        }
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = SiteCatalog::builtin();
        assert!(SiteCatalog::new(catalog.iter().cloned().collect()).is_ok());
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_next_control_requires_selector() {
        let mut site = next_control_site();
        site.next_page_selector = None;
        assert!(matches!(site.validate(), Err(ScrapeError::Config(_))));
    }

    #[test]
    fn test_zero_max_pages_rejected() {
        let mut site = next_control_site();
        site.max_pages = 0;
        assert!(site.validate().is_err());
    }

    #[test]
    fn test_scroll_site_rejects_next_selector() {
        let mut site = next_control_site();
        site.pagination_type = PaginationStrategy::InfiniteScroll;
        assert!(site.validate().is_err());
        site.next_page_selector = None;
        assert!(site.validate().is_ok());
    }

    #[test]
    fn test_descriptor_from_json() {
        let json = r#"{
            "name": "shop",
            "url": "https://shop.example/list",
            "paginationType": "NextControl",
            "nextPageSelector": "a.next",
            "maxPages": 3,
            "containerSelector": "li.item",
            "selectors": {
                "title": ["h2", "h3"],
                "price": [".price"],
                "image": ["img"],
                "link": ["a"],
                "rating": [".rating"],
                "reviews": [".reviews"]
            }
        }"#;
        let site: SiteDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(site.pagination_type, PaginationStrategy::NextControl);
        assert_eq!(site.selectors.candidates(Field::Title), ["h2", "h3"]);
        assert!(site.validate().is_ok());
    }

    #[test]
    fn test_restrict_and_cap() {
        let catalog = SiteCatalog::builtin();
        let only = catalog
            .restrict_to(&["aliexpress-es-deals".to_string()])
            .unwrap();
        assert_eq!(only.len(), 1);

        let capped = catalog.with_page_cap(1).unwrap();
        assert!(capped.iter().all(|s| s.max_pages == 1));

        assert!(catalog.restrict_to(&["nowhere".to_string()]).is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let site = next_control_site();
        assert!(SiteCatalog::new(vec![site.clone(), site]).is_err());
    }
}
