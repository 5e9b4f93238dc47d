use crate::catalog::{SiteCatalog, SiteDescriptor};
use crate::error::{Result, ScrapeError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Readiness the driver waits for after a navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WaitPolicy {
    /// `document.readyState == "complete"`
    #[default]
    Load,
    /// `document.readyState` is `interactive` or `complete`
    DomContentLoaded,
}

/// Inclusive bounds of the randomized delay between pages, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min: u64,
    pub max: u64,
}

impl DelayRange {
    pub fn fixed(ms: u64) -> Self {
        Self { min: ms, max: ms }
    }
}

/// Output formats the report writer can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Csv,
    Markdown,
    Json,
    Xlsx,
}

/// Settings for one scraping run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeConfig {
    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// User agent the session identifies with
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Bound on a page navigation
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    #[serde(default)]
    pub wait_policy: WaitPolicy,

    /// Bound on waiting for containers or the consent banner
    #[serde(default = "default_content_timeout_ms")]
    pub content_timeout_ms: u64,

    /// Bound on extracting a single container
    #[serde(default = "default_item_timeout_ms")]
    pub item_timeout_ms: u64,

    /// Pause after each scroll before measuring the page again
    #[serde(default = "default_scroll_settle_ms")]
    pub scroll_settle_ms: u64,

    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: DelayRange,

    #[serde(default = "default_site_delay_ms")]
    pub site_delay_ms: u64,

    /// Extra attempts for a page load before the site is given up
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    #[serde(default = "default_formats")]
    pub formats: Vec<ReportFormat>,

    /// Sites to scrape; the built-in catalog when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sites: Option<Vec<SiteDescriptor>>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            user_agent: default_user_agent(),
            headless: default_headless(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            wait_policy: WaitPolicy::default(),
            content_timeout_ms: default_content_timeout_ms(),
            item_timeout_ms: default_item_timeout_ms(),
            scroll_settle_ms: default_scroll_settle_ms(),
            page_delay_ms: default_page_delay_ms(),
            site_delay_ms: default_site_delay_ms(),
            retries: default_retries(),
            output_dir: default_output_dir(),
            formats: default_formats(),
            sites: None,
        }
    }
}

impl ScrapeConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_delay_ms.min > self.page_delay_ms.max {
            return Err(ScrapeError::Config(format!(
                "pageDelayMs.min ({}) exceeds pageDelayMs.max ({})",
                self.page_delay_ms.min, self.page_delay_ms.max
            )));
        }
        if self.navigation_timeout_ms == 0 || self.content_timeout_ms == 0 || self.item_timeout_ms == 0 {
            return Err(ScrapeError::Config("timeouts must be positive".to_string()));
        }
        if let Some(sites) = &self.sites {
            for site in sites {
                site.validate()?;
            }
        }
        Ok(())
    }

    /// The configured sites, or the built-in ones
    pub fn catalog(&self) -> Result<SiteCatalog> {
        match &self.sites {
            Some(sites) => SiteCatalog::new(sites.clone()),
            None => Ok(SiteCatalog::builtin()),
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn content_timeout(&self) -> Duration {
        Duration::from_millis(self.content_timeout_ms)
    }

    pub fn item_timeout(&self) -> Duration {
        Duration::from_millis(self.item_timeout_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn site_delay(&self) -> Duration {
        Duration::from_millis(self.site_delay_ms)
    }
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36"
        .to_string()
}

fn default_headless() -> bool {
    true
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

fn default_content_timeout_ms() -> u64 {
    15_000
}

fn default_item_timeout_ms() -> u64 {
    5_000
}

fn default_scroll_settle_ms() -> u64 {
    1_500
}

fn default_page_delay_ms() -> DelayRange {
    DelayRange {
        min: 1_000,
        max: 3_000,
    }
}

fn default_site_delay_ms() -> u64 {
    5_000
}

fn default_retries() -> u32 {
    2
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_formats() -> Vec<ReportFormat> {
    vec![
        ReportFormat::Csv,
        ReportFormat::Markdown,
        ReportFormat::Json,
        ReportFormat::Xlsx,
    ]
}
