pub mod catalog;
pub mod categorize;
pub mod config;
pub mod drivers;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod pagination;
pub mod report;
pub mod results;
pub mod utils;

// Re-export commonly used types for convenience
pub use catalog::{PaginationStrategy, SiteCatalog, SiteDescriptor};
pub use categorize::{Categorizer, Category};
pub use config::ScrapeConfig;
pub use drivers::{PageDriver, SnapshotDriver, WebDriverSession};
pub use error::{Result, ScrapeError};
pub use orchestrator::ScrapeOrchestrator;
pub use results::{ProductRecord, RunOutcome};

/// Run `catalog` in a fresh WebDriver session
///
/// Only a session that cannot be opened fails the call; everything else is
/// reported through the returned outcome.
pub async fn scrape_with_webdriver(config: ScrapeConfig, catalog: SiteCatalog) -> Result<RunOutcome> {
    let session = WebDriverSession::connect(&config).await?;
    Ok(ScrapeOrchestrator::new(session, catalog, config).run().await)
}
