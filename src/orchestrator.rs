use crate::catalog::{SiteCatalog, SiteDescriptor};
use crate::config::ScrapeConfig;
use crate::drivers::PageDriver;
use crate::error::{Result, ScrapeError};
use crate::extract::FieldExtractor;
use crate::pagination::{PaginationController, PaginationSettings};
use crate::results::{ProductRecord, RunOutcome, SiteOutcome, SiteSummary};
use crate::utils::{pause, random_delay};
use futures::future::join_all;

/// Mutable bookkeeping of one run
#[derive(Debug, Default)]
struct RunState {
    site_index: usize,
    records: Vec<ProductRecord>,
    summaries: Vec<SiteSummary>,
}

/// Runs a scrape over every site of a catalog with one page driver
///
/// The driver session belongs to the orchestrator for the whole run and is
/// closed when [`run`](Self::run) returns.
pub struct ScrapeOrchestrator<D: PageDriver> {
    driver: D,
    catalog: SiteCatalog,
    config: ScrapeConfig,
}

impl<D: PageDriver> ScrapeOrchestrator<D> {
    pub fn new(driver: D, catalog: SiteCatalog, config: ScrapeConfig) -> Self {
        Self {
            driver,
            catalog,
            config,
        }
    }

    /// Scrape every site in catalog order and release the session
    ///
    /// A failing site is logged and skipped; the outcome always carries the
    /// records gathered from the sites and pages that did work.
    pub async fn run(self) -> RunOutcome {
        let start_time = std::time::Instant::now();
        ::log::info!("Starting scrape of {} site(s)", self.catalog.len());

        if let Err(e) = self.driver.set_identity(&self.config.user_agent).await {
            ::log::warn!("Could not set the user agent: {}", e);
        }

        let state = self.scrape_sites().await;

        if let Err(e) = self.driver.close().await {
            ::log::warn!("Failed to close the driver session: {}", e);
        }

        ::log::info!(
            "Scrape complete - {} record(s) from {} site(s) in {:.2} seconds",
            state.records.len(),
            state.summaries.len(),
            start_time.elapsed().as_secs_f64()
        );

        RunOutcome {
            records: state.records,
            sites: state.summaries,
        }
    }

    async fn scrape_sites(&self) -> RunState {
        let mut state = RunState::default();

        for site in self.catalog.iter() {
            if state.site_index > 0 {
                pause(self.config.site_delay()).await;
            }
            state.site_index += 1;
            ::log::info!(
                "Site {}/{}: {} ({})",
                state.site_index,
                self.catalog.len(),
                site.name,
                site.url
            );

            let before = state.records.len();
            let mut controller = PaginationController::new(site, PaginationSettings::from(&self.config));
            let result = self.scrape_site(site, &mut controller, &mut state.records).await;

            let outcome = match result {
                Ok(()) => SiteOutcome::Exhausted,
                Err(e) => {
                    let fatal = ScrapeError::SiteFatal {
                        site: site.name.clone(),
                        reason: e.to_string(),
                    };
                    ::log::error!("{}", fatal);
                    SiteOutcome::Failed(e.to_string())
                }
            };
            let summary = SiteSummary {
                site: site.name.clone(),
                pages: controller.page(),
                records: state.records.len() - before,
                outcome,
            };
            ::log::info!(
                "{}: {} record(s) from {} page(s)",
                summary.site,
                summary.records,
                summary.pages
            );
            state.summaries.push(summary);
        }

        state
    }

    /// Drive one site's pagination to its end, appending records page by page
    async fn scrape_site(
        &self,
        site: &SiteDescriptor,
        controller: &mut PaginationController<'_>,
        records: &mut Vec<ProductRecord>,
    ) -> Result<()> {
        controller.load(&self.driver).await?;
        loop {
            let containers = controller.containers(&self.driver).await?;
            let page_records = self.extract_page(site, controller.page(), &containers).await;
            ::log::debug!(
                "{}: page {} yielded {} record(s)",
                site.name,
                controller.page(),
                page_records.len()
            );
            records.extend(page_records);

            if !controller.advance(&self.driver).await? {
                break;
            }
            pause(random_delay(self.config.page_delay_ms)).await;
            controller.load(&self.driver).await?;
        }
        debug_assert!(controller.state().is_terminal());
        Ok(())
    }

    /// Extract every container of the loaded page concurrently, keeping page order
    async fn extract_page(
        &self,
        site: &SiteDescriptor,
        page: usize,
        containers: &[D::Element],
    ) -> Vec<ProductRecord> {
        let mut extractor = FieldExtractor::new(&self.driver, &site.selectors);
        match self.driver.current_url().await {
            Ok(url) => extractor = extractor.with_base_url(&url),
            Err(e) => ::log::debug!("{}: page URL unavailable: {}", site.name, e),
        }
        let extractor = &extractor;
        let item_timeout = self.config.item_timeout();

        let items = containers.iter().enumerate().map(|(index, container)| async move {
            match tokio::time::timeout(item_timeout, extractor.extract_record(container, &site.name)).await {
                Ok(record) => {
                    if record.is_empty() {
                        ::log::debug!(
                            "{}: item {} on page {} resolved no field, keeping it",
                            site.name,
                            index,
                            page
                        );
                    }
                    Some(record)
                }
                Err(_) => {
                    let error = ScrapeError::ItemExtraction {
                        site: site.name.clone(),
                        page,
                        index,
                        reason: format!("no result within {:?}", item_timeout),
                    };
                    ::log::warn!("{}", error);
                    None
                }
            }
        });

        join_all(items).await.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldSelectors, PaginationStrategy};
    use crate::config::DelayRange;
    use crate::drivers::scripted::{Script, ScriptedDriver};
    use crate::extract::SENTINEL;

    fn test_config() -> ScrapeConfig {
        ScrapeConfig {
            navigation_timeout_ms: 200,
            content_timeout_ms: 200,
            item_timeout_ms: 50,
            scroll_settle_ms: 0,
            page_delay_ms: DelayRange::fixed(0),
            site_delay_ms: 0,
            retries: 0,
            user_agent: "TestAgent/1.0".to_string(),
            ..ScrapeConfig::default()
        }
    }

    fn site(name: &str, strategy: PaginationStrategy, max_pages: usize) -> SiteDescriptor {
        let one = |s: &str| vec![s.to_string()];
        SiteDescriptor {
            name: name.to_string(),
            url: format!("https://{}.example/list", name),
            pagination_type: strategy,
            next_page_selector: (strategy == PaginationStrategy::NextControl)
                .then(|| "a.next".to_string()),
            max_pages,
            container_selector: "li.item".to_string(),
            consent_selector: None,
            selectors: FieldSelectors {
                title: vec!["missing-title".to_string(), "h2".to_string()],
                price: one(".price"),
                image: one("img"),
                link: one("a"),
                rating: one("missing-rating"),
                reviews: one(".reviews"),
            },
        }
    }

    #[tokio::test]
    async fn test_records_keep_page_and_item_order() {
        let driver = ScriptedDriver::new(Script {
            items_per_page: 2,
            next_available: true,
            ..Script::default()
        });
        let catalog = SiteCatalog::new(vec![site("alpha", PaginationStrategy::NextControl, 2)]).unwrap();

        let outcome = ScrapeOrchestrator::new(driver, catalog, test_config()).run().await;

        let titles: Vec<&str> = outcome.records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["h2 p1#0", "h2 p1#1", "h2 p2#0", "h2 p2#1"]);
        assert!(outcome.records.iter().all(|r| r.rating == SENTINEL));
        assert!(outcome.records.iter().all(|r| r.site == "alpha"));
        assert_eq!(outcome.sites[0].outcome, SiteOutcome::Exhausted);
        assert_eq!(outcome.sites[0].pages, 2);
    }

    #[tokio::test]
    async fn test_page_two_failure_keeps_page_one_and_continues() {
        let driver = ScriptedDriver::new(Script {
            items_per_page: 3,
            next_available: true,
            empty_page: Some(2),
            ..Script::default()
        });
        let catalog = SiteCatalog::new(vec![
            site("alpha", PaginationStrategy::NextControl, 5),
            site("beta", PaginationStrategy::None, 1),
        ])
        .unwrap();

        let outcome = ScrapeOrchestrator::new(driver, catalog, test_config()).run().await;

        assert_eq!(outcome.sites.len(), 2);
        assert!(matches!(outcome.sites[0].outcome, SiteOutcome::Failed(_)));
        assert_eq!(outcome.sites[0].records, 3);
        assert_eq!(outcome.sites[1].outcome, SiteOutcome::Exhausted);
        assert_eq!(outcome.sites[1].records, 3);
        assert_eq!(outcome.records.len(), 6);
        assert_eq!(outcome.failed_sites().count(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_site_is_skipped() {
        let mut script = Script {
            items_per_page: 1,
            ..Script::default()
        };
        script.unreachable.insert("https://alpha.example/list".to_string());
        let driver = ScriptedDriver::new(script);
        let catalog = SiteCatalog::new(vec![
            site("alpha", PaginationStrategy::None, 1),
            site("beta", PaginationStrategy::None, 1),
        ])
        .unwrap();

        let outcome = ScrapeOrchestrator::new(driver, catalog, test_config()).run().await;

        assert_eq!(outcome.sites[0].pages, 0);
        assert!(matches!(outcome.sites[0].outcome, SiteOutcome::Failed(_)));
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].site, "beta");
    }

    #[tokio::test]
    async fn test_session_identified_and_released() {
        let driver = ScriptedDriver::new(Script {
            items_per_page: 1,
            ..Script::default()
        });
        let probe = driver.clone();
        let catalog = SiteCatalog::new(vec![site("alpha", PaginationStrategy::None, 1)]).unwrap();

        ScrapeOrchestrator::new(driver, catalog, test_config()).run().await;

        assert_eq!(probe.script().user_agent.as_deref(), Some("TestAgent/1.0"));
        assert!(probe.script().closed);
    }

    #[tokio::test]
    async fn test_session_released_when_every_site_fails() {
        let mut script = Script::default();
        script.unreachable.insert("https://alpha.example/list".to_string());
        let driver = ScriptedDriver::new(script);
        let probe = driver.clone();
        let catalog = SiteCatalog::new(vec![site("alpha", PaginationStrategy::None, 1)]).unwrap();

        let outcome = ScrapeOrchestrator::new(driver, catalog, test_config()).run().await;

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.failed_sites().count(), 1);
        assert!(probe.script().closed);
    }

    #[tokio::test]
    async fn test_item_without_fields_is_kept() {
        let driver = ScriptedDriver::new(Script {
            items_per_page: 2,
            ..Script::default()
        });
        let mut blank = site("alpha", PaginationStrategy::None, 1);
        blank.selectors = FieldSelectors {
            title: vec!["missing-title".to_string()],
            price: vec!["missing-price".to_string()],
            image: vec!["missing-image".to_string()],
            link: vec!["missing-link".to_string()],
            rating: vec!["missing-rating".to_string()],
            reviews: vec!["missing-reviews".to_string()],
        };
        let catalog = SiteCatalog::new(vec![blank]).unwrap();

        let outcome = ScrapeOrchestrator::new(driver, catalog, test_config()).run().await;

        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.records.iter().all(|r| r.is_empty() && r.site == "alpha"));
    }

    #[tokio::test]
    async fn test_hanging_item_is_dropped() {
        let driver = ScriptedDriver::new(Script {
            items_per_page: 3,
            hanging_item: Some(1),
            ..Script::default()
        });
        let catalog = SiteCatalog::new(vec![site("alpha", PaginationStrategy::None, 1)]).unwrap();

        let outcome = ScrapeOrchestrator::new(driver, catalog, test_config()).run().await;

        let titles: Vec<&str> = outcome.records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["h2 p1#0", "h2 p1#2"]);
        assert_eq!(outcome.sites[0].outcome, SiteOutcome::Exhausted);
    }

    #[tokio::test]
    async fn test_infinite_scroll_site_has_no_duplicates() {
        let driver = ScriptedDriver::new(Script {
            items_per_page: 2,
            heights: [100, 200, 300, 300, 300, 300].into_iter().collect(),
            ..Script::default()
        });
        let catalog = SiteCatalog::new(vec![site("feed", PaginationStrategy::InfiniteScroll, 20)]).unwrap();

        let outcome = ScrapeOrchestrator::new(driver, catalog, test_config()).run().await;

        // Heights change twice, then hold for three measurements
        let indexes: Vec<&str> = outcome.records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(indexes.len(), 10);
        let mut unique = indexes.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 10);
        assert_eq!(outcome.sites[0].pages, 5);
    }
}
