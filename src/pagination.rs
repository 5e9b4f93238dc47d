use crate::catalog::{PaginationStrategy, SiteDescriptor};
use crate::config::{DelayRange, ScrapeConfig, WaitPolicy};
use crate::drivers::{PageDriver, bounded};
use crate::error::{DriverError, Result, ScrapeError};
use crate::utils::{pause, random_delay};
use std::time::Duration;

/// Consecutive unchanged height measurements that end an infinite scroll
pub const STABLE_MEASUREMENTS: u32 = 3;

/// Where a site's pagination currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    Start,
    Loading,
    Extracted,
    Advancing,
    /// No further page; a normal end
    Exhausted,
    /// Stopped by a driver error
    Failed(String),
}

impl PageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PageState::Exhausted | PageState::Failed(_))
    }
}

/// Hysteresis over content-height samples
///
/// The counter resets whenever a measurement differs from the previous one,
/// so a single unchanged sample during lazy loading does not end the scroll.
#[derive(Debug, Clone, Default)]
pub struct ScrollStability {
    last: Option<u64>,
    unchanged: u32,
}

impl ScrollStability {
    /// Record a measurement; true once the height has held for long enough
    pub fn observe(&mut self, height: u64) -> bool {
        match self.last {
            Some(previous) if previous == height => self.unchanged += 1,
            _ => self.unchanged = 0,
        }
        self.last = Some(height);
        self.unchanged >= STABLE_MEASUREMENTS
    }

    pub fn unchanged(&self) -> u32 {
        self.unchanged
    }
}

/// Timing knobs the controller needs from the run configuration
#[derive(Debug, Clone)]
pub struct PaginationSettings {
    pub wait_policy: WaitPolicy,
    pub navigation_timeout: Duration,
    pub content_timeout: Duration,
    pub scroll_settle: Duration,
    pub page_delay: DelayRange,
    pub retries: u32,
}

impl From<&ScrapeConfig> for PaginationSettings {
    fn from(config: &ScrapeConfig) -> Self {
        Self {
            wait_policy: config.wait_policy,
            navigation_timeout: config.navigation_timeout(),
            content_timeout: config.content_timeout(),
            scroll_settle: config.scroll_settle(),
            page_delay: config.page_delay_ms,
            retries: config.retries,
        }
    }
}

/// Per-site pagination state machine
///
/// `Start → Loading → Extracted → {Advancing → Loading | Exhausted}`, with
/// `Failed` reachable from any step on a driver error. The caller drives it
/// with [`load`](Self::load), [`containers`](Self::containers) and
/// [`advance`](Self::advance) until [`state`](Self::state) is terminal.
pub struct PaginationController<'s> {
    site: &'s SiteDescriptor,
    settings: PaginationSettings,
    state: PageState,
    page: usize,
    stability: ScrollStability,
    consumed: usize,
}

impl<'s> PaginationController<'s> {
    pub fn new(site: &'s SiteDescriptor, settings: PaginationSettings) -> Self {
        Self {
            site,
            settings,
            state: PageState::Start,
            page: 0,
            stability: ScrollStability::default(),
            consumed: 0,
        }
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    /// Pages loaded so far
    pub fn page(&self) -> usize {
        self.page
    }

    fn fail(&mut self, error: ScrapeError) -> ScrapeError {
        ::log::error!("{}", error);
        self.state = PageState::Failed(error.to_string());
        error
    }

    fn pagination_error(&self, source: DriverError) -> ScrapeError {
        ScrapeError::Pagination {
            site: self.site.name.clone(),
            page: self.page,
            source,
        }
    }

    /// `Start/Advancing → Loading`, or `Failed` once every attempt is spent
    pub async fn load<D: PageDriver>(&mut self, driver: &D) -> Result<()> {
        let first = match self.state {
            PageState::Start => true,
            PageState::Advancing => false,
            ref other => {
                return Err(ScrapeError::SiteFatal {
                    site: self.site.name.clone(),
                    reason: format!("cannot load a page from state {:?}", other),
                });
            }
        };

        let attempts = self.settings.retries + 1;
        let mut last_error = None;
        for attempt in 1..=attempts {
            if attempt > 1 {
                ::log::warn!(
                    "Retrying page {} of {} (attempt {}/{})",
                    self.page + 1,
                    self.site.name,
                    attempt,
                    attempts
                );
                pause(random_delay(self.settings.page_delay)).await;
            }
            match self.try_load(driver, first).await {
                Ok(()) => {
                    last_error = None;
                    break;
                }
                Err(e) => last_error = Some(e),
            }
        }
        if let Some(error) = last_error {
            return Err(self.fail(error));
        }

        self.page += 1;
        self.state = PageState::Loading;
        ::log::debug!("{}: page {} loaded", self.site.name, self.page);

        if first && self.site.pagination_type == PaginationStrategy::InfiniteScroll {
            match driver.content_height().await {
                Ok(height) => {
                    self.stability.observe(height);
                }
                Err(e) => {
                    let error = self.pagination_error(e);
                    return Err(self.fail(error));
                }
            }
        }
        Ok(())
    }

    async fn try_load<D: PageDriver>(&self, driver: &D, first: bool) -> Result<()> {
        if first {
            let url = &self.site.url;
            bounded(
                self.settings.navigation_timeout,
                driver.navigate(url, self.settings.wait_policy, self.settings.navigation_timeout),
            )
            .await
            .map_err(|source| ScrapeError::Navigation {
                url: url.clone(),
                source,
            })?;
            self.dismiss_consent(driver).await;
        }

        bounded(
            self.settings.content_timeout,
            driver.wait_for_selector(&self.site.container_selector, self.settings.content_timeout),
        )
        .await
        .map_err(|source| ScrapeError::Pagination {
            site: self.site.name.clone(),
            page: self.page + 1,
            source,
        })
    }

    /// Click the cookie banner away if it shows up
    async fn dismiss_consent<D: PageDriver>(&self, driver: &D) {
        let Some(selector) = &self.site.consent_selector else {
            return;
        };
        let timeout = self.settings.content_timeout;
        let accepted = match bounded(timeout, driver.wait_for_selector(selector, timeout)).await {
            Ok(()) => driver.click(selector).await,
            Err(e) => Err(e),
        };
        match accepted {
            Ok(true) => ::log::debug!("{}: consent banner dismissed", self.site.name),
            Ok(false) | Err(DriverError::Timeout(_)) => {
                ::log::debug!("{}: no consent banner", self.site.name)
            }
            Err(e) => ::log::warn!("{}: could not dismiss consent banner: {}", self.site.name, e),
        }
    }

    /// `Loading → Extracted`: containers not yet handed out on this site
    pub async fn containers<D: PageDriver>(&mut self, driver: &D) -> Result<Vec<D::Element>> {
        if self.state != PageState::Loading {
            return Err(ScrapeError::SiteFatal {
                site: self.site.name.clone(),
                reason: format!("cannot extract from state {:?}", self.state),
            });
        }

        let mut found = match driver.query_all(&self.site.container_selector).await {
            Ok(found) => found,
            Err(e) => {
                let error = self.pagination_error(e);
                return Err(self.fail(error));
            }
        };

        // A scrolled page still lists everything above the fold
        if self.site.pagination_type == PaginationStrategy::InfiniteScroll {
            let total = found.len();
            found.drain(..self.consumed.min(total));
            self.consumed = total;
        }

        self.state = PageState::Extracted;
        ::log::debug!(
            "{}: {} container(s) on page {}",
            self.site.name,
            found.len(),
            self.page
        );
        Ok(found)
    }

    /// `Extracted → Advancing | Exhausted`; true when another page follows
    pub async fn advance<D: PageDriver>(&mut self, driver: &D) -> Result<bool> {
        if self.state != PageState::Extracted {
            return Err(ScrapeError::SiteFatal {
                site: self.site.name.clone(),
                reason: format!("cannot advance from state {:?}", self.state),
            });
        }
        if self.page >= self.site.max_pages {
            ::log::info!(
                "{}: reached the bound of {} page(s)",
                self.site.name,
                self.site.max_pages
            );
            self.state = PageState::Exhausted;
            return Ok(false);
        }

        let advanced = match self.site.pagination_type {
            PaginationStrategy::None => Ok(false),
            PaginationStrategy::NextControl => self.click_next(driver).await,
            PaginationStrategy::InfiniteScroll => self.scroll_further(driver).await,
        };

        match advanced {
            Ok(true) => {
                self.state = PageState::Advancing;
                Ok(true)
            }
            Ok(false) => {
                self.state = PageState::Exhausted;
                Ok(false)
            }
            Err(e) => {
                let error = self.pagination_error(e);
                Err(self.fail(error))
            }
        }
    }

    async fn click_next<D: PageDriver>(&self, driver: &D) -> std::result::Result<bool, DriverError> {
        let Some(selector) = &self.site.next_page_selector else {
            return Ok(false);
        };
        if !driver.click(selector).await? {
            ::log::info!("{}: no next-page control after page {}", self.site.name, self.page);
            return Ok(false);
        }
        let timeout = self.settings.navigation_timeout;
        match bounded(timeout, driver.wait_for_navigation(timeout)).await {
            Ok(()) => Ok(true),
            Err(DriverError::Timeout(_)) => {
                ::log::info!(
                    "{}: next page did not load after page {}, stopping",
                    self.site.name,
                    self.page
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn scroll_further<D: PageDriver>(
        &mut self,
        driver: &D,
    ) -> std::result::Result<bool, DriverError> {
        driver.scroll_to_bottom().await?;
        pause(self.settings.scroll_settle).await;
        let height = driver.content_height().await?;
        if self.stability.observe(height) {
            ::log::info!(
                "{}: content height settled at {} after {} unchanged measurements",
                self.site.name,
                height,
                self.stability.unchanged()
            );
            return Ok(false);
        }
        ::log::trace!(
            "{}: height {} (unchanged {}x)",
            self.site.name,
            height,
            self.stability.unchanged()
        );
        Ok(true)
    }
}
