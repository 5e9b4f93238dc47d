use crate::config::WaitPolicy;
use crate::drivers::PageDriver;
use crate::error::{DriverError, DriverResult, ScrapeError};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use url::Url;

/// Element of a snapshot page: the `index`-th match of `selector`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotElement {
    generation: u64,
    selector: String,
    index: usize,
}

#[derive(Debug, Default)]
struct SnapshotState {
    current_url: Option<String>,
    frame: usize,
    generation: u64,
    pending: Option<Option<String>>,
    user_agent: Option<String>,
    closed: bool,
}

/// Replays saved listing pages instead of driving a browser
///
/// Each URL maps to one or more HTML frames. A navigation shows the first
/// frame; every scroll to the bottom reveals the next one, which is how
/// infinite-scroll listings are captured.
#[derive(Debug, Default)]
pub struct SnapshotDriver {
    pages: HashMap<String, Vec<String>>,
    state: Mutex<SnapshotState>,
}

impl SnapshotDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single-frame page
    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.with_frames(url, vec![html.to_string()])
    }

    /// Register a page whose content grows as it is scrolled
    ///
    /// An empty frame list registers nothing, so navigating to `url` fails.
    pub fn with_frames(mut self, url: &str, frames: Vec<String>) -> Self {
        if frames.is_empty() {
            ::log::warn!("Ignoring snapshot {} without frames", url);
            return self;
        }
        self.pages.insert(url.to_string(), frames);
        self
    }

    /// Load snapshots listed in `<dir>/manifest.json`
    ///
    /// The manifest maps each URL to the ordered HTML files of its frames,
    /// relative to `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, ScrapeError> {
        let dir = dir.as_ref();
        let manifest = fs::read_to_string(dir.join("manifest.json"))?;
        let manifest: HashMap<String, Vec<String>> = serde_json::from_str(&manifest)?;

        let mut driver = Self::new();
        for (url, files) in manifest {
            if files.is_empty() {
                return Err(ScrapeError::Config(format!("snapshot {} lists no files", url)));
            }
            let frames = files
                .iter()
                .map(|f| fs::read_to_string(dir.join(f)))
                .collect::<Result<Vec<_>, _>>()?;
            ::log::debug!("Loaded {} snapshot frame(s) for {}", frames.len(), url);
            driver = driver.with_frames(&url, frames);
        }
        Ok(driver)
    }

    /// User agent most recently set through `set_identity`
    pub fn user_agent(&self) -> Option<String> {
        self.lock().ok().and_then(|s| s.user_agent.clone())
    }

    fn lock(&self) -> DriverResult<MutexGuard<'_, SnapshotState>> {
        let state = self
            .state
            .lock()
            .map_err(|_| DriverError::Command("snapshot state poisoned".to_string()))?;
        if state.closed {
            return Err(DriverError::SessionClosed);
        }
        Ok(state)
    }

    /// HTML currently displayed
    fn current_html(&self) -> DriverResult<(String, u64)> {
        let state = self.lock()?;
        let url = state
            .current_url
            .as_ref()
            .ok_or_else(|| DriverError::Command("no page loaded".to_string()))?;
        let frames = self
            .pages
            .get(url)
            .ok_or_else(|| DriverError::Command(format!("no snapshot for {}", url)))?;
        let html = frames
            .get(state.frame)
            .or_else(|| frames.last())
            .ok_or_else(|| DriverError::Command(format!("snapshot {} has no frames", url)))?;
        Ok((html.clone(), state.generation))
    }

    fn load(&self, url: &str) -> DriverResult<()> {
        if !self.pages.contains_key(url) {
            return Err(DriverError::Command(format!("no snapshot for {}", url)));
        }
        let mut state = self.lock()?;
        state.current_url = Some(url.to_string());
        state.frame = 0;
        state.generation += 1;
        Ok(())
    }

    /// Read from the first descendant of `scope` matching `selector`
    fn read_within<T>(
        &self,
        scope: &SnapshotElement,
        selector: &str,
        read: impl Fn(ElementRef<'_>) -> Option<T>,
    ) -> DriverResult<Option<T>> {
        let (html, generation) = self.current_html()?;
        if generation != scope.generation {
            return Err(DriverError::Command("stale element reference".to_string()));
        }
        let outer = parse_selector(&scope.selector)?;
        let inner = parse_selector(selector)?;
        let doc = Html::parse_document(&html);
        let container = doc
            .select(&outer)
            .nth(scope.index)
            .ok_or_else(|| DriverError::Command("stale element reference".to_string()))?;
        Ok(container.select(&inner).next().and_then(read))
    }
}

fn parse_selector(selector: &str) -> DriverResult<Selector> {
    Selector::parse(selector)
        .map_err(|e| DriverError::Command(format!("invalid selector `{}`: {}", selector, e)))
}

fn count_matches(html: &str, selector: &str) -> DriverResult<usize> {
    let selector = parse_selector(selector)?;
    Ok(Html::parse_document(html).select(&selector).count())
}

fn first_href(html: &str, selector: &str) -> DriverResult<Option<Option<String>>> {
    let selector = parse_selector(selector)?;
    let doc = Html::parse_document(html);
    Ok(doc
        .select(&selector)
        .next()
        .map(|e| e.value().attr("href").map(|s| s.to_string())))
}

#[async_trait]
impl PageDriver for SnapshotDriver {
    type Element = SnapshotElement;

    async fn navigate(&self, url: &str, _policy: WaitPolicy, _timeout: Duration) -> DriverResult<()> {
        ::log::debug!("NAVIGATE (snapshot): {}", url);
        self.load(url)
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> DriverResult<()> {
        let (html, _) = self.current_html()?;
        // A snapshot never changes on its own, so waiting longer cannot help
        if count_matches(&html, selector)? > 0 {
            Ok(())
        } else {
            Err(DriverError::Timeout(timeout))
        }
    }

    async fn query_all(&self, selector: &str) -> DriverResult<Vec<SnapshotElement>> {
        let (html, generation) = self.current_html()?;
        let count = count_matches(&html, selector)?;
        Ok((0..count)
            .map(|index| SnapshotElement {
                generation,
                selector: selector.to_string(),
                index,
            })
            .collect())
    }

    async fn read_text(&self, scope: &SnapshotElement, selector: &str) -> DriverResult<Option<String>> {
        self.read_within(scope, selector, |e| Some(e.text().collect::<Vec<_>>().join(" ")))
    }

    async fn read_attribute(
        &self,
        scope: &SnapshotElement,
        selector: &str,
        name: &str,
    ) -> DriverResult<Option<String>> {
        self.read_within(scope, selector, |e| e.value().attr(name).map(|s| s.to_string()))
    }

    async fn click(&self, selector: &str) -> DriverResult<bool> {
        let (html, _) = self.current_html()?;
        let Some(href) = first_href(&html, selector)? else {
            return Ok(false);
        };
        let mut state = self.lock()?;
        let target = match (href, state.current_url.as_deref()) {
            (Some(href), Some(base)) => Url::parse(base)
                .and_then(|b| b.join(&href))
                .ok()
                .map(|u| u.to_string()),
            _ => None,
        };
        state.pending = Some(target);
        Ok(true)
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> DriverResult<()> {
        let pending = self.lock()?.pending.take();
        match pending.flatten() {
            Some(target) if self.pages.contains_key(&target) => self.load(&target),
            // The click led nowhere a snapshot exists for
            _ => Err(DriverError::Timeout(timeout)),
        }
    }

    async fn scroll_to_bottom(&self) -> DriverResult<()> {
        let mut state = self.lock()?;
        let frames = state
            .current_url
            .as_ref()
            .and_then(|u| self.pages.get(u))
            .map_or(0, |f| f.len());
        state.frame = (state.frame + 1).min(frames.saturating_sub(1));
        Ok(())
    }

    async fn content_height(&self) -> DriverResult<u64> {
        let (html, _) = self.current_html()?;
        Ok(html.len() as u64)
    }

    async fn current_url(&self) -> DriverResult<String> {
        self.lock()?
            .current_url
            .clone()
            .ok_or_else(|| DriverError::Command("no page loaded".to_string()))
    }

    async fn set_identity(&self, user_agent: &str) -> DriverResult<()> {
        self.lock()?.user_agent = Some(user_agent.to_string());
        Ok(())
    }

    async fn close(&self) -> DriverResult<()> {
        self.lock()?.closed = true;
        Ok(())
    }
}
