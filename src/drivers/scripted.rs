//! Deterministic driver for exercising pagination and orchestration.

use crate::config::WaitPolicy;
use crate::drivers::PageDriver;
use crate::error::{DriverError, DriverResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Item `index` on the `page`-th page loaded for `url`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedElement {
    pub url: String,
    pub page: usize,
    pub index: usize,
}

#[derive(Debug, Default)]
pub struct Script {
    /// Containers per page; grows by this much per scroll
    pub items_per_page: usize,
    /// Heights returned by successive `content_height` calls
    pub heights: VecDeque<u64>,
    /// Whether the next control is present
    pub next_available: bool,
    /// URLs whose navigation always fails
    pub unreachable: HashSet<String>,
    /// Navigation attempts that fail before one succeeds, per URL
    pub flaky: HashMap<String, usize>,
    /// Page number on which containers never appear
    pub empty_page: Option<usize>,
    /// Page number on which the click does not complete navigation
    pub stuck_page: Option<usize>,
    /// Item index whose reads never return
    pub hanging_item: Option<usize>,

    pub current_url: Option<String>,
    pub page: usize,
    pub scrolls: usize,
    pub navigate_calls: usize,
    pub navigations: usize,
    pub clicks: usize,
    pub user_agent: Option<String>,
    pub closed: bool,
}

/// Clones share one script, so a test can inspect a driver it handed away
#[derive(Clone)]
pub struct ScriptedDriver {
    script: Arc<Mutex<Script>>,
}

impl ScriptedDriver {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
        }
    }

    pub fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    fn live(&self) -> DriverResult<MutexGuard<'_, Script>> {
        let script = self.script();
        if script.closed {
            return Err(DriverError::SessionClosed);
        }
        Ok(script)
    }

    async fn read(&self, scope: &ScriptedElement, selector: &str) -> DriverResult<Option<String>> {
        let hang = self.live()?.hanging_item == Some(scope.index);
        if hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if selector.starts_with("missing") {
            return Ok(None);
        }
        Ok(Some(format!("{} p{}#{}", selector, scope.page, scope.index)))
    }
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    type Element = ScriptedElement;

    async fn navigate(&self, url: &str, _policy: WaitPolicy, timeout: Duration) -> DriverResult<()> {
        let mut script = self.live()?;
        script.navigate_calls += 1;
        if script.unreachable.contains(url) {
            return Err(DriverError::Timeout(timeout));
        }
        if let Some(remaining) = script.flaky.get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DriverError::Timeout(timeout));
            }
        }
        script.current_url = Some(url.to_string());
        script.page = 1;
        script.scrolls = 0;
        script.navigations += 1;
        Ok(())
    }

    async fn wait_for_selector(&self, _selector: &str, timeout: Duration) -> DriverResult<()> {
        let script = self.live()?;
        if script.empty_page == Some(script.page) {
            return Err(DriverError::Timeout(timeout));
        }
        Ok(())
    }

    async fn query_all(&self, _selector: &str) -> DriverResult<Vec<ScriptedElement>> {
        let script = self.live()?;
        let url = script.current_url.clone().unwrap_or_default();
        let count = script.items_per_page * (script.scrolls + 1);
        Ok((0..count)
            .map(|index| ScriptedElement {
                url: url.clone(),
                page: script.page,
                index,
            })
            .collect())
    }

    async fn read_text(&self, scope: &ScriptedElement, selector: &str) -> DriverResult<Option<String>> {
        self.read(scope, selector).await
    }

    async fn read_attribute(
        &self,
        scope: &ScriptedElement,
        selector: &str,
        _name: &str,
    ) -> DriverResult<Option<String>> {
        self.read(scope, selector).await
    }

    async fn click(&self, _selector: &str) -> DriverResult<bool> {
        let mut script = self.live()?;
        if !script.next_available {
            return Ok(false);
        }
        script.clicks += 1;
        Ok(true)
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> DriverResult<()> {
        let mut script = self.live()?;
        if script.stuck_page == Some(script.page + 1) {
            return Err(DriverError::Timeout(timeout));
        }
        script.page += 1;
        script.navigations += 1;
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> DriverResult<()> {
        self.live()?.scrolls += 1;
        Ok(())
    }

    async fn content_height(&self) -> DriverResult<u64> {
        let mut script = self.live()?;
        match script.heights.pop_front() {
            Some(height) => Ok(height),
            None => Err(DriverError::Command("height script exhausted".to_string())),
        }
    }

    async fn current_url(&self) -> DriverResult<String> {
        let script = self.live()?;
        Ok(format!(
            "{}?page={}",
            script.current_url.clone().unwrap_or_default(),
            script.page
        ))
    }

    async fn set_identity(&self, user_agent: &str) -> DriverResult<()> {
        self.live()?.user_agent = Some(user_agent.to_string());
        Ok(())
    }

    async fn close(&self) -> DriverResult<()> {
        self.live()?.closed = true;
        Ok(())
    }
}
