pub mod snapshot;
pub mod web;

use crate::config::WaitPolicy;
use crate::error::{DriverError, DriverResult};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

pub use snapshot::SnapshotDriver;
pub use web::WebDriverSession;

/// Browser automation surface the scraper consumes
///
/// Exactly one navigation, click or scroll is in flight at a time; element
/// reads may overlap since they do not change the loaded page.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Handle to an element of the currently loaded page
    type Element: Send + Sync;

    /// Load `url` and wait until `policy` is satisfied
    async fn navigate(&self, url: &str, policy: WaitPolicy, timeout: Duration) -> DriverResult<()>;

    /// Wait until at least one element matches `selector`
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> DriverResult<()>;

    /// Every element of the page matching `selector`, in document order
    async fn query_all(&self, selector: &str) -> DriverResult<Vec<Self::Element>>;

    /// Text of the first descendant of `scope` matching `selector`
    async fn read_text(&self, scope: &Self::Element, selector: &str) -> DriverResult<Option<String>>;

    /// Attribute `name` of the first descendant of `scope` matching `selector`
    async fn read_attribute(
        &self,
        scope: &Self::Element,
        selector: &str,
        name: &str,
    ) -> DriverResult<Option<String>>;

    /// Click the first element matching `selector`; `Ok(false)` if none matches
    async fn click(&self, selector: &str) -> DriverResult<bool>;

    /// Wait for the navigation started by a click to finish
    async fn wait_for_navigation(&self, timeout: Duration) -> DriverResult<()>;

    async fn scroll_to_bottom(&self) -> DriverResult<()>;

    /// Current scroll height of the document
    async fn content_height(&self) -> DriverResult<u64>;

    async fn current_url(&self) -> DriverResult<String>;

    /// Identify subsequent requests with `user_agent`
    ///
    /// Drivers whose browser identity is fixed at session start apply it only
    /// to what they still control.
    async fn set_identity(&self, user_agent: &str) -> DriverResult<()>;

    /// End the session
    async fn close(&self) -> DriverResult<()>;
}

/// Run a driver operation with an upper bound on its duration
pub async fn bounded<T, F>(limit: Duration, op: F) -> DriverResult<T>
where
    F: Future<Output = DriverResult<T>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result,
        Err(_) => Err(DriverError::Timeout(limit)),
    }
}

#[cfg(test)]
pub(crate) mod scripted;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bounded_maps_elapsed_to_timeout() {
        let limit = Duration::from_millis(100);
        let result: DriverResult<()> = bounded(limit, async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(DriverError::Timeout(limit)));
    }

    #[tokio::test]
    async fn test_bounded_passes_through_result() {
        let result = bounded(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result, Ok(7));

        let result: DriverResult<u8> = bounded(Duration::from_secs(1), async {
            Err(DriverError::SessionClosed)
        })
        .await;
        assert_eq!(result, Err(DriverError::SessionClosed));
    }
}
