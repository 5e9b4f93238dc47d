use crate::config::DelayRange;
use rand::Rng;
use std::time::Duration;
use url::Url;

/// Delay drawn uniformly from the inclusive range
pub fn random_delay(range: DelayRange) -> Duration {
    if range.max <= range.min {
        return Duration::from_millis(range.min);
    }
    Duration::from_millis(rand::rng().random_range(range.min..=range.max))
}

/// Sleep for `delay`, skipping the timer entirely when it is zero
pub async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Resolve a possibly relative reference against the page it was found on
pub fn resolve_reference(reference: &str, base: Option<&Url>) -> String {
    let reference = reference.trim();
    match base.and_then(|b| b.join(reference).ok()) {
        Some(resolved) => resolved.to_string(),
        None => reference.to_string(),
    }
}
