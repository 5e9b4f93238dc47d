use crate::config::{ScrapeConfig, WaitPolicy};
use crate::drivers::{PageDriver, bounded};
use crate::error::{DriverError, DriverResult, ScrapeError};
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Map, Value, json};
use std::sync::Mutex;
use std::time::Duration;

/// Interval between readiness probes while waiting on the browser
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A WebDriver browser session
pub struct WebDriverSession {
    client: Client,
    /// URL the last click was issued from, to detect the navigation it triggers
    click_origin: Mutex<Option<String>>,
}

impl WebDriverSession {
    /// Connects to the WebDriver instance named in `config`
    ///
    /// Well-known local ports are tried when the configured URL refuses the
    /// session. Failing every candidate is fatal for the run.
    pub async fn connect(config: &ScrapeConfig) -> Result<Self, ScrapeError> {
        let caps = capabilities(&config.user_agent, config.headless);

        match open_session(&config.webdriver_url, &caps).await {
            Ok(client) => {
                ::log::debug!("Connected to WebDriver at {}", config.webdriver_url);
                return Ok(Self::from_client(client));
            }
            Err(e) => {
                ::log::error!(
                    "Failed to connect to WebDriver at {}: {}",
                    config.webdriver_url,
                    e
                );
            }
        }

        // If we couldn't connect, try with common alternative URLs
        let fallback_urls = [
            "http://localhost:9515", // ChromeDriver default
            "http://localhost:4444", // geckodriver / Selenium default
            "http://127.0.0.1:4444", // Try with IP instead of localhost
        ];

        for url in fallback_urls.iter() {
            if *url == config.webdriver_url {
                continue;
            }

            ::log::info!("Trying fallback WebDriver URL: {}", url);
            if let Ok(client) = open_session(url, &caps).await {
                ::log::debug!("Connected to fallback WebDriver at {}", url);
                return Ok(Self::from_client(client));
            }
        }

        Err(ScrapeError::SessionInit(format!(
            "no WebDriver server accepted a session (tried {} and fallbacks); \
             start one or set WEBDRIVER_URL",
            config.webdriver_url
        )))
    }

    fn from_client(client: Client) -> Self {
        Self {
            client,
            click_origin: Mutex::new(None),
        }
    }

    async fn ready_state(&self) -> DriverResult<String> {
        let state = self
            .client
            .execute("return document.readyState;", vec![])
            .await
            .map_err(map_cmd_error)?;
        Ok(state.as_str().unwrap_or_default().to_string())
    }

    async fn wait_ready(&self, policy: WaitPolicy) -> DriverResult<()> {
        loop {
            let state = self.ready_state().await?;
            let ready = match policy {
                WaitPolicy::Load => state == "complete",
                WaitPolicy::DomContentLoaded => state == "interactive" || state == "complete",
            };
            if ready {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn first_within(&self, scope: &Element, selector: &str) -> DriverResult<Option<Element>> {
        let mut found = scope
            .find_all(Locator::Css(selector))
            .await
            .map_err(map_cmd_error)?;
        if found.is_empty() {
            Ok(None)
        } else {
            Ok(Some(found.swap_remove(0)))
        }
    }
}

async fn open_session(url: &str, caps: &Map<String, Value>) -> Result<Client, String> {
    let mut builder = ClientBuilder::native();
    builder.capabilities(caps.clone());
    builder.connect(url).await.map_err(|e| e.to_string())
}

/// Session capabilities for Chrome and Firefox drivers
fn capabilities(user_agent: &str, headless: bool) -> Map<String, Value> {
    let mut chrome_args = vec![
        format!("--user-agent={}", user_agent),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--window-size=1366,900".to_string(),
    ];
    let mut firefox_args = Vec::new();
    if headless {
        chrome_args.push("--headless=new".to_string());
        firefox_args.push("-headless".to_string());
    }

    let mut caps = Map::new();
    caps.insert("goog:chromeOptions".to_string(), json!({ "args": chrome_args }));
    caps.insert(
        "moz:firefoxOptions".to_string(),
        json!({
            "args": firefox_args,
            "prefs": { "general.useragent.override": user_agent }
        }),
    );
    caps
}

/// Classifies a WebDriver command failure
fn map_cmd_error(error: CmdError) -> DriverError {
    let message = error.to_string();
    if message.contains("Unable to find session") || message.contains("invalid session id") {
        DriverError::SessionClosed
    } else {
        DriverError::Command(message)
    }
}

#[async_trait]
impl PageDriver for WebDriverSession {
    type Element = Element;

    async fn navigate(&self, url: &str, policy: WaitPolicy, timeout: Duration) -> DriverResult<()> {
        ::log::debug!("NAVIGATE: {}", url);
        bounded(timeout, async {
            self.client.goto(url).await.map_err(map_cmd_error)?;
            self.wait_ready(policy).await
        })
        .await
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> DriverResult<()> {
        bounded(timeout, async {
            loop {
                let found = self
                    .client
                    .find_all(Locator::Css(selector))
                    .await
                    .map_err(map_cmd_error)?;
                if !found.is_empty() {
                    return Ok(());
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
        .await
    }

    async fn query_all(&self, selector: &str) -> DriverResult<Vec<Element>> {
        self.client
            .find_all(Locator::Css(selector))
            .await
            .map_err(map_cmd_error)
    }

    async fn read_text(&self, scope: &Element, selector: &str) -> DriverResult<Option<String>> {
        let Some(element) = self.first_within(scope, selector).await? else {
            return Ok(None);
        };
        let text = element.text().await.map_err(map_cmd_error)?;
        if !text.trim().is_empty() {
            return Ok(Some(text));
        }
        // Visually hidden nodes (e.g. star rating alt text) have no rendered text
        element.prop("textContent").await.map_err(map_cmd_error)
    }

    async fn read_attribute(
        &self,
        scope: &Element,
        selector: &str,
        name: &str,
    ) -> DriverResult<Option<String>> {
        match self.first_within(scope, selector).await? {
            Some(element) => element.attr(name).await.map_err(map_cmd_error),
            None => Ok(None),
        }
    }

    async fn click(&self, selector: &str) -> DriverResult<bool> {
        let mut found = self
            .client
            .find_all(Locator::Css(selector))
            .await
            .map_err(map_cmd_error)?;
        if found.is_empty() {
            return Ok(false);
        }
        let origin = self.current_url().await?;
        if let Ok(mut slot) = self.click_origin.lock() {
            *slot = Some(origin);
        }
        found.swap_remove(0).click().await.map_err(map_cmd_error)?;
        Ok(true)
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> DriverResult<()> {
        let origin = self.click_origin.lock().ok().and_then(|mut slot| slot.take());
        bounded(timeout, async {
            loop {
                let url = self.current_url().await?;
                let moved = origin.as_deref().is_none_or(|o| o != url);
                if moved && self.ready_state().await? == "complete" {
                    return Ok(());
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
        .await
    }

    async fn scroll_to_bottom(&self) -> DriverResult<()> {
        self.client
            .execute("window.scrollTo(0, document.body.scrollHeight);", vec![])
            .await
            .map_err(map_cmd_error)?;
        Ok(())
    }

    async fn content_height(&self) -> DriverResult<u64> {
        let height = self
            .client
            .execute("return document.body.scrollHeight;", vec![])
            .await
            .map_err(map_cmd_error)?;
        height
            .as_u64()
            .or_else(|| height.as_f64().map(|h| h as u64))
            .ok_or_else(|| DriverError::Command(format!("unexpected scroll height {}", height)))
    }

    async fn current_url(&self) -> DriverResult<String> {
        self.client
            .current_url()
            .await
            .map(|u| u.to_string())
            .map_err(map_cmd_error)
    }

    /// Sets the user agent of the WebDriver HTTP client only
    ///
    /// The browser's own `navigator.userAgent` is fixed by the capabilities
    /// built in [`connect`](WebDriverSession::connect) and cannot change for
    /// the life of the session.
    async fn set_identity(&self, user_agent: &str) -> DriverResult<()> {
        self.client.set_ua(user_agent).await.map_err(map_cmd_error)
    }

    async fn close(&self) -> DriverResult<()> {
        self.client.clone().close().await.map_err(map_cmd_error)
    }
}
