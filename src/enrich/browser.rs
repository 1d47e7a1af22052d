use super::DetailFetcher;
use crate::config::BrowserConfig;
use crate::error::{BrowserError, Result};
pub use crate::{log_debug, log_info, log_warn};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36";

// Runs before any page script; hides the usual automation markers.
const STEALTH_JS: &str = r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
    Object.defineProperty(navigator, 'platform', { get: () => 'Win32' });
    Object.defineProperty(navigator, 'vendor', { get: () => 'Google Inc.' });
    window.chrome = { runtime: {} };
"#;

pub(crate) fn launch_args() -> Vec<String> {
    vec![
        "--log-level=3".to_string(),
        "--start-maximized".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--ignore-certificate-errors".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-infobars".to_string(),
        "--blink-settings=imagesEnabled=false".to_string(),
        "--autoplay-policy=user-gesture-required".to_string(),
        "--lang=en-US".to_string(),
        format!("--user-agent={}", USER_AGENT),
    ]
}

/// One Chromium instance with a single tab, used for every detail page of a
/// run. Callers hold it by `&mut`, so only one navigation is ever in flight.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    navigation_timeout: Duration,
}

impl BrowserSession {
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let mut builder = LaunchConfig::builder()
            .no_sandbox()
            .window_size(1920, 1080)
            .args(launch_args());
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(dir) = &config.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        let launch_config = builder.build().map_err(BrowserError::Launch)?;

        log_info!(
            "[browser] Launching Chromium (headless: {})",
            config.headless
        );
        let (browser, mut handler) = Browser::launch(launch_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // The CDP connection only makes progress while its handler is polled.
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(BrowserError::Launch(format!("Failed to open a tab: {}", e)).into());
            }
        };

        if let Err(e) = page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_JS))
            .await
        {
            log_warn!("[browser] Could not install stealth script: {}", e);
        }

        Ok(Self {
            browser,
            page,
            handler,
            navigation_timeout: Duration::from_secs(config.navigation_timeout),
        })
    }

    async fn render(&self, url: &str) -> std::result::Result<String, BrowserError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        self.page
            .content()
            .await
            .map_err(|e| BrowserError::Content(e.to_string()))
    }

    /// Shuts Chromium down. The handler task is stopped even when closing
    /// fails.
    pub async fn close(mut self) -> Result<()> {
        log_info!("[browser] Closing browser session");
        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            log_warn!("[browser] Waiting for Chromium to exit failed: {}", e);
        }
        self.handler.abort();

        closed.map_err(|e| BrowserError::Launch(format!("Failed to close browser: {}", e)))?;
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl DetailFetcher for BrowserSession {
    async fn page_source(&mut self, url: &str) -> Result<String> {
        log_debug!("[browser] Navigating to {}", url);

        match tokio::time::timeout(self.navigation_timeout, self.render(url)).await {
            Ok(rendered) => Ok(rendered?),
            Err(_) => Err(BrowserError::Timeout {
                url: url.to_string(),
                seconds: self.navigation_timeout.as_secs(),
            }
            .into()),
        }
    }
}
