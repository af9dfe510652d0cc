//! Chrome-backed tab host and sandbox.
//!
//! Uses chromiumoxide (CDP) to drive a local or remote Chrome. A
//! [`BrowserSession`] owns the connection and hands out [`BrowserTab`]s for
//! crawling and a [`BrowserSandbox`] for running generated routines.

mod config;
#[cfg(feature = "browser")]
mod sandbox;
#[cfg(feature = "browser")]
mod tab;

pub use config::BrowserConfig;
#[cfg(feature = "browser")]
pub use sandbox::BrowserSandbox;
#[cfg(feature = "browser")]
pub use tab::BrowserTab;

#[cfg(feature = "browser")]
use std::path::PathBuf;
#[cfg(feature = "browser")]
use std::sync::Arc;
#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use anyhow::Context;
use anyhow::Result;
#[cfg(feature = "browser")]
use tokio::sync::Mutex;
#[cfg(feature = "browser")]
use tracing::{debug, info};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, Handler};
#[cfg(feature = "browser")]
use futures::StreamExt;

/// A launched or connected browser.
#[cfg(feature = "browser")]
pub struct BrowserSession {
    config: BrowserConfig,
    browser: Arc<Mutex<Browser>>,
}

#[cfg(feature = "browser")]
impl BrowserSession {
    /// Binary names searched on `PATH`.
    const CHROME_NAMES: &'static [&'static str] = &[
        "chromium",
        "chromium-browser",
        "google-chrome",
        "google-chrome-stable",
    ];

    /// Install locations that are usually not on `PATH`.
    const CHROME_BUNDLES: &'static [&'static str] = &[
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/chrome",
    ];

    /// Launch Chrome, or connect to `remote_url` when configured.
    pub async fn start(config: BrowserConfig) -> Result<Self> {
        let browser = match config.remote_url.as_deref() {
            Some(remote_url) => Self::connect_remote(&config, remote_url).await?,
            None => Self::launch(&config).await?,
        };
        Ok(Self {
            config,
            browser: Arc::new(Mutex::new(browser)),
        })
    }

    fn find_chrome(config: &BrowserConfig) -> Result<PathBuf> {
        if let Some(ref path) = config.chrome_path {
            return Ok(path.clone());
        }
        let on_path = std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter()
            .flat_map(|dir| Self::CHROME_NAMES.iter().map(move |name| dir.join(name)));
        on_path
            .chain(Self::CHROME_BUNDLES.iter().map(PathBuf::from))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "no Chrome or Chromium found; set BROWSER_CHROME_PATH or BROWSER_REMOTE_URL"
                )
            })
    }

    async fn launch(config: &BrowserConfig) -> Result<Browser> {
        let chrome = Self::find_chrome(config)?;
        info!("Launching {} (headless={})", chrome.display(), config.headless);

        let mut builder = chromiumoxide::BrowserConfig::builder()
            .chrome_executable(chrome)
            .request_timeout(Duration::from_secs(config.timeout))
            .args([
                "--no-first-run",
                "--no-default-browser-check",
                "--disable-dev-shm-usage",
                "--disable-gpu",
                "--no-sandbox",
            ])
            .args(&config.chrome_args);
        if !config.headless {
            builder = builder.with_head();
        }
        let launch_config = builder.build().map_err(|e| anyhow::anyhow!(e))?;

        let (browser, handler) = Browser::launch(launch_config)
            .await
            .context("Failed to launch browser")?;
        Self::drive(handler);
        Ok(browser)
    }

    /// Attach to a running browser. An `http(s)://` or bare `ws://host:port`
    /// address is resolved through its `/json/version` endpoint.
    async fn connect_remote(config: &BrowserConfig, url: &str) -> Result<Browser> {
        let ws_url = if url.contains("/devtools/") {
            url.to_string()
        } else {
            let base = match url.strip_prefix("ws") {
                Some(rest) => format!("http{}", rest),
                None => url.to_string(),
            };
            let version: serde_json::Value =
                reqwest::get(format!("{}/json/version", base.trim_end_matches('/')))
                    .await
                    .and_then(|r| r.error_for_status())
                    .with_context(|| format!("Failed to reach browser at {}", url))?
                    .json()
                    .await
                    .context("Unreadable /json/version response")?;
            version["webSocketDebuggerUrl"]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("{} reported no webSocketDebuggerUrl", url))?
        };
        info!("Connecting to browser at {}", ws_url);

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: Duration::from_secs(config.timeout),
            ..Default::default()
        };
        let (browser, handler) = Browser::connect_with_config(&ws_url, handler_config)
            .await
            .context("Failed to connect to remote browser")?;
        Self::drive(handler);
        Ok(browser)
    }

    /// Pump CDP messages until the connection drops.
    fn drive(mut handler: Handler) {
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser connection ended: {}", e);
                    break;
                }
            }
        });
    }

    /// Open a tab on `url` and wait for the first load.
    pub async fn open_tab(&self, url: &str) -> Result<BrowserTab> {
        let page = {
            let browser = self.browser.lock().await;
            browser.new_page("about:blank").await?
        };

        info!("Opening {}", url);
        let nav_params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid URL: {}", e))?;
        page.goto(nav_params)
            .await
            .with_context(|| format!("Failed to load {}", url))?;

        Ok(BrowserTab::new(page))
    }

    /// Sandbox that runs routines in throwaway blank pages of this browser.
    pub fn sandbox(&self) -> BrowserSandbox {
        BrowserSandbox::new(
            self.browser.clone(),
            Duration::from_secs(self.config.script_timeout),
        )
    }

    /// Close the browser.
    pub async fn close(self) {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            debug!("Browser close failed: {}", e);
        }
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct BrowserSession;

#[cfg(not(feature = "browser"))]
impl BrowserSession {
    pub async fn start(_config: BrowserConfig) -> Result<Self> {
        Err(anyhow::anyhow!(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
        ))
    }

    pub async fn close(self) {}
}
