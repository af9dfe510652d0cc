//! Shared helper functions for CLI commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cache::ParserCache;
use crate::config::Config;
use crate::storage::FileStore;

/// Spinner used while waiting on the browser or the model.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Parser cache backed by the configured cache directory.
pub async fn open_cache(config: &Config) -> anyhow::Result<ParserCache> {
    let dir = config.cache_dir();
    let store = FileStore::open(&dir)
        .await
        .with_context(|| format!("Failed to open parser cache at {}", dir.display()))?;
    Ok(ParserCache::new(Arc::new(store)))
}

#[cfg(feature = "browser")]
mod browser_session {
    use std::sync::Arc;

    use anyhow::Context;

    use super::open_cache;
    use crate::browser::BrowserSession;
    use crate::config::Config;
    use crate::export::FileSink;
    use crate::host::TextConverter;
    use crate::llm::LlmClient;
    use crate::session::ClipperSession;

    /// Launch the browser, open `url` and wire a session around that tab.
    pub async fn start_session(
        config: &Config,
        url: &str,
    ) -> anyhow::Result<(BrowserSession, ClipperSession)> {
        let browser = BrowserSession::start(config.browser.clone()).await?;
        let tab = browser.open_tab(url).await?;
        let llm = LlmClient::new(config.llm.clone()).context("Failed to create LLM client")?;

        let session = ClipperSession::new(
            Arc::new(tab),
            Arc::new(TextConverter::new()),
            Arc::new(llm),
            open_cache(config).await?,
            Arc::new(FileSink::new(config.output_dir())),
        )
        .with_sandbox(Arc::new(browser.sandbox()))
        .with_llm_config(config.llm.clone())
        .with_crawl_config(config.crawl.clone());

        Ok((browser, session))
    }
}

#[cfg(feature = "browser")]
pub use browser_session::start_session;

#[cfg(not(feature = "browser"))]
pub async fn start_session(
    _config: &Config,
    _url: &str,
) -> anyhow::Result<(crate::browser::BrowserSession, crate::session::ClipperSession)> {
    Err(anyhow::anyhow!(
        "Browser support not compiled. Rebuild with: cargo build --features browser"
    ))
}
