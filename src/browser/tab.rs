//! A chromiumoxide page acting as the crawl tab.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::Page;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{ExtractError, ExtractResult};
use crate::host::PageHost;
use crate::models::{PageContent, PageEvent};

/// Page helper playing the content-script role: `ping` and `extract`.
const HELPER_SCRIPT: &str = r#"
(() => {
  if (window.__scrapegen) return true;
  window.__scrapegen = {
    ping: () => true,
    extract: () => {
      const metadata = {};
      for (const meta of document.querySelectorAll('meta[name], meta[property]')) {
        const key = meta.getAttribute('name') || meta.getAttribute('property');
        const value = meta.getAttribute('content');
        if (key && value) metadata[key] = value;
      }
      return JSON.stringify({
        content: document.documentElement ? document.documentElement.outerHTML : '',
        title: document.title || '',
        metadata,
      });
    },
  };
  return true;
})()
"#;

const PING_SCRIPT: &str =
    "typeof window.__scrapegen === 'object' && window.__scrapegen.ping() === true";

const EXTRACT_SCRIPT: &str = "window.__scrapegen.extract()";

fn host_err(e: impl std::fmt::Display) -> ExtractError {
    ExtractError::Host(e.to_string())
}

/// Browser tab that reports navigation progress as [`PageEvent`]s.
pub struct BrowserTab {
    page: Page,
    events: broadcast::Sender<PageEvent>,
}

impl BrowserTab {
    pub(crate) fn new(page: Page) -> Self {
        let (events, _) = broadcast::channel(16);
        Self { page, events }
    }
}

#[async_trait]
impl PageHost for BrowserTab {
    async fn current_url(&self) -> ExtractResult<String> {
        self.page
            .url()
            .await
            .map_err(host_err)?
            .ok_or_else(|| ExtractError::Host("tab has no URL".to_string()))
    }

    async fn navigate(&self, url: &str) -> ExtractResult<()> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| ExtractError::Host(format!("Invalid URL: {}", e)))?;

        let _ = self.events.send(PageEvent::loading(url));

        let page = self.page.clone();
        let events = self.events.clone();
        let requested = url.to_string();
        tokio::spawn(async move {
            match page.goto(params).await {
                Ok(_) => {
                    let final_url = page
                        .url()
                        .await
                        .ok()
                        .flatten()
                        .unwrap_or_else(|| requested.clone());
                    debug!("Load complete: {}", final_url);
                    let _ = events.send(PageEvent::complete(final_url));
                }
                Err(e) => {
                    warn!("Navigation to {} failed: {}", requested, e);
                    let _ = events.send(PageEvent::failed(requested));
                }
            }
        });

        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    async fn ping(&self) -> bool {
        match self.page.evaluate(PING_SCRIPT.to_string()).await {
            Ok(result) => result.into_value::<bool>().unwrap_or(false),
            Err(e) => {
                debug!("Helper ping failed: {}", e);
                false
            }
        }
    }

    async fn inject_content_script(&self) -> ExtractResult<()> {
        self.page.evaluate(HELPER_SCRIPT.to_string()).await.map_err(host_err)?;
        Ok(())
    }

    async fn extract_content(&self) -> ExtractResult<PageContent> {
        let raw: String = self
            .page
            .evaluate(EXTRACT_SCRIPT.to_string())
            .await
            .map_err(host_err)?
            .into_value()
            .map_err(host_err)?;
        serde_json::from_str(&raw).map_err(host_err)
    }
}
