//! Pagination crawler.
//!
//! Replays one extraction routine across `?{param}=n` pages of a listing in
//! a single tab. Each page goes through navigate, settle, helper ping,
//! extract and convert, run routine, evaluate. The crawl ends when
//! consecutive empty pages reach the failure threshold, when the page
//! counter passes the maximum, or when the shared [`CancelFlag`] is set.
//! Cancellation is checked at loop entry and after the inter-page delay
//! only; work already in flight is never interrupted.

mod cancel;
mod config;
mod navigation;
mod pagination;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{ExtractError, ExtractResult};
use crate::host::{ContentConverter, PageHost};
use crate::models::{products_from_values, Product};
use crate::sandbox::{run_extractor, Sandbox};

pub use cancel::CancelFlag;
pub use config::CrawlConfig;
pub use navigation::{navigate_and_wait, Completion};
pub use pagination::{navigation_key, page_url, strip_param};

/// What to crawl and with which routine.
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    /// Listing URL; page 1 is assumed to be loaded in the tab already.
    pub base_url: String,
    /// Source of the extraction routine.
    pub code: String,
    pub pagination_param: String,
    pub max_pages: u32,
    /// Converted text of page 1 when the caller already has it.
    pub initial_text: Option<String>,
}

impl CrawlRequest {
    pub fn new(base_url: impl Into<String>, code: impl Into<String>, config: &CrawlConfig) -> Self {
        Self {
            base_url: base_url.into(),
            code: code.into(),
            pagination_param: config.pagination_param.clone(),
            max_pages: config.max_pages,
            initial_text: None,
        }
    }

    pub fn with_initial_text(mut self, text: impl Into<String>) -> Self {
        self.initial_text = Some(text.into());
        self
    }
}

/// Mutable per-crawl state; dropped when the crawl ends.
#[derive(Debug, Clone)]
pub struct CrawlState {
    pub page_number: u32,
    pub accumulated: Vec<Product>,
    pub consecutive_failures: u32,
    pub cancelled: bool,
}

impl Default for CrawlState {
    fn default() -> Self {
        Self {
            page_number: 1,
            accumulated: Vec::new(),
            consecutive_failures: 0,
            cancelled: false,
        }
    }
}

/// Why a crawl stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Consecutive empty pages reached the failure threshold.
    Exhausted,
    /// The page counter passed the configured maximum.
    MaxPages,
    Cancelled,
}

/// Result of a crawl: everything accumulated plus how it ended.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlReport {
    pub products: Vec<Product>,
    pub pages_visited: u32,
    pub consecutive_failures: u32,
    pub stop_reason: StopReason,
    /// False only when the crawl was cancelled.
    pub completed_naturally: bool,
}

/// Drives one tab through a paginated listing.
pub struct PaginationCrawler<'a> {
    host: &'a dyn PageHost,
    converter: &'a dyn ContentConverter,
    sandbox: &'a dyn Sandbox,
    config: &'a CrawlConfig,
    cancel: CancelFlag,
}

impl<'a> PaginationCrawler<'a> {
    pub fn new(
        host: &'a dyn PageHost,
        converter: &'a dyn ContentConverter,
        sandbox: &'a dyn Sandbox,
        config: &'a CrawlConfig,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            host,
            converter,
            sandbox,
            config,
            cancel,
        }
    }

    /// Crawl until exhaustion, the page limit or cancellation.
    ///
    /// Per-page failures never abort the crawl; the report always carries
    /// the products gathered so far.
    pub async fn run(&self, request: &CrawlRequest) -> CrawlReport {
        let mut state = CrawlState::default();
        let mut pages_visited = 0u32;

        info!(
            "Starting pagination crawl of {} (param={}, max_pages={})",
            request.base_url, request.pagination_param, request.max_pages
        );

        let stop_reason = loop {
            if self.cancel.is_cancelled() {
                state.cancelled = true;
                break StopReason::Cancelled;
            }
            if state.page_number > request.max_pages {
                break StopReason::MaxPages;
            }

            let outcome = self.process_page(request, state.page_number).await;
            pages_visited += 1;

            match outcome {
                Ok(products) if !products.is_empty() => {
                    info!(
                        "Page {}: {} products ({} total)",
                        state.page_number,
                        products.len(),
                        state.accumulated.len() + products.len()
                    );
                    state.consecutive_failures = 0;
                    state.accumulated.extend(products);
                }
                Ok(_) => {
                    state.consecutive_failures += 1;
                    info!(
                        "Page {}: no products (failure #{}/{})",
                        state.page_number, state.consecutive_failures, self.config.failure_threshold
                    );
                }
                Err(e) => {
                    state.consecutive_failures += 1;
                    if e.is_recoverable() {
                        warn!(
                            "Page {} failed: {} (failure #{}/{})",
                            state.page_number, e, state.consecutive_failures, self.config.failure_threshold
                        );
                    } else {
                        error!(
                            "Page {} hit a host error: {} (failure #{}/{})",
                            state.page_number, e, state.consecutive_failures, self.config.failure_threshold
                        );
                    }
                }
            }

            if state.consecutive_failures >= self.config.failure_threshold {
                break StopReason::Exhausted;
            }

            state.page_number += 1;
            if state.page_number > request.max_pages {
                break StopReason::MaxPages;
            }

            tokio::time::sleep(self.config.inter_page_delay()).await;

            if self.cancel.is_cancelled() {
                state.cancelled = true;
                break StopReason::Cancelled;
            }
        };

        match stop_reason {
            StopReason::Cancelled => warn!(
                "Crawl cancelled after {} pages with {} products",
                pages_visited,
                state.accumulated.len()
            ),
            reason => info!(
                "Crawl complete ({:?}): {} pages, {} products",
                reason,
                pages_visited,
                state.accumulated.len()
            ),
        }

        CrawlReport {
            products: state.accumulated,
            pages_visited,
            consecutive_failures: state.consecutive_failures,
            stop_reason,
            completed_naturally: !state.cancelled,
        }
    }

    async fn process_page(&self, request: &CrawlRequest, page: u32) -> ExtractResult<Vec<Product>> {
        let text = self.acquire_text(request, page).await?;
        let items = run_extractor(self.sandbox, &request.code, &text).await?;
        Ok(products_from_values(&items))
    }

    async fn acquire_text(&self, request: &CrawlRequest, page: u32) -> ExtractResult<String> {
        if page == 1 {
            if let Some(ref text) = request.initial_text {
                debug!("Page 1: reusing captured content");
                return Ok(text.clone());
            }
            self.ensure_helper().await;
            return self.extract_text(&request.base_url).await;
        }

        let target = page_url(&request.base_url, &request.pagination_param, page)?;
        let landed = navigate_and_wait(self.host, &target, self.config.navigation_timeout()).await?;
        tokio::time::sleep(self.config.settle_delay()).await;
        self.ensure_helper().await;
        self.extract_text(&landed).await
    }

    /// Ping the page helper, re-injecting it up to the retry budget.
    async fn ensure_helper(&self) {
        if self.host.ping().await {
            return;
        }
        for attempt in 1..=self.config.content_script_retries {
            debug!("Page helper not responding, injecting (attempt {})", attempt);
            if let Err(e) = self.host.inject_content_script().await {
                debug!("Helper injection failed: {}", e);
                continue;
            }
            if self.host.ping().await {
                return;
            }
        }
        warn!(
            "Page helper still unresponsive after {} injections",
            self.config.content_script_retries
        );
    }

    async fn extract_text(&self, page_url: &str) -> ExtractResult<String> {
        let attempts = self.config.extraction_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let converted = match self.host.extract_content().await {
                Ok(content) => self.converter.convert(&content, page_url),
                Err(e) => Err(e),
            };
            match converted {
                Ok(text) => return Ok(text),
                Err(e) => {
                    debug!("Extraction attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.config.extraction_retry_delay()).await;
                    }
                }
            }
        }

        Err(ExtractError::ContentUnavailable(format!(
            "{} after {} attempts: {}",
            page_url, attempts, last_error
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PageContent, PageEvent};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::broadcast;

    /// Tab whose helper never loads and whose content is never readable.
    struct DeadTab {
        events: broadcast::Sender<PageEvent>,
        injections: AtomicUsize,
        extractions: AtomicUsize,
    }

    #[async_trait]
    impl PageHost for DeadTab {
        async fn current_url(&self) -> ExtractResult<String> {
            Ok("https://x/list".to_string())
        }

        async fn navigate(&self, _url: &str) -> ExtractResult<()> {
            Ok(())
        }

        fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
            self.events.subscribe()
        }

        async fn ping(&self) -> bool {
            false
        }

        async fn inject_content_script(&self) -> ExtractResult<()> {
            self.injections.fetch_add(1, Ordering::SeqCst);
            Err(ExtractError::Host("blocked by page CSP".to_string()))
        }

        async fn extract_content(&self) -> ExtractResult<PageContent> {
            self.extractions.fetch_add(1, Ordering::SeqCst);
            Err(ExtractError::Host("no document".to_string()))
        }
    }

    struct Passthrough;

    impl ContentConverter for Passthrough {
        fn convert(&self, page: &PageContent, _page_url: &str) -> ExtractResult<String> {
            Ok(page.content.clone())
        }
    }

    struct Unused;

    #[async_trait]
    impl Sandbox for Unused {
        async fn run(&self, _code: &str, _input: &str) -> ExtractResult<Value> {
            Ok(Value::Array(Vec::new()))
        }
    }

    #[tokio::test]
    async fn test_unreadable_page_is_content_unavailable() {
        let tab = DeadTab {
            events: broadcast::channel(4).0,
            injections: AtomicUsize::new(0),
            extractions: AtomicUsize::new(0),
        };
        let config = CrawlConfig::fast();
        let crawler = PaginationCrawler::new(&tab, &Passthrough, &Unused, &config, CancelFlag::new());

        crawler.ensure_helper().await;
        assert_eq!(
            tab.injections.load(Ordering::SeqCst),
            config.content_script_retries as usize
        );

        let err = crawler.extract_text("https://x/list").await.unwrap_err();
        assert!(matches!(err, ExtractError::ContentUnavailable(ref m) if m.contains("no document")));
        assert!(err.is_recoverable());
        assert_eq!(
            tab.extractions.load(Ordering::SeqCst),
            config.extraction_retries as usize
        );
    }
}
