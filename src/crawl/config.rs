//! Crawl timing and retry settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the pagination crawler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Bound on waiting for a page-load-complete signal (ms).
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,
    /// Delay after load completion before probing the page helper (ms).
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Politeness delay between pages (ms).
    #[serde(default = "default_inter_page_delay_ms")]
    pub inter_page_delay_ms: u64,
    /// Re-injection attempts when the helper does not answer a ping.
    #[serde(default = "default_content_script_retries")]
    pub content_script_retries: u32,
    /// Attempts at extracting and converting page content.
    #[serde(default = "default_extraction_retries")]
    pub extraction_retries: u32,
    /// Pause between extraction attempts (ms).
    #[serde(default = "default_extraction_retry_delay_ms")]
    pub extraction_retry_delay_ms: u64,
    /// Back-to-back empty pages that end a crawl.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Query parameter carrying the page number.
    #[serde(default = "default_pagination_param")]
    pub pagination_param: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

fn default_settle_delay_ms() -> u64 {
    1_000
}

fn default_inter_page_delay_ms() -> u64 {
    1_500
}

fn default_content_script_retries() -> u32 {
    3
}

fn default_extraction_retries() -> u32 {
    3
}

fn default_extraction_retry_delay_ms() -> u64 {
    500
}

fn default_failure_threshold() -> u32 {
    2
}

fn default_pagination_param() -> String {
    "page".to_string()
}

fn default_max_pages() -> u32 {
    10
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: default_navigation_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            inter_page_delay_ms: default_inter_page_delay_ms(),
            content_script_retries: default_content_script_retries(),
            extraction_retries: default_extraction_retries(),
            extraction_retry_delay_ms: default_extraction_retry_delay_ms(),
            failure_threshold: default_failure_threshold(),
            pagination_param: default_pagination_param(),
            max_pages: default_max_pages(),
        }
    }
}

impl CrawlConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn inter_page_delay(&self) -> Duration {
        Duration::from_millis(self.inter_page_delay_ms)
    }

    pub fn extraction_retry_delay(&self) -> Duration {
        Duration::from_millis(self.extraction_retry_delay_ms)
    }

    /// Same settings with every delay and timeout scaled down, for fakes.
    pub fn fast() -> Self {
        Self {
            navigation_timeout_ms: 200,
            settle_delay_ms: 1,
            inter_page_delay_ms: 1,
            extraction_retry_delay_ms: 1,
            ..Self::default()
        }
    }
}
