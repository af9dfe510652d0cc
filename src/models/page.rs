//! Page-level records exchanged with the tab host.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Raw content pulled from a loaded page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    /// Page HTML.
    pub content: String,
    pub title: String,
    /// Meta tags and similar page-level fields (`description`, `og:site_name`, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Load status reported by the tab host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Loading,
    Complete,
    /// The load was abandoned or rejected by the browser.
    Failed,
}

/// A load-progress event for the crawl tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEvent {
    pub status: LoadStatus,
    pub url: String,
}

impl PageEvent {
    pub fn loading(url: impl Into<String>) -> Self {
        Self {
            status: LoadStatus::Loading,
            url: url.into(),
        }
    }

    pub fn complete(url: impl Into<String>) -> Self {
        Self {
            status: LoadStatus::Complete,
            url: url.into(),
        }
    }

    pub fn failed(url: impl Into<String>) -> Self {
        Self {
            status: LoadStatus::Failed,
            url: url.into(),
        }
    }
}
