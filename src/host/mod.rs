//! Collaborator interfaces for the browser tab and content conversion.

mod convert;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::ExtractResult;
use crate::models::{PageContent, PageEvent};

pub use convert::TextConverter;

/// A single browser tab owned by one crawl at a time.
///
/// Navigation is fire-and-forget: `navigate` returns once the request is
/// issued and progress is reported as [`PageEvent`]s to every subscriber.
#[async_trait]
pub trait PageHost: Send + Sync {
    /// URL currently loaded in the tab.
    async fn current_url(&self) -> ExtractResult<String>;

    /// Begin loading `url`.
    async fn navigate(&self, url: &str) -> ExtractResult<()>;

    /// Receive load events emitted after this call.
    fn subscribe(&self) -> broadcast::Receiver<PageEvent>;

    /// Whether the page helper script answers.
    async fn ping(&self) -> bool;

    /// (Re)install the page helper script.
    async fn inject_content_script(&self) -> ExtractResult<()>;

    /// Raw content of the loaded page.
    async fn extract_content(&self) -> ExtractResult<PageContent>;
}

/// Turns raw page content into the text given to the model and the routine.
pub trait ContentConverter: Send + Sync {
    fn convert(&self, page: &PageContent, page_url: &str) -> ExtractResult<String>;
}
