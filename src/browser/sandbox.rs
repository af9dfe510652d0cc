//! Routine execution inside throwaway `about:blank` pages.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Browser;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ExtractError, ExtractResult};
use crate::sandbox::{decode_harness_output, harness_script, Sandbox};

/// Runs each routine in a fresh blank page with no origin, cookies or
/// access to the crawl tab; the page is closed after every run.
pub struct BrowserSandbox {
    browser: Arc<Mutex<Browser>>,
    timeout: Duration,
}

impl BrowserSandbox {
    pub(crate) fn new(browser: Arc<Mutex<Browser>>, timeout: Duration) -> Self {
        Self { browser, timeout }
    }
}

#[async_trait]
impl Sandbox for BrowserSandbox {
    async fn run(&self, code: &str, input: &str) -> ExtractResult<Value> {
        let script = harness_script(code, input)?;

        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| ExtractError::Host(e.to_string()))?
        };

        debug!("Running routine ({} bytes) on {} chars", code.len(), input.len());
        let outcome = tokio::time::timeout(self.timeout, page.evaluate(script)).await;
        let _ = page.close().await;

        let raw: String = match outcome {
            Ok(Ok(result)) => result
                .into_value()
                .map_err(|e| ExtractError::Execution(format!("unexpected result: {}", e)))?,
            Ok(Err(e)) => return Err(ExtractError::Execution(e.to_string())),
            Err(_) => {
                return Err(ExtractError::Execution(format!(
                    "routine did not finish within {:?}",
                    self.timeout
                )))
            }
        };

        decode_harness_output(&raw)
    }
}
