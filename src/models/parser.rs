//! Generated extraction routines as persisted in the parser cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An extraction routine produced by the language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedParser {
    /// JavaScript source defining `extractProducts(text)`.
    pub code: String,
    /// URL of the page the routine was generated from.
    pub source_url: String,
    pub title: String,
    pub generated_at: DateTime<Utc>,
}

impl GeneratedParser {
    pub fn new(code: impl Into<String>, source_url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            source_url: source_url.into(),
            title: title.into(),
            generated_at: Utc::now(),
        }
    }
}
