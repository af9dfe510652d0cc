//! Hand-off of extracted products to a save/export path.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ExtractResult;
use crate::models::Product;
use crate::storage::StorageError;

/// Output encoding for exported products.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Markdown,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "md",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Markdown => "text/markdown",
        }
    }
}

/// Destination for rendered results.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Store `content` under the relative `file_name`; returns where it went.
    async fn persist(&self, content: &str, file_name: &str, mime_type: &str) -> ExtractResult<String>;
}

/// Writes results below a root directory.
#[derive(Debug, Clone)]
pub struct FileSink {
    root: PathBuf,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ResultSink for FileSink {
    async fn persist(&self, content: &str, file_name: &str, mime_type: &str) -> ExtractResult<String> {
        let path = self.root.join(file_name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        info!("Saved {} ({}, {} bytes)", path.display(), mime_type, content.len());
        Ok(path.display().to_string())
    }
}

/// Make a page title usable as a single path component.
pub fn sanitize_title(title: &str) -> String {
    let sanitized: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = sanitized.trim().trim_matches('_').trim_matches('.');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.chars().take(100).collect::<String>().trim_end().to_string()
    }
}

/// `code-generated/{title}/extracted-products[-all-pages].{ext}`
pub fn export_file_name(title: &str, all_pages: bool, format: ExportFormat) -> String {
    format!(
        "code-generated/{}/extracted-products{}.{}",
        sanitize_title(title),
        if all_pages { "-all-pages" } else { "" },
        format.extension()
    )
}

fn cell(value: Option<&str>) -> String {
    value
        .unwrap_or("")
        .replace('|', "\\|")
        .replace(['\n', '\r'], " ")
}

fn render_markdown(products: &[Product], title: &str, source_url: &str) -> String {
    let mut out = format!("# {}\n\nSource: {}\n\n", title, source_url);
    out.push_str(&format!("{} products\n\n", products.len()));
    out.push_str("| # | Name | Price | Currency | Availability | URL |\n");
    out.push_str("|---|------|-------|----------|--------------|-----|\n");

    for (i, product) in products.iter().enumerate() {
        let price = product
            .price_raw
            .clone()
            .or_else(|| product.price_normalized.map(|p| p.to_string()));
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            i + 1,
            cell(product.name.as_deref()),
            cell(price.as_deref()),
            cell(product.currency.as_deref()),
            cell(product.availability.as_deref()),
            cell(product.url.as_deref()),
        ));
    }
    out
}

/// Render products in the requested format.
pub fn render_products(
    products: &[Product],
    title: &str,
    source_url: &str,
    format: ExportFormat,
) -> ExtractResult<String> {
    match format {
        ExportFormat::Json => {
            Ok(serde_json::to_string_pretty(products).map_err(StorageError::from)?)
        }
        ExportFormat::Markdown => Ok(render_markdown(products, title, source_url)),
    }
}

/// Render and persist products; returns the sink's location for them.
pub async fn export_products(
    sink: &dyn ResultSink,
    products: &[Product],
    title: &str,
    source_url: &str,
    all_pages: bool,
    format: ExportFormat,
) -> ExtractResult<String> {
    let content = render_products(products, title, source_url, format)?;
    let file_name = export_file_name(title, all_pages, format);
    sink.persist(&content, &file_name, format.mime_type()).await
}
