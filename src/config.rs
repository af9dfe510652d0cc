//! Configuration management using the prefer crate for discovery.
//!
//! A config file (`scrapegen.toml`, `.yaml` or `.json`) is found by prefer's
//! standard search and parsed with serde by extension. Every section falls
//! back to defaults with environment overrides applied.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::browser::BrowserConfig;
use crate::crawl::CrawlConfig;
use crate::llm::LlmConfig;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    /// Directory of the parser cache (default: `<data dir>/scrapegen/parsers`).
    #[serde(default)]
    pub cache_dir: Option<String>,
    /// Root for exported results (default: current directory).
    #[serde(default)]
    pub output_dir: Option<String>,
    /// Path of the file this config came from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer for discovery, falling back to
    /// defaults when no file is found or it cannot be parsed.
    pub async fn load() -> Self {
        match prefer::load("scrapegen").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            warn!("Ignoring config {}: {}", path.display(), e);
                            Self::default().with_env_overrides()
                        }
                    }
                } else {
                    Self::default().with_env_overrides()
                }
            }
            Err(e) => {
                debug!("No config file found: {}", e);
                Self::default().with_env_overrides()
            }
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    /// Environment variables take precedence over file values.
    fn with_env_overrides(mut self) -> Self {
        self.llm = self.llm.with_env_overrides();
        self.browser = self.browser.with_env_overrides();
        self
    }

    /// Directory the config file lives in, or the working directory.
    pub fn base_dir(&self) -> PathBuf {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    /// Resolve a configured path: `~` and `$VAR` are expanded, relative
    /// paths are taken relative to [`base_dir`](Self::base_dir).
    pub fn resolve_path(&self, path_str: &str) -> PathBuf {
        let expanded = match shellexpand::full(path_str) {
            Ok(expanded) => expanded.into_owned(),
            Err(e) => {
                warn!("Cannot expand {}: {}", path_str, e);
                path_str.to_string()
            }
        };
        let path = Path::new(&expanded);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        match self.cache_dir {
            Some(ref dir) => self.resolve_path(dir),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("scrapegen")
                .join("parsers"),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        match self.output_dir {
            Some(ref dir) => self.resolve_path(dir),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}
