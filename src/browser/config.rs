//! Browser configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How to obtain a Chrome instance. Missing keys take the values of
/// [`BrowserConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,

    /// DevTools URL of a running browser (e.g. "ws://localhost:9222").
    /// When set, nothing is launched.
    pub remote_url: Option<String>,

    /// Chrome binary to launch instead of searching for one.
    pub chrome_path: Option<PathBuf>,

    /// CDP request timeout in seconds.
    pub timeout: u64,

    /// Upper bound in seconds for one sandboxed routine execution.
    pub script_timeout: u64,

    /// Extra command-line flags for a launched Chrome.
    pub chrome_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            remote_url: None,
            chrome_path: None,
            timeout: 30,
            script_timeout: 10,
            chrome_args: Vec::new(),
        }
    }
}

impl BrowserConfig {
    /// Apply `BROWSER_REMOTE_URL`, `BROWSER_HEADLESS` and `BROWSER_CHROME_PATH`.
    pub fn with_env_overrides(self) -> Self {
        self.apply_env(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
    }

    fn apply_env(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var("BROWSER_REMOTE_URL") {
            self.remote_url = Some(url);
        }
        if let Some(val) = var("BROWSER_HEADLESS") {
            self.headless = !(val.eq_ignore_ascii_case("false") || val == "0");
        }
        if let Some(path) = var("BROWSER_CHROME_PATH") {
            self.chrome_path = Some(PathBuf::from(path));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: BrowserConfig = toml::from_str("headless = false").unwrap();
        assert!(!config.headless);
        assert_eq!(config.timeout, 30);
        assert_eq!(config.script_timeout, 10);
        assert!(config.chrome_args.is_empty());
    }

    #[test]
    fn test_env_overrides() {
        let config = BrowserConfig::default().apply_env(|name| match name {
            "BROWSER_HEADLESS" => Some("0".into()),
            "BROWSER_CHROME_PATH" => Some("/opt/chrome/chrome".into()),
            _ => None,
        });
        assert!(!config.headless);
        assert!(config.remote_url.is_none());
        assert_eq!(config.chrome_path, Some(PathBuf::from("/opt/chrome/chrome")));
    }
}
