//! Model endpoint and generation settings.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::prompts::{DEFAULT_EXTRACTION_PROMPT, DEFAULT_REFLECTION_PROMPT};

const OLLAMA_ENDPOINT: &str = "http://localhost:11434";
const OPENAI_ENDPOINT: &str = "https://api.openai.com";

/// Hosted OpenAI-compatible APIs recognized by their key variable, in
/// priority order.
const HOSTED_KEYS: &[(&str, &str)] = &[
    ("OPENAI_API_KEY", OPENAI_ENDPOINT),
    ("GROQ_API_KEY", "https://api.groq.com/openai"),
];

/// Chat API dialect spoken by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// `POST {endpoint}/api/chat`
    #[default]
    Ollama,
    /// `POST {endpoint}/v1/chat/completions`
    #[serde(rename = "openai")]
    OpenAI,
}

impl LlmProvider {
    fn default_endpoint(self) -> &'static str {
        match self {
            LlmProvider::Ollama => OLLAMA_ENDPOINT,
            LlmProvider::OpenAI => OPENAI_ENDPOINT,
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(LlmProvider::Ollama),
            "openai" => Ok(LlmProvider::OpenAI),
            other => Err(format!("unknown LLM provider '{}'", other)),
        }
    }
}

/// Settings for routine generation. Missing keys in a config file take the
/// values of [`LlmConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: LlmProvider,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    /// Low values keep generated code close to the requested shape.
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Replaces the built-in system instruction.
    pub extraction_prompt: Option<String>,
    /// Replaces the built-in reflection template (`{code}`, `{error}`).
    pub reflection_prompt: Option<String>,
    /// Page sample budget in bytes, cut on a character boundary.
    pub max_content_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: LlmProvider::Ollama,
            endpoint: OLLAMA_ENDPOINT.to_string(),
            api_key: None,
            model: "qwen2.5-coder:14b".to_string(),
            max_tokens: 4096,
            temperature: 0.2,
            timeout_secs: 300,
            extraction_prompt: None,
            reflection_prompt: None,
            max_content_chars: 30_000,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    var(name).and_then(|v| v.trim().parse().ok())
}

impl LlmConfig {
    /// Apply `LLM_*` environment overrides.
    ///
    /// Without `LLM_API_KEY`, the first hosted key found (`OPENAI_API_KEY`,
    /// then `GROQ_API_KEY`) is used and selects the OpenAI dialect and that
    /// service's endpoint, unless `LLM_PROVIDER=ollama`. `LLM_ENDPOINT`
    /// always wins.
    pub fn with_env_overrides(self) -> Self {
        self.apply_env(env_var)
    }

    fn apply_env(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = var("LLM_ENABLED") {
            self.enabled = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        let explicit: Option<LlmProvider> = var("LLM_PROVIDER").and_then(|v| v.parse().ok());
        if let Some(provider) = explicit {
            if provider != self.provider && self.endpoint == self.provider.default_endpoint() {
                self.endpoint = provider.default_endpoint().to_string();
            }
            self.provider = provider;
        }

        if let Some(key) = var("LLM_API_KEY") {
            self.api_key = Some(key);
        } else if explicit != Some(LlmProvider::Ollama) {
            let hosted = HOSTED_KEYS
                .iter()
                .find_map(|(name, endpoint)| var(name).map(|key| (key, *endpoint)));
            if let Some((key, endpoint)) = hosted {
                self.api_key = Some(key);
                self.provider = LlmProvider::OpenAI;
                self.endpoint = endpoint.to_string();
            }
        }

        if let Some(endpoint) = var("LLM_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(model) = var("LLM_MODEL") {
            self.model = model;
        }
        if let Some(n) = parse_var(&var, "LLM_MAX_TOKENS") {
            self.max_tokens = n;
        }
        if let Some(t) = parse_var(&var, "LLM_TEMPERATURE") {
            self.temperature = t;
        }
        if let Some(n) = parse_var(&var, "LLM_MAX_CONTENT_CHARS") {
            self.max_content_chars = n;
        }
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// System instruction for every generation request.
    pub fn get_extraction_prompt(&self) -> &str {
        self.extraction_prompt
            .as_deref()
            .unwrap_or(DEFAULT_EXTRACTION_PROMPT)
    }

    /// Template for the follow-up after a failed attempt.
    pub fn get_reflection_prompt(&self) -> &str {
        self.reflection_prompt
            .as_deref()
            .unwrap_or(DEFAULT_REFLECTION_PROMPT)
    }

    /// Longest prefix of `text` within `max_content_chars` bytes.
    pub fn truncate_sample<'a>(&self, text: &'a str) -> &'a str {
        if text.len() <= self.max_content_chars {
            return text;
        }
        let end = (0..=self.max_content_chars)
            .rev()
            .find(|&i| text.is_char_boundary(i))
            .unwrap_or(0);
        &text[..end]
    }
}
