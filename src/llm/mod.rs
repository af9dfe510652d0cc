//! LLM integration for extraction-routine generation.

mod client;

pub use client::{
    ChatMessage, LanguageModel, LlmClient, LlmConfig, LlmError, LlmProvider, Role,
    DEFAULT_EXTRACTION_PROMPT, DEFAULT_REFLECTION_PROMPT, SAMPLE_HEADER,
};
