//! Generate, self-test and repair extraction routines.

use serde_json::Value;
use tracing::{info, warn};

use super::repair::repair_response;
use super::validate::validate_products;
use crate::cache::ParserCache;
use crate::error::{ExtractError, ExtractResult};
use crate::llm::{ChatMessage, LanguageModel, LlmConfig, SAMPLE_HEADER};
use crate::models::GeneratedParser;
use crate::sandbox::{run_extractor, Sandbox};

/// Upper bound on model calls for one generation request.
pub const MAX_ITERATIONS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    Initial,
    Reflection,
}

/// The most recent attempt, kept only to build the next prompt.
#[derive(Debug, Clone)]
pub struct GenerationAttempt {
    pub iteration: u32,
    pub variant: PromptVariant,
    pub code: Option<String>,
    pub error: Option<String>,
}

/// A persisted routine and how it was obtained.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub parser: GeneratedParser,
    /// Model calls made.
    pub iterations: u32,
    /// Whether the routine passed execution and validation on the sample.
    pub validated: bool,
}

/// Drives up to [`MAX_ITERATIONS`] generate/execute/validate rounds.
pub struct ParserGenerator<'a> {
    model: &'a dyn LanguageModel,
    sandbox: Option<&'a dyn Sandbox>,
    cache: &'a ParserCache,
    config: &'a LlmConfig,
}

impl<'a> ParserGenerator<'a> {
    /// Generator without an execution host; routines are cached untested.
    pub fn new(model: &'a dyn LanguageModel, cache: &'a ParserCache, config: &'a LlmConfig) -> Self {
        Self {
            model,
            sandbox: None,
            cache,
            config,
        }
    }

    pub fn with_sandbox(mut self, sandbox: &'a dyn Sandbox) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    fn initial_messages(&self, sample: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.config.get_extraction_prompt()),
            ChatMessage::user(format!(
                "{}{}",
                SAMPLE_HEADER,
                self.config.truncate_sample(sample)
            )),
        ]
    }

    fn reflection_messages(&self, sample: &str, previous: &GenerationAttempt) -> Vec<ChatMessage> {
        let error = previous.error.as_deref().unwrap_or("unknown failure");
        let code = previous
            .code
            .as_deref()
            .unwrap_or("(no usable code could be read from the previous response)");
        let reflection = self
            .config
            .get_reflection_prompt()
            .replace("{error}", error)
            .replace("{code}", code);

        vec![
            ChatMessage::system(self.config.get_extraction_prompt()),
            ChatMessage::user(format!(
                "{}\n\n{}{}",
                reflection,
                SAMPLE_HEADER,
                self.config.truncate_sample(sample)
            )),
        ]
    }

    /// Execute and validate `code` against the full sample.
    async fn self_test(&self, sandbox: &dyn Sandbox, code: &str, sample: &str) -> ExtractResult<usize> {
        let items = run_extractor(sandbox, code, sample).await?;
        let count = items.len();
        validate_products(&Value::Array(items))?;
        Ok(count)
    }

    /// Produce and cache a routine for `url` from a page `sample`.
    ///
    /// Execution, validation and parse failures feed the next reflection
    /// prompt. A model transport error is returned only when it happens on
    /// the final iteration.
    pub async fn generate(
        &self,
        url: &str,
        title: &str,
        sample: &str,
    ) -> ExtractResult<GenerationOutcome> {
        let mut previous: Option<GenerationAttempt> = None;
        let mut last_code: Option<String> = None;

        for iteration in 1..=MAX_ITERATIONS {
            let (variant, messages) = match previous {
                None => (PromptVariant::Initial, self.initial_messages(sample)),
                Some(ref attempt) => (
                    PromptVariant::Reflection,
                    self.reflection_messages(sample, attempt),
                ),
            };
            info!(
                "Generating routine for {} (iteration {}/{}, {:?} prompt)",
                url, iteration, MAX_ITERATIONS, variant
            );

            let raw = match self.model.complete(&messages).await {
                Ok(raw) => raw,
                Err(e) if iteration == MAX_ITERATIONS => return Err(e.into()),
                Err(e) => {
                    // Same prompt again next round.
                    warn!("Model call failed on iteration {}: {}", iteration, e);
                    continue;
                }
            };

            let code = match repair_response(&raw) {
                Ok(repaired) => repaired.code,
                Err(e) => {
                    warn!("Iteration {}: {}", iteration, e);
                    previous = Some(GenerationAttempt {
                        iteration,
                        variant,
                        code: None,
                        error: Some(e.to_string()),
                    });
                    continue;
                }
            };
            last_code = Some(code.clone());

            let Some(sandbox) = self.sandbox else {
                info!("No execution host; caching routine without self-test");
                let parser = self.cache.put(url, &code, title).await?;
                return Ok(GenerationOutcome {
                    parser,
                    iterations: iteration,
                    validated: false,
                });
            };

            match self.self_test(sandbox, &code, sample).await {
                Ok(count) => {
                    info!(
                        "Iteration {} accepted: {} items extracted from sample",
                        iteration, count
                    );
                    let parser = self.cache.put(url, &code, title).await?;
                    return Ok(GenerationOutcome {
                        parser,
                        iterations: iteration,
                        validated: true,
                    });
                }
                Err(e) if !e.is_recoverable() => {
                    // Host failure, not a routine failure.
                    return Err(e);
                }
                Err(e) => {
                    warn!("Iteration {} rejected: {}", iteration, e);
                    previous = Some(GenerationAttempt {
                        iteration,
                        variant,
                        code: Some(code),
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        // Out of iterations: keep the last routine even though it failed its
        // self-test. The crawler's consecutive-failure threshold is what stops
        // an unvalidated routine from running across many empty pages.
        match last_code {
            Some(code) => {
                warn!(
                    "No routine passed validation after {} iterations; caching the last one",
                    MAX_ITERATIONS
                );
                let parser = self.cache.put(url, &code, title).await?;
                Ok(GenerationOutcome {
                    parser,
                    iterations: MAX_ITERATIONS,
                    validated: false,
                })
            }
            None => Err(ExtractError::MalformedResponse(format!(
                "no usable code after {} iterations{}",
                MAX_ITERATIONS,
                previous
                    .and_then(|a| a.error)
                    .map(|e| format!(": {}", e))
                    .unwrap_or_default()
            ))),
        }
    }
}
