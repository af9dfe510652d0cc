//! Isolated execution of generated extraction routines.
//!
//! A [`Sandbox`] runs untrusted code that defines `extractProducts(text)` and
//! hands back whatever it returned. [`run_extractor`] layers the array
//! contract on top so every implementation reports non-array results the
//! same way.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{ExtractError, ExtractResult};

/// Execution boundary for generated code.
///
/// Implementations must not expose any state beyond the single text
/// argument and the returned value. Runtime exceptions and a missing
/// `extractProducts` surface as [`ExtractError::Execution`].
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Evaluate `code`, call `extractProducts(input)` and return its result.
    async fn run(&self, code: &str, input: &str) -> ExtractResult<Value>;
}

/// Execute `code` against `input` and require an array result.
pub async fn run_extractor(
    sandbox: &dyn Sandbox,
    code: &str,
    input: &str,
) -> ExtractResult<Vec<Value>> {
    let output = sandbox.run(code, input).await?;
    match output {
        Value::Array(items) => {
            debug!("Routine returned {} items", items.len());
            Ok(items)
        }
        other => Err(ExtractError::Execution(format!(
            "extractProducts returned {} instead of an array",
            match other {
                Value::Null => "null/undefined",
                Value::Bool(_) => "a boolean",
                Value::Number(_) => "a number",
                Value::String(_) => "a string",
                Value::Object(_) => "an object",
                Value::Array(_) => "an array",
            }
        ))),
    }
}

/// Wrapper script evaluated by script-engine sandboxes.
///
/// The routine is compiled with `new Function` so it sees only its own
/// scope; the input goes in as a JSON string literal and the outcome comes
/// back as a JSON string `{"ok": value}` or `{"error": message}`.
pub fn harness_script(code: &str, input: &str) -> ExtractResult<String> {
    let code_literal = serde_json::to_string(code)
        .map_err(|e| ExtractError::Execution(format!("cannot encode code: {}", e)))?;
    let input_literal = serde_json::to_string(input)
        .map_err(|e| ExtractError::Execution(format!("cannot encode input: {}", e)))?;

    Ok(format!(
        r#"(() => {{
  try {{
    const factory = new Function({code_literal} + "\n;return typeof extractProducts === 'function' ? extractProducts : undefined;");
    const extractProducts = factory();
    if (typeof extractProducts !== 'function') {{
      return JSON.stringify({{ error: "extractProducts is not defined" }});
    }}
    const result = extractProducts({input_literal});
    return JSON.stringify({{ ok: result === undefined ? null : result }});
  }} catch (e) {{
    return JSON.stringify({{ error: String(e && e.stack ? e.stack : e) }});
  }}
}})()"#
    ))
}

/// Decode the JSON string produced by [`harness_script`].
pub fn decode_harness_output(raw: &str) -> ExtractResult<Value> {
    let envelope: Value = serde_json::from_str(raw)
        .map_err(|e| ExtractError::Execution(format!("unreadable sandbox output: {}", e)))?;
    if let Some(error) = envelope.get("error") {
        let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
        return Err(ExtractError::Execution(message));
    }
    match envelope.get("ok") {
        Some(value) => Ok(value.clone()),
        None => Err(ExtractError::Execution(
            "sandbox output had neither result nor error".to_string(),
        )),
    }
}
