//! Tolerant decoding of `{explanation, code}` payloads from model output.
//!
//! Models wrap the payload in fences, surround it with prose, or emit raw
//! newlines inside the `code` string. Decoding tries, in order: strict JSON,
//! JSON after re-escaping control characters inside the `code` value, and a
//! direct scan of the field bodies. When all fail the whole response is the
//! code. Only an empty code body is an error.

use serde_json::Value;
use tracing::debug;

use crate::error::{ExtractError, ExtractResult};

/// Explanation used when the response had to be taken verbatim.
pub const FALLBACK_EXPLANATION: &str =
    "Response was not a JSON payload; the raw response is used as code.";

/// Which decoding step produced the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStrategy {
    Strict,
    Sanitized,
    FieldScan,
    RawFallback,
}

/// Decoded model payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairedResponse {
    pub explanation: String,
    pub code: String,
    pub strategy: RepairStrategy,
}

/// Decode a model response into an explanation and a code body.
pub fn repair_response(raw: &str) -> ExtractResult<RepairedResponse> {
    let candidate = select_candidate(raw);

    let decoded = parse_strict(candidate)
        .map(|(e, c)| (e, c, RepairStrategy::Strict))
        .or_else(|| {
            sanitize_code_field(candidate)
                .and_then(|fixed| parse_strict(&fixed))
                .map(|(e, c)| (e, c, RepairStrategy::Sanitized))
        })
        .or_else(|| scan_fields(candidate).map(|(e, c)| (e, c, RepairStrategy::FieldScan)));

    let (explanation, code, strategy) = decoded.unwrap_or_else(|| {
        (
            FALLBACK_EXPLANATION.to_string(),
            raw.trim().to_string(),
            RepairStrategy::RawFallback,
        )
    });

    if code.trim().is_empty() {
        return Err(ExtractError::MalformedResponse(
            "response contained no code".to_string(),
        ));
    }

    debug!("Decoded model response via {:?}", strategy);
    Ok(RepairedResponse {
        explanation,
        code,
        strategy,
    })
}

fn has_payload_tokens(text: &str) -> bool {
    text.contains("\"explanation\"") && text.contains("\"code\"")
}

/// Pick the JSON candidate: a fenced block with both keys, else a bare
/// `{...}` span with both keys, else the whole response.
fn select_candidate(raw: &str) -> &str {
    if let Some(block) = fenced_blocks(raw).into_iter().find(|b| has_payload_tokens(b)) {
        return block.trim();
    }
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if end > start {
            let span = &raw[start..=end];
            if has_payload_tokens(span) {
                return span;
            }
        }
    }
    raw.trim()
}

/// Bodies of all ``` fenced blocks, with any info string (`json`, `js`) dropped.
fn fenced_blocks(raw: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = raw;

    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let body = match after.find('\n') {
            Some(nl)
                if after[..nl]
                    .trim()
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') =>
            {
                &after[nl + 1..]
            }
            _ => after,
        };
        let Some(close) = body.find("```") else {
            break;
        };
        blocks.push(&body[..close]);
        rest = &body[close + 3..];
    }

    blocks
}

fn parse_strict(candidate: &str) -> Option<(String, String)> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    let obj = value.as_object()?;
    let code = obj.get("code")?.as_str()?.to_string();
    let explanation = obj
        .get("explanation")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    Some((explanation, code))
}

/// Byte range of the body of the string value for `"field": "..."`.
///
/// The closing quote is the first unescaped `"` followed (after optional
/// whitespace) by `,`, `}` or the end of input, so stray quotes inside a
/// broken value do not end it early.
fn locate_string_field(text: &str, field: &str) -> Option<(usize, usize)> {
    let needle = format!("\"{}\"", field);
    let mut search_from = 0;

    while let Some(found) = text[search_from..].find(&needle) {
        let key_end = search_from + found + needle.len();
        search_from = key_end;

        let after_key = &text[key_end..];
        let trimmed = after_key.trim_start();
        let Some(after_colon) = trimmed.strip_prefix(':') else {
            continue;
        };
        let value = after_colon.trim_start();
        if !value.starts_with('"') {
            continue;
        }
        let value_start = text.len() - value.len() + 1;

        let mut escaped = false;
        for (offset, c) in text[value_start..].char_indices() {
            if escaped {
                escaped = false;
                continue;
            }
            match c {
                '\\' => escaped = true,
                '"' => {
                    let idx = value_start + offset;
                    let next = text[idx + 1..].trim_start().chars().next();
                    if matches!(next, None | Some(',') | Some('}')) {
                        return Some((value_start, idx));
                    }
                }
                _ => {}
            }
        }
        return None;
    }

    None
}

/// Re-escape literal control characters inside the `code` value only.
fn sanitize_code_field(candidate: &str) -> Option<String> {
    let (start, end) = locate_string_field(candidate, "code")?;
    let body = &candidate[start..end];
    if !body.chars().any(|c| (c as u32) < 0x20) {
        return None;
    }

    let mut out = String::with_capacity(candidate.len() + 32);
    out.push_str(&candidate[..start]);
    for c in body.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0c}' => out.push_str("\\f"),
            '\u{08}' => out.push_str("\\b"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push_str(&candidate[end..]);
    Some(out)
}

fn scan_fields(candidate: &str) -> Option<(String, String)> {
    let (start, end) = locate_string_field(candidate, "code")?;
    let code = unescape(&candidate[start..end]);
    let explanation = locate_string_field(candidate, "explanation")
        .map(|(s, e)| unescape(&candidate[s..e]))
        .unwrap_or_default();
    Some((explanation, code))
}

/// Undo JSON string escapes; unknown sequences are kept verbatim.
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('f') => out.push('\u{0c}'),
            Some('b') => out.push('\u{08}'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if hex.len() == 4 => out.push(decoded),
                    _ => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_payload() {
        let raw = r#"{"explanation":"split lines","code":"function extractProducts(t){return []}"}"#;
        let repaired = repair_response(raw).unwrap();
        assert_eq!(repaired.strategy, RepairStrategy::Strict);
        assert_eq!(repaired.explanation, "split lines");
        assert_eq!(repaired.code, "function extractProducts(t){return []}");
    }

    #[test]
    fn test_literal_newline_in_code_is_sanitized() {
        let raw = "{\"explanation\":\"e\",\"code\":\"function extractProducts(t){\nreturn []}\"}";
        let repaired = repair_response(raw).unwrap();
        assert_eq!(repaired.strategy, RepairStrategy::Sanitized);
        assert_eq!(repaired.code, "function extractProducts(t){\nreturn []}");
        assert!(repaired.code.contains('\n'));
    }

    #[test]
    fn test_fenced_block_with_prose() {
        let raw = "Here is the parser you asked for:\n\n```json\n{\"explanation\": \"regex over lines\", \"code\": \"function extractProducts(text) {\\n  return [];\\n}\"}\n```\n\nLet me know if it works.";
        let repaired = repair_response(raw).unwrap();
        assert_eq!(repaired.strategy, RepairStrategy::Strict);
        assert_eq!(repaired.code, "function extractProducts(text) {\n  return [];\n}");
    }

    #[test]
    fn test_fence_without_payload_is_skipped() {
        let raw = "```js\nconsole.log(1)\n```\nActual answer: {\"explanation\": \"x\", \"code\": \"function extractProducts(){return []}\"}";
        let repaired = repair_response(raw).unwrap();
        assert_eq!(repaired.code, "function extractProducts(){return []}");
    }

    #[test]
    fn test_bare_span_inside_prose() {
        let raw = "Sure! {\"code\": \"function extractProducts(){return [1]}\", \"explanation\": \"trivial\"} Hope that helps.";
        let repaired = repair_response(raw).unwrap();
        assert_eq!(repaired.explanation, "trivial");
        assert_eq!(repaired.code, "function extractProducts(){return [1]}");
    }

    #[test]
    fn test_field_scan_handles_stray_quotes() {
        // Unescaped quotes inside the code break strict and sanitized parsing.
        let raw = "{\"explanation\": \"uses split\", \"code\": \"function extractProducts(t){ return t.split(\"\\n\").map(l => ({name: l})) }\"}";
        let repaired = repair_response(raw).unwrap();
        assert_eq!(repaired.strategy, RepairStrategy::FieldScan);
        assert_eq!(repaired.explanation, "uses split");
        assert_eq!(
            repaired.code,
            "function extractProducts(t){ return t.split(\"\n\").map(l => ({name: l})) }"
        );
    }

    #[test]
    fn test_raw_fallback_uses_whole_response() {
        let raw = "function extractProducts(text) { return []; }";
        let repaired = repair_response(raw).unwrap();
        assert_eq!(repaired.strategy, RepairStrategy::RawFallback);
        assert_eq!(repaired.explanation, FALLBACK_EXPLANATION);
        assert_eq!(repaired.code, raw);
    }

    #[test]
    fn test_empty_code_is_malformed() {
        assert!(matches!(
            repair_response("   "),
            Err(ExtractError::MalformedResponse(_))
        ));
        assert!(matches!(
            repair_response(r#"{"explanation": "nothing", "code": ""}"#),
            Err(ExtractError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_unescape_sequences() {
        assert_eq!(unescape(r#"a\tb\"c\\d\/e\u00e9"#), "a\tb\"c\\d/e\u{e9}");
        assert_eq!(unescape(r"\q"), "\\q");
    }

    #[test]
    fn test_locate_ignores_key_mentioned_in_text() {
        let text = r#"{"explanation": "the \"code\" field", "code": "x"}"#;
        let (s, e) = locate_string_field(text, "code").unwrap();
        assert_eq!(&text[s..e], "x");
    }
}
