//! Default prompts for extraction-routine generation.

/// System instruction for the first generation attempt.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"You write JavaScript that extracts product listings from page text.

You will receive the text of a product listing page (converted from HTML to a markdown-like form). Write a single function:

    function extractProducts(text) { ... }

It receives the FULL page text as a string and must return an ARRAY of objects, one per product, each with exactly these keys:
- name: product name (string or null)
- priceRaw: the price exactly as displayed (string or null)
- priceNormalized: the price as a number without currency symbols or grouping separators (number or null)
- currency: ISO 4217 code when it can be inferred (string or null)
- images: image URLs (array of strings, empty if none)
- availability: stock text such as "In stock" (string or null)
- url: product link (string or null)
- attributes: any other useful fields (object, empty if none)

RULES:
1. Use only plain JavaScript string and regex operations. No DOM, no network, no imports, no globals other than the argument.
2. Do not hard-code products from the sample. The function will run on other pages of the same listing.
3. Never throw. Return an empty array when nothing matches.
4. Absent values must be null (or [] / {}), never omitted.

Respond with ONLY a JSON object of the form:
{"explanation": "<one or two sentences on the approach>", "code": "<the complete function source>"}"#;

/// Follow-up template used after a failed attempt.
pub const DEFAULT_REFLECTION_PROMPT: &str = r#"The previous extractProducts function did not work.

Previous code:
```javascript
{code}
```

Problem:
{error}

Fix the function so it returns a non-empty array of product objects for the page text below. Keep the same output shape and the same JSON response format: {"explanation": "...", "code": "..."}"#;

/// Header placed above the page sample in user messages.
pub const SAMPLE_HEADER: &str = "Page text:\n\n";
