//! Product records produced by extraction routines.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

static PRICE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d.,\s\u{a0}']*").unwrap());

static CURRENCY_SYMBOLS: &[(&str, &str)] = &[
    ("€", "EUR"),
    ("£", "GBP"),
    ("¥", "JPY"),
    ("₹", "INR"),
    ("₽", "RUB"),
    ("R$", "BRL"),
    ("zł", "PLN"),
    ("kr", "SEK"),
    ("$", "USD"),
];

/// A single product extracted from a listing page.
///
/// Every field is always serialized; absent values become `null` or an
/// empty container so consumers can rely on key presence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price_raw: Option<String>,
    #[serde(default)]
    pub price_normalized: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Product {
    /// Build a product from one element of a routine's output.
    ///
    /// Returns `None` for non-object elements. Unknown keys land in
    /// `attributes`; `priceNormalized` and `currency` are derived from
    /// `priceRaw` when the routine left them empty.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let mut product = Product::default();

        for (key, val) in obj {
            match key.as_str() {
                "name" => product.name = text_field(val),
                "priceRaw" => product.price_raw = text_field(val),
                "priceNormalized" => product.price_normalized = number_field(val),
                "currency" => product.currency = text_field(val),
                "images" => product.images = image_list(val),
                "availability" => product.availability = text_field(val),
                "url" => product.url = text_field(val),
                "attributes" => {
                    if let Some(attrs) = val.as_object() {
                        for (k, v) in attrs {
                            product.attributes.insert(k.clone(), v.clone());
                        }
                    }
                }
                _ => {
                    product.attributes.insert(key.clone(), val.clone());
                }
            }
        }

        if let Some(ref raw) = product.price_raw {
            if product.price_normalized.is_none() {
                product.price_normalized = normalize_price(raw);
            }
            if product.currency.is_none() {
                product.currency = detect_currency(raw);
            }
        }

        Some(product)
    }
}

/// Map every element of a routine's output to a product, dropping non-objects.
pub fn products_from_values(values: &[Value]) -> Vec<Product> {
    values.iter().filter_map(Product::from_value).collect()
}

fn text_field(val: &Value) -> Option<String> {
    match val {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn number_field(val: &Value) -> Option<f64> {
    match val {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => normalize_price(s),
        _ => None,
    }
}

fn image_list(val: &Value) -> Vec<String> {
    match val {
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Object(o) => o
                    .get("src")
                    .or_else(|| o.get("url"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Parse a displayed price such as `"$1,299.00"` or `"1.299,00 €"` into a number.
///
/// The last `.` or `,` is treated as the decimal separator when it is
/// followed by one or two digits; every other separator is a grouping mark.
pub fn normalize_price(raw: &str) -> Option<f64> {
    let matched = PRICE_NUMBER.find(raw)?.as_str();
    let compact: String = matched
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let compact = compact.trim_end_matches(['.', ',']);

    let decimal_at = compact.rfind(['.', ',']).filter(|&idx| {
        let tail = compact.len() - idx - 1;
        tail == 1 || tail == 2
    });

    let normalized: String = match decimal_at {
        Some(idx) => {
            let (int_part, frac_part) = compact.split_at(idx);
            let digits: String = int_part.chars().filter(|c| c.is_ascii_digit()).collect();
            format!("{}.{}", digits, &frac_part[1..])
        }
        None => compact.chars().filter(|c| c.is_ascii_digit()).collect(),
    };

    normalized.parse::<f64>().ok()
}

fn detect_currency(raw: &str) -> Option<String> {
    let upper = raw.to_uppercase();
    for code in ["USD", "EUR", "GBP", "JPY", "CHF", "CAD", "AUD", "BRL", "PLN", "SEK"] {
        if upper.contains(code) {
            return Some(code.to_string());
        }
    }
    CURRENCY_SYMBOLS
        .iter()
        .find(|(symbol, _)| raw.contains(symbol))
        .map(|(_, code)| code.to_string())
}
