//! Page URLs for query-parameter pagination.

use url::Url;

use crate::error::{ExtractError, ExtractResult};

/// `url` without any `param=` query pairs.
pub fn strip_param(url: &Url, param: &str) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != param)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut stripped = url.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped
}

/// URL of page `page` of the listing at `base`.
pub fn page_url(base: &str, param: &str, page: u32) -> ExtractResult<String> {
    let parsed = Url::parse(base)
        .map_err(|e| ExtractError::Host(format!("invalid listing URL {}: {}", base, e)))?;
    let mut url = strip_param(&parsed, param);
    url.query_pairs_mut()
        .append_pair(param, &page.to_string());
    Ok(url.to_string())
}

/// Comparison key for "did the tab land on the page we asked for":
/// scheme, host, port, path without trailing slash, and sorted query pairs.
pub fn navigation_key(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.trim().to_string();
    };

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();

    let path = parsed.path().trim_end_matches('/');
    let mut key = format!(
        "{}://{}{}{}",
        parsed.scheme(),
        parsed.host_str().unwrap_or_default(),
        parsed.port().map(|p| format!(":{}", p)).unwrap_or_default(),
        path
    );
    if !pairs.is_empty() {
        let query: Vec<String> = pairs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        key.push('?');
        key.push_str(&query.join("&"));
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_url_replaces_existing_param() {
        assert_eq!(
            page_url("https://x/list?page=7&sort=price", "page", 2).unwrap(),
            "https://x/list?sort=price&page=2"
        );
        assert_eq!(
            page_url("https://x/list", "seite", 3).unwrap(),
            "https://x/list?seite=3"
        );
    }

    #[test]
    fn test_strip_param_drops_empty_query() {
        let url = Url::parse("https://x/list?page=2").unwrap();
        assert_eq!(strip_param(&url, "page").as_str(), "https://x/list");
    }

    #[test]
    fn test_navigation_key_ignores_query_order_and_fragment() {
        assert_eq!(
            navigation_key("https://X/list/?sort=price&page=2#top"),
            navigation_key("https://x/list?page=2&sort=price")
        );
        assert_ne!(
            navigation_key("https://x/list?page=2"),
            navigation_key("https://x/list?page=3")
        );
        assert_ne!(
            navigation_key("https://x/list?page=2"),
            navigation_key("https://x/cart?page=2")
        );
    }
}
