//! URL normalization for parser cache keys and prefix matching.

use url::Url;

/// Normalize a URL into a cache key: lowercased host without a leading
/// `www.`, followed by the path, with filesystem-unsafe characters replaced.
///
/// Strings that do not parse as absolute URLs are treated as keys already
/// and only sanitized, so `cache_key(cache_key(u)) == cache_key(u)`.
pub fn cache_key(url: &str) -> String {
    match Url::parse(url.trim()) {
        Ok(parsed) if parsed.host_str().is_some() => {
            let host = parsed.host_str().unwrap_or_default().to_lowercase();
            let host = host.strip_prefix("www.").unwrap_or(&host);
            let path = parsed.path().trim_end_matches('/');
            sanitize_key(&format!("{}{}", host, path))
        }
        _ => sanitize_key(url.trim()),
    }
}

/// Replace characters that are unsafe in file names or storage keys.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '#' | '\0' => '_',
            c if c.is_control() || c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

/// Whether two URLs share scheme and hostname.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str().map(str::to_lowercase) == b.host_str().map(str::to_lowercase)
}

/// Whether `prefix` is a path-segment-aligned prefix of `path`.
///
/// `/list` prefixes `/list` and `/list/shoes` but not `/listing`.
pub fn is_segment_prefix(prefix: &str, path: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Normalized path used for prefix comparisons (no trailing slash).
pub fn match_path(url: &Url) -> &str {
    url.path().trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_shape() {
        assert_eq!(
            cache_key("https://WWW.Shop.example/List/Shoes/?page=3#top"),
            "shop.example_List_Shoes"
        );
        assert_eq!(cache_key("https://shop.example/"), "shop.example");
        assert_eq!(cache_key("http://shop.example:8080/a"), "shop.example_a");
    }

    #[test]
    fn test_cache_key_idempotent() {
        for url in [
            "https://www.shop.example/list/shoes?page=2",
            "https://shop.example",
            "http://Sub.Shop.example/a b/c:d",
            "not a url at all",
            "shop.example_list",
        ] {
            let once = cache_key(url);
            assert_eq!(cache_key(&once), once, "not idempotent for {}", url);
        }
    }

    #[test]
    fn test_segment_prefix() {
        assert!(is_segment_prefix("/list", "/list"));
        assert!(is_segment_prefix("/list", "/list/shoes"));
        assert!(is_segment_prefix("/list/", "/list/shoes/"));
        assert!(is_segment_prefix("", "/anything"));
        assert!(is_segment_prefix("/", "/anything"));
        assert!(!is_segment_prefix("/list", "/listing"));
        assert!(!is_segment_prefix("/list/shoes", "/list"));
    }

    #[test]
    fn test_same_origin() {
        let a = Url::parse("https://shop.example/a").unwrap();
        let b = Url::parse("https://shop.example/b?x=1").unwrap();
        let c = Url::parse("http://shop.example/a").unwrap();
        let d = Url::parse("https://other.example/a").unwrap();
        assert!(same_origin(&a, &b));
        assert!(!same_origin(&a, &c));
        assert!(!same_origin(&a, &d));
    }
}
