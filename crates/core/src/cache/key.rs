//! Cache key layout.
//!
//! Keys are path-like: `<namespace>/height=<h>`. One `name=value` segment per
//! dimension keeps keys listable by prefix.

/// Segment name for the height dimension.
const HEIGHT_SEGMENT: &str = "height=";

/// Key under which the block at `height` is cached.
pub fn cache_key(namespace: &str, height: u64) -> String {
    format!("{namespace}/{HEIGHT_SEGMENT}{height}")
}

/// Prefix shared by every key in `namespace`.
///
/// Ends in `/` so that `btc` does not also match `btc2/...`.
pub fn namespace_prefix(namespace: &str) -> String {
    format!("{namespace}/")
}

/// Extract the height from a key produced by [`cache_key`].
pub fn parse_height(key: &str) -> Option<u64> {
    let (_, last) = key.rsplit_once('/')?;
    last.strip_prefix(HEIGHT_SEGMENT)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        assert_eq!(cache_key("blockcache/btc", 812_345), "blockcache/btc/height=812345");
        assert_eq!(namespace_prefix("blockcache/btc"), "blockcache/btc/");
    }

    #[test]
    fn test_key_is_under_prefix() {
        let key = cache_key("ns", 3);
        assert!(key.starts_with(&namespace_prefix("ns")));
        assert!(!key.starts_with(&namespace_prefix("n")));
    }

    #[test]
    fn test_parse_height() {
        assert_eq!(parse_height(&cache_key("a/b/c", 42)), Some(42));
        assert_eq!(parse_height("ns/height=abc"), None);
        assert_eq!(parse_height("ns/other=1"), None);
        assert_eq!(parse_height("height=1"), None);
    }
}
