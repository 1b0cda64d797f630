//! Verifier extraction from callback URLs
//!
//! The provider does not deliver `oauth_verifier` consistently: sometimes it
//! is in the query string, sometimes a client-side redirect has moved it into
//! the fragment, and occasionally it shows up somewhere else entirely. The
//! extractor tries four layers in order and stops at the first hit:
//!
//! 1. query parameter of the parsed URL
//! 2. fragment parameter of the parsed URL
//! 3. `[?&#]oauth_verifier=` pattern on the raw string
//! 4. permissive `verifier` followed by `=` or `:` anywhere, last match wins
//!
//! # Example
//!
//! ```
//! use fitlink_pairing_sdk::callback::extract;
//!
//! assert_eq!(extract("https://x?oauth_verifier=abc").as_deref(), Some("abc"));
//! assert_eq!(extract("https://x#oauth_verifier=abc").as_deref(), Some("abc"));
//! assert_eq!(extract("https://x"), None);
//! ```

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Query parameter carrying the verifier
pub const VERIFIER_PARAM: &str = "oauth_verifier";
/// Query parameter carrying the request token echoed by the provider
pub const TOKEN_PARAM: &str = "oauth_token";

/// Layer that produced a verifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionMethod {
    /// Query string of a well-formed URL
    Query,
    /// Fragment of a well-formed URL
    Fragment,
    /// Strict pattern on the raw string
    Pattern,
    /// Best-effort permissive pattern
    Permissive,
}

/// A verifier together with the layer that found it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Decoded verifier value
    pub verifier: String,
    /// Layer that matched
    pub method: ExtractionMethod,
}

/// Extract the verifier from a callback URL
#[must_use]
pub fn extract(url: &str) -> Option<String> {
    extract_detailed(url).map(|e| e.verifier)
}

/// Extract the verifier and report which layer matched
#[must_use]
pub fn extract_detailed(raw: &str) -> Option<Extraction> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(raw) {
        if let Some(verifier) = query_param(&url, VERIFIER_PARAM) {
            return Some(Extraction {
                verifier,
                method: ExtractionMethod::Query,
            });
        }
        if let Some(verifier) = fragment_param(&url, VERIFIER_PARAM) {
            return Some(Extraction {
                verifier,
                method: ExtractionMethod::Fragment,
            });
        }
    }

    if let Some(verifier) = verifier_pattern().and_then(|re| first_capture(re, raw)) {
        return Some(Extraction {
            verifier,
            method: ExtractionMethod::Pattern,
        });
    }

    if let Some(verifier) = permissive_pattern().and_then(|re| last_capture(re, raw)) {
        tracing::warn!(
            url = %crate::utils::redact_url(raw),
            "Verifier recovered only by permissive pattern"
        );
        return Some(Extraction {
            verifier,
            method: ExtractionMethod::Permissive,
        });
    }

    None
}

/// Extract the `oauth_token` echoed in a callback URL (layers 1-3 only)
#[must_use]
pub fn extract_token(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(url) = Url::parse(raw) {
        if let Some(token) =
            query_param(&url, TOKEN_PARAM).or_else(|| fragment_param(&url, TOKEN_PARAM))
        {
            return Some(token);
        }
    }
    token_pattern().and_then(|re| first_capture(re, raw))
}

/// Whether `raw` is a callback for this flow
///
/// Matches either the custom `scheme` or anything under `callback_url`.
#[must_use]
pub fn matches_callback(raw: &str, callback_url: &str, scheme: &str) -> bool {
    let Ok(url) = Url::parse(raw.trim()) else {
        return false;
    };
    if url.scheme().eq_ignore_ascii_case(scheme) {
        return true;
    }

    let Ok(base) = Url::parse(callback_url) else {
        return false;
    };
    url.scheme() == base.scheme()
        && url.host_str() == base.host_str()
        && url.port_or_known_default() == base.port_or_known_default()
        && is_under_path(url.path(), base.path())
}

/// `path` equals `base` or is a segment below it
fn is_under_path(path: &str, base: &str) -> bool {
    let base = base.trim_end_matches('/');
    path.strip_prefix(base)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, value)| key == name && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

fn fragment_param(url: &Url, name: &str) -> Option<String> {
    let fragment = url.fragment()?;
    // Client-side routers put a path in front: `#/done?oauth_verifier=...`
    let params = fragment.rsplit_once('?').map_or(fragment, |(_, q)| q);
    url::form_urlencoded::parse(params.as_bytes())
        .find(|(key, value)| key == name && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

fn first_capture(re: &Regex, raw: &str) -> Option<String> {
    re.captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| decode(m.as_str()))
        .filter(|v| !v.is_empty())
}

fn last_capture(re: &Regex, raw: &str) -> Option<String> {
    re.captures_iter(raw)
        .filter_map(|caps| caps.get(1).map(|m| decode(m.as_str())))
        .filter(|v| !v.is_empty())
        .last()
}

fn decode(value: &str) -> String {
    urlencoding::decode(value).map_or_else(|_| value.to_string(), |v| v.into_owned())
}

fn verifier_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"[?&#]oauth_verifier=([^&#\s]+)").ok())
        .as_ref()
}

fn token_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"[?&#]oauth_token=([^&#\s]+)").ok())
        .as_ref()
}

fn permissive_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r#"(?i)verifier["']?\s*[=:]\s*["']?([A-Za-z0-9._~%+\-]+)"#).ok()
        })
        .as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_parameter() {
        let extraction = extract_detailed("https://x?oauth_verifier=abc").unwrap();
        assert_eq!(extraction.verifier, "abc");
        assert_eq!(extraction.method, ExtractionMethod::Query);
    }

    #[test]
    fn test_query_with_other_parameters() {
        assert_eq!(
            extract("https://x?oauth_verifier=abc&other=1").as_deref(),
            Some("abc")
        );
        assert_eq!(
            extract("https://x?oauth_token=T1&oauth_verifier=abc").as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn test_fragment_parameter() {
        let extraction = extract_detailed("https://x#oauth_verifier=abc").unwrap();
        assert_eq!(extraction.verifier, "abc");
        assert_eq!(extraction.method, ExtractionMethod::Fragment);
    }

    #[test]
    fn test_fragment_with_router_path() {
        let extraction =
            extract_detailed("https://x/app#/callback?oauth_token=T&oauth_verifier=xyz").unwrap();
        assert_eq!(extraction.verifier, "xyz");
        assert_eq!(extraction.method, ExtractionMethod::Fragment);
    }

    #[test]
    fn test_missing_verifier() {
        assert_eq!(extract("https://x"), None);
        assert_eq!(extract("https://x?oauth_verifier="), None);
        assert_eq!(extract(""), None);
    }

    #[test]
    fn test_custom_scheme() {
        assert_eq!(
            extract("app://oauth?oauth_verifier=V1").as_deref(),
            Some("V1")
        );
    }

    #[test]
    fn test_pattern_on_unparsable_url() {
        // Not a URL at all: no scheme
        let extraction = extract_detailed("callback?oauth_verifier=abc&x=1").unwrap();
        assert_eq!(extraction.verifier, "abc");
        assert_eq!(extraction.method, ExtractionMethod::Pattern);
    }

    #[test]
    fn test_pattern_decodes_percent_escapes() {
        assert_eq!(
            extract("callback?oauth_verifier=a%2Bb").as_deref(),
            Some("a+b")
        );
    }

    #[test]
    fn test_permissive_takes_last_match() {
        let raw = r#"{"verifier": "old", "result": {"oauth_verifier": "new"}}"#;
        let extraction = extract_detailed(raw).unwrap();
        assert_eq!(extraction.verifier, "new");
        assert_eq!(extraction.method, ExtractionMethod::Permissive);
    }

    #[test]
    fn test_permissive_colon_separator() {
        assert_eq!(
            extract("https://x/done/oauth_verifier:QWE123").as_deref(),
            Some("QWE123")
        );
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(
            extract_token("app://oauth?oauth_token=T1&oauth_verifier=V1").as_deref(),
            Some("T1")
        );
        assert_eq!(
            extract_token("https://x#oauth_token=T2").as_deref(),
            Some("T2")
        );
        assert_eq!(extract_token("https://x?oauth_verifier=V1"), None);
    }

    #[test]
    fn test_matches_callback() {
        let callback = "https://fitlink.app/oauth/callback";
        assert!(matches_callback("app://oauth?oauth_verifier=1", callback, "app"));
        assert!(matches_callback("APP://oauth", callback, "app"));
        assert!(matches_callback(
            "https://fitlink.app/oauth/callback?oauth_verifier=1",
            callback,
            "app"
        ));
        assert!(!matches_callback(
            "https://connect.garmin.com/oauthConfirm?oauth_token=T",
            callback,
            "app"
        ));
        assert!(!matches_callback("other://oauth", callback, "app"));
    }

    #[test]
    fn test_matches_callback_compares_whole_path_segments() {
        let callback = "https://fitlink.app/oauth/callback";
        assert!(matches_callback(
            "https://fitlink.app/oauth/callback/done?oauth_verifier=1",
            callback,
            "app"
        ));
        assert!(matches_callback(
            "https://FITLINK.app:443/oauth/callback",
            callback,
            "app"
        ));
        assert!(!matches_callback(
            "https://fitlink.app/oauth/callbackX?oauth_verifier=1",
            callback,
            "app"
        ));
        assert!(!matches_callback(
            "https://fitlink.app.evil.test/oauth/callback?oauth_verifier=1",
            callback,
            "app"
        ));
        assert!(!matches_callback(
            "http://fitlink.app/oauth/callback?oauth_verifier=1",
            callback,
            "app"
        ));
        assert!(!matches_callback("not a url", callback, "app"));
    }
}
