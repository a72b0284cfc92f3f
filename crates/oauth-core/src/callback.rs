//! Callback parameter decoding
//!
//! Turns the redirect an authorization server sends the browser back to into
//! an ordered multi-map of parameters. No parameter names are interpreted
//! here; spotting `code`, `error` or `oauth_verifier` is the flow's job.
//!
//! Decoding: the query is split on `&` and `=` and each key and value is
//! percent-decoded once. In `DecodeMode::Double` (the default) the trimmed
//! key and value are decoded a second time, because at least one major
//! provider double-encodes its redirect parameters. The second pass is
//! applied uniformly, not only when a value looks encoded.
//!
//! Both passes are plain percent-decoding: a literal `+` stays a `+`, so
//! unencoded `state` or `scope` values come back exactly as they were sent.

use std::borrow::Cow;

use serde::Deserialize;
use tracing::debug;
use url::Url;

/// How many percent-decoding passes callback parameters receive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// Query parser pass only.
    Single,
    /// Query parser pass plus one explicit pass.
    #[default]
    Double,
}

impl DecodeMode {
    fn finish<'a>(self, raw: &'a str) -> Cow<'a, str> {
        let trimmed = raw.trim();
        match self {
            DecodeMode::Single => Cow::Borrowed(trimmed),
            DecodeMode::Double => percent_decode(trimmed),
        }
    }
}

fn percent_decode(s: &str) -> Cow<'_, str> {
    match urlencoding::decode(s) {
        Ok(decoded) => decoded,
        // Not valid UTF-8 after decoding: keep what can be shown.
        Err(_) => Cow::Owned(String::from_utf8_lossy(&urlencoding::decode_binary(s.as_bytes())).into_owned()),
    }
}

/// Decoded callback parameters.
///
/// A name may carry several values; values for one name keep the order in
/// which they appeared in the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    entries: Vec<(String, String)>,
}

impl CallbackParams {
    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in query order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    /// Every `(name, value)` pair in query order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for CallbackParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Decode the query of a full redirect URL.
///
/// An unparsable URL yields an empty set. Callers treat a missing `code` (or
/// equivalent) as an authorization failure.
pub fn decode_callback(url: &str, mode: DecodeMode) -> CallbackParams {
    match Url::parse(url.trim()) {
        Ok(parsed) => decode_query(parsed.query().unwrap_or_default(), mode),
        Err(e) => {
            debug!(error = %e, "unparsable callback URL, treating as empty");
            CallbackParams::default()
        }
    }
}

/// Decode a raw query string (without the leading `?`).
///
/// Empty pairs are skipped; a pair without `=` has an empty value.
pub fn decode_query(query: &str, mode: DecodeMode) -> CallbackParams {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (
                mode.finish(&percent_decode(key)).into_owned(),
                mode.finish(&percent_decode(value)).into_owned(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_encoded_value_is_decoded_twice() {
        let params = decode_callback("http://localhost/cb?code=a%2520b", DecodeMode::Double);
        assert_eq!(params.get("code"), Some("a b"));
    }

    #[test]
    fn single_mode_stops_after_query_parser() {
        let params = decode_callback("http://localhost/cb?code=a%2520b", DecodeMode::Single);
        assert_eq!(params.get("code"), Some("a%20b"));
    }

    #[test]
    fn keys_are_decoded_too() {
        let params = decode_callback("http://localhost/?st%2561te=xyz", DecodeMode::Double);
        assert_eq!(params.get("state"), Some("xyz"));
    }

    #[test]
    fn whitespace_is_trimmed() {
        let params = decode_callback(
            "http://localhost:1965/?%20code%20=%20abc%20&state=s",
            DecodeMode::Double,
        );
        assert_eq!(params.get("code"), Some("abc"));
        assert_eq!(params.get("state"), Some("s"));
    }

    #[test]
    fn repeated_names_keep_order() {
        let params = decode_callback(
            "http://localhost/cb?scope=read&code=c&scope=write&scope=admin",
            DecodeMode::Double,
        );
        let scopes: Vec<&str> = params.get_all("scope").collect();
        assert_eq!(scopes, vec!["read", "write", "admin"]);
        assert_eq!(params.get("scope"), Some("read"));
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn names_are_not_interpreted() {
        let params = decode_callback(
            "http://localhost/cb?error=access_denied&error_description=User%2Bdenied",
            DecodeMode::Double,
        );
        assert!(params.contains("error"));
        assert!(!params.contains("code"));
        assert_eq!(params.get("error_description"), Some("User+denied"));
    }

    #[test]
    fn unparsable_url_is_empty() {
        assert!(decode_callback("not a url", DecodeMode::Double).is_empty());
        assert!(decode_callback("", DecodeMode::Double).is_empty());
    }

    #[test]
    fn url_without_query_is_empty() {
        assert!(decode_callback("http://localhost:1965/", DecodeMode::Double).is_empty());
    }

    #[test]
    fn raw_query_uses_same_path() {
        let params = decode_query("oauth_token=t1&oauth_verifier=v%2531", DecodeMode::Double);
        assert_eq!(params.get("oauth_token"), Some("t1"));
        assert_eq!(params.get("oauth_verifier"), Some("v1"));
    }

    #[test]
    fn invalid_utf8_after_second_pass_does_not_fail() {
        let params = decode_query("code=%25FF", DecodeMode::Double);
        assert_eq!(params.get("code"), Some("\u{FFFD}"));
    }

    #[test]
    fn literal_plus_is_kept_in_both_modes() {
        for mode in [DecodeMode::Double, DecodeMode::Single] {
            let params = decode_callback(
                "http://localhost/cb?state=ab+cd&scope=email+profile",
                mode,
            );
            assert_eq!(params.get("state"), Some("ab+cd"), "{mode:?}");
            assert_eq!(params.get("scope"), Some("email+profile"), "{mode:?}");
        }
    }

    #[test]
    fn empty_pairs_and_bare_names() {
        let params = decode_query("&code=c&&flag&", DecodeMode::Double);
        let pairs: Vec<(&str, &str)> = params.iter().collect();
        assert_eq!(pairs, vec![("code", "c"), ("flag", "")]);
    }

    #[test]
    fn iter_yields_pairs_in_order() {
        let params = decode_query("b=2&a=1", DecodeMode::Single);
        let pairs: Vec<(&str, &str)> = params.iter().collect();
        assert_eq!(pairs, vec![("b", "2"), ("a", "1")]);
    }
}
