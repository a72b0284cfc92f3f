//! Defaults and storage key layout
//!
//! Every persisted value lives under `<purpose>_<client_id>`. Purposes never
//! contain `_`, so the first `_` always separates purpose from client id and
//! two clients sharing one backend cannot collide.

/// Loopback port used for local redirects unless configured otherwise.
pub const DEFAULT_LOCAL_PORT: u16 = 1965;

/// Body returned to the browser once the redirect has been captured.
pub const DEFAULT_REPLY_CONTENT: &str = "<html><head><title>Authorization complete</title></head>\
    <body><p>Authorization complete. You may close this window.</p></body></html>";

pub(crate) const PURPOSE_LINKED: &str = "linked";
pub(crate) const PURPOSE_TOKEN: &str = "token";
pub(crate) const PURPOSE_TOKEN_SECRET: &str = "tokensecret";
pub(crate) const PURPOSE_EXTRA_TOKENS: &str = "extratokens";

/// Storage key for `purpose` under the given client id.
pub(crate) fn scoped_key(purpose: &str, client_id: &str) -> String {
    format!("{purpose}_{client_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_embed_client_id() {
        assert_eq!(scoped_key(PURPOSE_TOKEN, "app-1"), "token_app-1");
        assert_eq!(scoped_key(PURPOSE_EXTRA_TOKENS, "a_b"), "extratokens_a_b");
    }

    #[test]
    fn purposes_never_contain_separator() {
        for purpose in [
            PURPOSE_LINKED,
            PURPOSE_TOKEN,
            PURPOSE_TOKEN_SECRET,
            PURPOSE_EXTRA_TOKENS,
        ] {
            assert!(!purpose.contains('_'), "{purpose} would make keys ambiguous");
        }
    }
}
