//! Extra-token blob encoding
//!
//! Provider-specific values (refresh token, expiry, id token, scope...) are
//! stored as one opaque value: the map serialized to JSON bytes, then
//! standard base64. Reading never fails: a missing, corrupt or non-object
//! blob is an empty map, since re-authorizing rewrites it.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use tracing::warn;

/// Provider-specific values beyond the primary token.
pub type ExtraTokens = BTreeMap<String, Value>;

pub(crate) fn encode(tokens: &ExtraTokens) -> String {
    // A map with string keys always serializes.
    let bytes = serde_json::to_vec(tokens).unwrap_or_default();
    STANDARD.encode(bytes)
}

pub(crate) fn decode(blob: &str) -> ExtraTokens {
    if blob.is_empty() {
        return ExtraTokens::new();
    }
    let bytes = match STANDARD.decode(blob.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "extra tokens blob is not base64, treating as empty");
            return ExtraTokens::new();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(tokens) => tokens,
        Err(e) => {
            warn!(error = %e, "extra tokens blob does not decode to a map, treating as empty");
            ExtraTokens::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn map_survives_encoding() {
        let mut tokens = ExtraTokens::new();
        tokens.insert("refresh_token".into(), json!("rt_abc"));
        tokens.insert("expires_in".into(), json!(3600));
        tokens.insert("scope".into(), json!(["read", "write"]));
        tokens.insert("id_token_claims".into(), json!({"sub": "42", "email_verified": true}));

        assert_eq!(decode(&encode(&tokens)), tokens);
    }

    #[test]
    fn empty_map_encodes_to_non_empty_blob() {
        let blob = encode(&ExtraTokens::new());
        assert!(!blob.is_empty());
        assert!(decode(&blob).is_empty());
    }

    #[test]
    fn missing_blob_is_empty() {
        assert!(decode("").is_empty());
    }

    #[test]
    fn corrupt_base64_is_empty() {
        assert!(decode("%%% not base64 %%%").is_empty());
    }

    #[test]
    fn base64_of_non_map_is_empty() {
        assert!(decode(&STANDARD.encode(b"[1,2,3]")).is_empty());
        assert!(decode(&STANDARD.encode([0xde, 0xad, 0xbe, 0xef])).is_empty());
    }
}
