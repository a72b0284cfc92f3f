//! Token endpoint parameters and responses
//!
//! The HTTP exchange itself belongs to the flow; this module only builds the
//! parameter lists handed to `create_query_parameters()` and normalizes the
//! endpoint's answer. OAuth 2.0 endpoints answer with JSON
//! (`access_token`, `refresh_token`, `expires_in`, ...); OAuth 1.0a
//! endpoints answer form-encoded (`oauth_token`, `oauth_token_secret`, ...).
//! Both end up as a `TokenResponse`.

use serde_json::{Map, Value};

use crate::encode::RequestParameter;
use crate::error::{Error, Result};
use crate::extra_tokens::ExtraTokens;

const ACCESS_TOKEN_FIELDS: [&str; 2] = ["access_token", "oauth_token"];
const TOKEN_SECRET_FIELD: &str = "oauth_token_secret";

/// Normalized token endpoint response.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    /// OAuth 1.0a token secret.
    pub token_secret: Option<String>,
    /// Every other field: refresh token, expiry, id token, scope, ...
    pub extra: ExtraTokens,
}

impl TokenResponse {
    /// Parse a JSON object body.
    pub fn from_json(body: &str) -> Result<Self> {
        let fields: Map<String, Value> = serde_json::from_str(body)
            .map_err(|e| Error::TokenResponse(format!("not a JSON object: {e}")))?;
        Self::from_fields(fields.into_iter().collect())
    }

    /// Parse a form-encoded body. Values are kept as strings.
    pub fn from_form(body: &str) -> Result<Self> {
        let fields = url::form_urlencoded::parse(body.trim().as_bytes())
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect();
        Self::from_fields(fields)
    }

    fn from_fields(mut fields: ExtraTokens) -> Result<Self> {
        let access_token = ACCESS_TOKEN_FIELDS
            .iter()
            .find_map(|name| match fields.remove(*name) {
                Some(Value::String(token)) if !token.is_empty() => Some(token),
                _ => None,
            })
            .ok_or_else(|| Error::TokenResponse("missing access token".into()))?;

        let token_secret = match fields.remove(TOKEN_SECRET_FIELD) {
            Some(Value::String(secret)) => Some(secret),
            _ => None,
        };

        Ok(Self {
            access_token,
            token_secret,
            extra: fields,
        })
    }
}

/// Parameters for exchanging an authorization code.
///
/// `client_secret` is omitted for public clients (empty secret).
pub fn authorization_code_params(
    code: &str,
    redirect_uri: &str,
    client_id: &str,
    client_secret: &str,
) -> Vec<RequestParameter> {
    let mut params = vec![
        RequestParameter::new("grant_type", "authorization_code"),
        RequestParameter::new("code", code),
        RequestParameter::new("redirect_uri", redirect_uri),
        RequestParameter::new("client_id", client_id),
    ];
    if !client_secret.is_empty() {
        params.push(RequestParameter::new("client_secret", client_secret));
    }
    params
}

/// Parameters for refreshing an access token.
pub fn refresh_token_params(
    refresh_token: &str,
    client_id: &str,
    client_secret: &str,
) -> Vec<RequestParameter> {
    let mut params = vec![
        RequestParameter::new("grant_type", "refresh_token"),
        RequestParameter::new("refresh_token", refresh_token),
        RequestParameter::new("client_id", client_id),
    ];
    if !client_secret.is_empty() {
        params.push(RequestParameter::new("client_secret", client_secret));
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::create_query_parameters;
    use serde_json::json;

    #[test]
    fn json_response_splits_token_and_extras() {
        let json = r#"{"access_token":"at_abc","refresh_token":"rt_def","expires_in":3600,"token_type":"Bearer"}"#;
        let response = TokenResponse::from_json(json).unwrap();
        assert_eq!(response.access_token, "at_abc");
        assert_eq!(response.token_secret, None);
        assert_eq!(response.extra.get("refresh_token"), Some(&json!("rt_def")));
        assert_eq!(response.extra.get("expires_in"), Some(&json!(3600)));
        assert!(!response.extra.contains_key("access_token"));
    }

    #[test]
    fn form_response_reads_oauth1_fields() {
        let body = "oauth_token=tok&oauth_token_secret=sec&user_id=42";
        let response = TokenResponse::from_form(body).unwrap();
        assert_eq!(response.access_token, "tok");
        assert_eq!(response.token_secret.as_deref(), Some("sec"));
        assert_eq!(response.extra.get("user_id"), Some(&json!("42")));
        assert_eq!(response.extra.len(), 1);
    }

    #[test]
    fn missing_access_token_is_rejected() {
        let err = TokenResponse::from_json(r#"{"error":"invalid_grant"}"#).unwrap_err();
        assert!(matches!(err, Error::TokenResponse(_)), "got: {err:?}");
        assert!(TokenResponse::from_json(r#"{"access_token":""}"#).is_err());
        assert!(TokenResponse::from_json("[]").is_err());
    }

    #[test]
    fn authorization_code_body_is_encoded_in_order() {
        let body = create_query_parameters(&authorization_code_params(
            "c o",
            "http://localhost:1965/",
            "app",
            "s&s",
        ));
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "grant_type=authorization_code&code=c%20o&redirect_uri=http%3A%2F%2Flocalhost%3A1965%2F&client_id=app&client_secret=s%26s"
        );
    }

    #[test]
    fn public_clients_send_no_secret() {
        let params = refresh_token_params("rt", "app", "");
        assert!(params.iter().all(|p| p.name != "client_secret"));
        assert_eq!(params[0], RequestParameter::new("grant_type", "refresh_token"));
    }
}
