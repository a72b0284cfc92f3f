//! Form encoding of token-exchange parameters
//!
//! Produces `application/x-www-form-urlencoded` bytes with RFC 3986
//! escaping: everything except `A-Z a-z 0-9 - _ . ~` is percent-encoded, so
//! a space becomes `%20` rather than `+`. Pair order is the caller's order;
//! flows that sign requests depend on the output being byte-stable.

/// One raw (not yet encoded) request parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParameter {
    pub name: String,
    pub value: String,
}

impl RequestParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl<N: Into<String>, V: Into<String>> From<(N, V)> for RequestParameter {
    fn from((name, value): (N, V)) -> Self {
        Self::new(name, value)
    }
}

/// Encode `parameters` as `name=value` pairs joined by `&`.
///
/// Empty input yields empty output; there is never a trailing separator.
pub fn create_query_parameters(parameters: &[RequestParameter]) -> Vec<u8> {
    let mut out = String::new();
    for (i, param) in parameters.iter().enumerate() {
        if i > 0 {
            out.push('&');
        }
        out.push_str(&urlencoding::encode(&param.name));
        out.push('=');
        out.push_str(&urlencoding::encode(&param.value));
    }
    out.into_bytes()
}
