//! Error types for the OAuth client core

/// Errors surfaced to callers.
///
/// Malformed callbacks and malformed extra-token blobs are deliberately not
/// represented here: they decode to empty values and are repaired by
/// re-authorizing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] kv_store::Error),

    #[error("callback port {0} is already in use")]
    PortInUse(u16),

    #[error("failed to bind callback port {port}: {reason}")]
    Bind { port: u16, reason: String },

    #[error("local listener already running on port {0}")]
    ListenerRunning(u16),

    #[error("no local listener: callbacks are intercepted externally")]
    ExternallyIntercepted,

    #[error("callback listener closed before a redirect arrived")]
    ListenerClosed,

    #[error("timed out waiting for OAuth callback")]
    Timeout,

    #[error("invalid token response: {0}")]
    TokenResponse(String),

    #[error(transparent)]
    Config(#[from] common::Error),
}

/// Result alias for OAuth core operations.
pub type Result<T> = std::result::Result<T, Error>;
