//! OAuth client core
//!
//! The flow-independent part of an OAuth client: credential state scoped per
//! client identity, decoding of authorization-server callbacks, a one-shot
//! loopback listener for local redirects, and canonical form encoding of
//! token-exchange parameters. Concrete flows (1.0a, authorization code,
//! password grant) and the HTTP client that talks to the token endpoint sit
//! on top of this crate.
//!
//! Typical flow:
//! 1. Build a `CredentialState` with a store and a `CallbackMode`
//! 2. Self-hosted: `start_local_listener()` binds the port, then the browser
//!    is opened; externally intercepted: the interceptor calls
//!    `process_external_callback()` with the redirect URL
//! 3. The flow reads `code` (or `oauth_verifier`) from the `CallbackParams`
//! 4. The token request body is built with `create_query_parameters()`
//! 5. The response is stored via `apply_token_response()` or the setters
//! 6. Observers follow along through `subscribe()`

pub mod callback;
pub mod config;
pub mod constants;
pub mod encode;
pub mod error;
pub mod events;
pub mod extra_tokens;
pub mod listener;
mod metrics;
pub mod state;
pub mod token;

pub use callback::{CallbackParams, DecodeMode, decode_callback, decode_query};
pub use config::Config;
pub use constants::{DEFAULT_LOCAL_PORT, DEFAULT_REPLY_CONTENT};
pub use encode::{RequestParameter, create_query_parameters};
pub use error::{Error, Result};
pub use events::StateEvent;
pub use extra_tokens::ExtraTokens;
pub use kv_store::{FileStore, KeyValueStore, MemoryStore};
pub use listener::{CallbackHandle, CallbackMode};
pub use state::CredentialState;
pub use token::{TokenResponse, authorization_code_params, refresh_token_params};
