//! Types shared by the OAuth client crates: configuration errors and the
//! redacting `Secret` wrapper used for client secrets and token material.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
