//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The client secret is loaded from the OAUTH_CLIENT_SECRET env var or
//! `client_secret_file`, never from the TOML itself.

use std::path::{Path, PathBuf};

use common::Secret;
use kv_store::{FileStore, MemoryStore};
use serde::Deserialize;

use crate::callback::DecodeMode;
use crate::constants::{DEFAULT_LOCAL_PORT, DEFAULT_REPLY_CONTENT};
use crate::error::Result;
use crate::listener::CallbackMode;
use crate::state::CredentialState;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file holding the client secret (alternative to OAUTH_CLIENT_SECRET)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(default)]
    pub callback: CallbackConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// How redirects reach the client
#[derive(Debug, Deserialize)]
pub struct CallbackConfig {
    #[serde(default)]
    pub mode: CallbackModeKind,
    #[serde(default = "default_port")]
    pub port: u16,
    /// HTML served to the browser after the redirect; built-in page if unset
    #[serde(default)]
    pub reply_file: Option<PathBuf>,
    #[serde(default)]
    pub decode: DecodeMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackModeKind {
    #[default]
    SelfHosted,
    External,
}

/// Credential storage backend
#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    File,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            mode: CallbackModeKind::default(),
            port: default_port(),
            reply_file: None,
            decode: DecodeMode::default(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_LOCAL_PORT
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client secret resolution order:
    /// 1. OAUTH_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }

        if config.callback.mode == CallbackModeKind::SelfHosted && config.callback.port == 0 {
            return Err(common::Error::Config(
                "callback.port must be greater than 0".into(),
            ));
        }

        if config.store.backend == StoreBackend::File && config.store.path.is_none() {
            return Err(common::Error::Config(
                "store.path is required for the file backend".into(),
            ));
        }

        if let Ok(secret) = std::env::var("OAUTH_CLIENT_SECRET") {
            config.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.client_secret = Some(Secret::new(secret));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or OAUTH_CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("OAUTH_CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("oauth.toml")
    }

    /// Callback mode described by this configuration, reading the reply
    /// file if one is configured.
    pub fn callback_mode(&self) -> common::Result<CallbackMode> {
        match self.callback.mode {
            CallbackModeKind::External => Ok(CallbackMode::ExternallyIntercepted),
            CallbackModeKind::SelfHosted => {
                let reply_content = match &self.callback.reply_file {
                    Some(path) => std::fs::read(path).map_err(|e| {
                        common::Error::Config(format!(
                            "failed to read reply_file {}: {e}",
                            path.display()
                        ))
                    })?,
                    None => DEFAULT_REPLY_CONTENT.as_bytes().to_vec(),
                };
                Ok(CallbackMode::SelfHosted {
                    port: self.callback.port,
                    reply_content,
                })
            }
        }
    }

    /// Build a credential state for this client with the configured store,
    /// callback mode and decoding.
    pub fn build_state(&self) -> Result<CredentialState> {
        let mode = self.callback_mode()?;
        let mut state = match (self.store.backend, &self.store.path) {
            (StoreBackend::File, Some(path)) => CredentialState::new(FileStore::open(path)?, mode),
            _ => CredentialState::new(MemoryStore::new(), mode),
        }
        .with_decode_mode(self.callback.decode);

        state.set_client_id(self.client_id.clone());
        if let Some(secret) = &self.client_secret {
            state.set_client_secret(secret.expose().clone());
        }
        Ok(state)
    }
}
