//! Credential state for one client identity at a time
//!
//! `CredentialState` is the single source of truth for link status and
//! token material. Every persisted value is read from and written through to
//! the injected `KeyValueStore` under a key that embeds the current client
//! id, so switching `client_id` switches the whole visible credential set
//! without touching other clients' entries.
//!
//! Linked status: `linked()` is derived from token presence and is the
//! authoritative answer. `LinkedChanged` is published by `set_token()`
//! whenever a write flips that answer. `set_linked()` only writes the legacy
//! presence flag (for stores shared with older clients); the flag is never
//! read back, so it cannot change `linked()` and never notifies.
//!
//! Ownership: one logical owner. Setters take `&mut self`; callers that
//! share a state across threads wrap it in a lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use common::Secret;
use kv_store::{KeyValueStore, MemoryStore};
use tokio::sync::broadcast;
use tracing::debug;

use crate::callback::{CallbackParams, DecodeMode, decode_callback};
use crate::constants::{
    DEFAULT_LOCAL_PORT, PURPOSE_EXTRA_TOKENS, PURPOSE_LINKED, PURPOSE_TOKEN,
    PURPOSE_TOKEN_SECRET, scoped_key,
};
use crate::encode::create_query_parameters;
use crate::error::{Error, Result};
use crate::events::{EVENT_CAPACITY, StateEvent};
use crate::extra_tokens::{self, ExtraTokens};
use crate::listener::{CallbackHandle, CallbackMode};
use crate::metrics;
use crate::token::{TokenResponse, refresh_token_params};

pub struct CredentialState {
    store: Box<dyn KeyValueStore>,
    client_id: String,
    client_secret: Secret<String>,
    mode: CallbackMode,
    decode_mode: DecodeMode,
    events: broadcast::Sender<StateEvent>,
    listener_active: Arc<AtomicBool>,
}

impl CredentialState {
    /// Build a state over `store` with the given callback mode. The mode is
    /// fixed for the lifetime of the state.
    pub fn new(store: impl KeyValueStore + 'static, mode: CallbackMode) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store: Box::new(store),
            client_id: String::new(),
            client_secret: Secret::default(),
            mode,
            decode_mode: DecodeMode::default(),
            events,
            listener_active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// State over the default in-process store.
    pub fn in_memory(mode: CallbackMode) -> Self {
        Self::new(MemoryStore::new(), mode)
    }

    /// Select how callback parameters are percent-decoded.
    pub fn with_decode_mode(mut self, decode_mode: DecodeMode) -> Self {
        self.decode_mode = decode_mode;
        self
    }

    /// Receive every notification published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.events.subscribe()
    }

    /// Replace the storage backend. The previous store is dropped.
    pub fn set_store(&mut self, store: impl KeyValueStore + 'static) {
        debug!(client_id = %self.client_id, "replacing credential store");
        self.store = Box::new(store);
    }

    pub fn mode(&self) -> &CallbackMode {
        &self.mode
    }

    pub fn decode_mode(&self) -> DecodeMode {
        self.decode_mode
    }

    // --- client identity (memory only) ---

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Switch the active credential namespace. Entries stored under the old
    /// id are left as they are.
    pub fn set_client_id(&mut self, client_id: impl Into<String>) {
        self.client_id = client_id.into();
        debug!(client_id = %self.client_id, "client id changed");
        self.publish(StateEvent::ClientIdChanged);
    }

    pub fn client_secret(&self) -> &str {
        self.client_secret.expose()
    }

    pub fn set_client_secret(&mut self, client_secret: impl Into<String>) {
        self.client_secret.replace(client_secret.into());
        self.publish(StateEvent::ClientSecretChanged);
    }

    // --- persisted credentials ---

    /// Whether a non-empty token is stored for the current client id.
    pub fn linked(&self) -> Result<bool> {
        let linked = !self.read(PURPOSE_TOKEN)?.is_empty();
        debug!(client_id = %self.client_id, linked, "linked");
        Ok(linked)
    }

    /// Write the legacy linked flag. `linked()` does not read it back, so
    /// this never publishes `LinkedChanged`.
    pub fn set_linked(&mut self, linked: bool) -> Result<()> {
        self.write(PURPOSE_LINKED, if linked { "1" } else { "" })
    }

    pub fn token(&self) -> Result<String> {
        self.read(PURPOSE_TOKEN)
    }

    /// Store the token. Publishes `TokenChanged` on every call, equal value
    /// or not, followed by `LinkedChanged` when the write flips `linked()`.
    pub fn set_token(&mut self, token: &str) -> Result<()> {
        let was_linked = self.linked()?;
        self.write(PURPOSE_TOKEN, token)?;
        self.publish(StateEvent::TokenChanged);
        let linked = !token.is_empty();
        if was_linked != linked {
            debug!(client_id = %self.client_id, linked, "link status changed");
            self.publish(StateEvent::LinkedChanged);
        }
        Ok(())
    }

    pub fn token_secret(&self) -> Result<String> {
        self.read(PURPOSE_TOKEN_SECRET)
    }

    pub fn set_token_secret(&mut self, token_secret: &str) -> Result<()> {
        self.write(PURPOSE_TOKEN_SECRET, token_secret)?;
        self.publish(StateEvent::TokenSecretChanged);
        Ok(())
    }

    /// Provider-specific values. A missing or corrupt blob reads as empty;
    /// only a failing store is an error.
    pub fn extra_tokens(&self) -> Result<ExtraTokens> {
        let blob = self.read(PURPOSE_EXTRA_TOKENS)?;
        Ok(extra_tokens::decode(&blob))
    }

    pub fn set_extra_tokens(&mut self, tokens: &ExtraTokens) -> Result<()> {
        self.write(PURPOSE_EXTRA_TOKENS, &extra_tokens::encode(tokens))?;
        self.publish(StateEvent::ExtraTokensChanged);
        Ok(())
    }

    /// Refresh token kept in the extra tokens, if any.
    pub fn refresh_token(&self) -> Result<Option<String>> {
        let tokens = self.extra_tokens()?;
        Ok(tokens
            .get("refresh_token")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_owned))
    }

    /// Store a token endpoint response: token, token secret (OAuth 1.0a),
    /// every other field as extra tokens, then the legacy linked flag.
    pub fn apply_token_response(&mut self, response: &TokenResponse) -> Result<()> {
        self.set_token(&response.access_token)?;
        if let Some(secret) = &response.token_secret {
            self.set_token_secret(secret)?;
        }
        self.set_extra_tokens(&response.extra)?;
        self.set_linked(true)
    }

    /// Form-encoded refresh request for the current client, or `None` when
    /// no refresh token is stored.
    pub fn refresh_request_body(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.refresh_token()?.map(|refresh| {
            create_query_parameters(&refresh_token_params(
                &refresh,
                &self.client_id,
                self.client_secret(),
            ))
        }))
    }

    // --- callbacks ---

    /// Decode a redirect URL forwarded by an external interceptor and
    /// publish it as `CallbackReceived`. The decoded set is also returned.
    pub fn process_external_callback(&self, url: &str) -> CallbackParams {
        let params = decode_callback(url, self.decode_mode);
        debug!(params = params.len(), "external callback decoded");
        metrics::record_callback("external");
        self.publish(StateEvent::CallbackReceived(params.clone()));
        params
    }

    /// Reply body served by the local listener; empty when callbacks are
    /// intercepted externally.
    pub fn reply_content(&self) -> &[u8] {
        match &self.mode {
            CallbackMode::SelfHosted { reply_content, .. } => reply_content,
            CallbackMode::ExternallyIntercepted => &[],
        }
    }

    /// No-op when callbacks are intercepted externally.
    pub fn set_reply_content(&mut self, content: impl Into<Vec<u8>>) {
        if let CallbackMode::SelfHosted { reply_content, .. } = &mut self.mode {
            *reply_content = content.into();
        }
    }

    /// Listener port; the default port when callbacks are intercepted
    /// externally.
    pub fn local_port(&self) -> u16 {
        match &self.mode {
            CallbackMode::SelfHosted { port, .. } => *port,
            CallbackMode::ExternallyIntercepted => DEFAULT_LOCAL_PORT,
        }
    }

    /// Change the listener port. Rejected while a listener is running;
    /// no-op when callbacks are intercepted externally.
    pub fn set_local_port(&mut self, new_port: u16) -> Result<()> {
        let CallbackMode::SelfHosted { port, .. } = &mut self.mode else {
            return Ok(());
        };
        if self.listener_active.load(Ordering::SeqCst) {
            return Err(Error::ListenerRunning(*port));
        }
        debug!(port = new_port, "local port changed");
        *port = new_port;
        self.publish(StateEvent::LocalPortChanged);
        Ok(())
    }

    /// Bind the local port and start waiting for the redirect.
    ///
    /// Call this before opening the browser: a port that is already in use
    /// fails here with `Error::PortInUse`.
    pub async fn start_local_listener(&self) -> Result<CallbackHandle> {
        let CallbackMode::SelfHosted {
            port,
            reply_content,
        } = &self.mode
        else {
            return Err(Error::ExternallyIntercepted);
        };
        if self.listener_active.load(Ordering::SeqCst) {
            return Err(Error::ListenerRunning(*port));
        }
        CallbackHandle::start(
            *port,
            reply_content.clone(),
            self.decode_mode,
            self.events.clone(),
            self.listener_active.clone(),
        )
        .await
    }

    fn read(&self, purpose: &str) -> Result<String> {
        Ok(self.store.get(&scoped_key(purpose, &self.client_id))?)
    }

    fn write(&mut self, purpose: &'static str, value: &str) -> Result<()> {
        self.store.set(&scoped_key(purpose, &self.client_id), value)?;
        metrics::record_store_write(purpose);
        debug!(client_id = %self.client_id, purpose, "stored credential value");
        Ok(())
    }

    fn publish(&self, event: StateEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for CredentialState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialState")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret)
            .field("mode", &self.mode)
            .field("decode_mode", &self.decode_mode)
            .finish_non_exhaustive()
    }
}
