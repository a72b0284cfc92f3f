//! One-shot loopback listener for local redirects
//!
//! In self-hosted mode the authorization server redirects the browser to
//! the loopback port. The listener binds `127.0.0.1:<port>` *before* the
//! browser is opened, so a port that is already taken is reported while the
//! flow can still pick another one.
//!
//! Only IPv4 loopback is bound. Register `http://127.0.0.1:<port>/...` as
//! the redirect URI (`CallbackHandle::redirect_uri` builds it) rather than
//! `localhost`, which browsers may resolve to `::1` first.
//! The first redirect is decoded, handed to the waiting flow and published
//! as `StateEvent::CallbackReceived`, and only then answered with the
//! configured reply body. The server then drains and releases the port.
//!
//! Waiting is cancellable: `cancel()`, `wait_timeout()` and dropping the
//! handle all stop the server task.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, Notify, broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::callback::{CallbackParams, DecodeMode, decode_query};
use crate::constants::{DEFAULT_LOCAL_PORT, DEFAULT_REPLY_CONTENT};
use crate::error::{Error, Result};
use crate::events::StateEvent;
use crate::metrics;

/// How long a stopping listener may spend draining its last connection.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Where redirects are captured. Chosen once when the credential state is
/// built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackMode {
    /// This crate hosts the loopback listener.
    SelfHosted { port: u16, reply_content: Vec<u8> },
    /// A platform component intercepts the redirect and forwards the URL to
    /// `CredentialState::process_external_callback`.
    ExternallyIntercepted,
}

impl CallbackMode {
    /// Self-hosted on the default port with the default reply body.
    pub fn self_hosted() -> Self {
        CallbackMode::SelfHosted {
            port: DEFAULT_LOCAL_PORT,
            reply_content: DEFAULT_REPLY_CONTENT.as_bytes().to_vec(),
        }
    }

    pub fn is_self_hosted(&self) -> bool {
        matches!(self, CallbackMode::SelfHosted { .. })
    }
}

impl Default for CallbackMode {
    fn default() -> Self {
        Self::self_hosted()
    }
}

struct Shared {
    pending: Mutex<Option<oneshot::Sender<CallbackParams>>>,
    done: Notify,
    reply: Bytes,
    decode_mode: DecodeMode,
    events: broadcast::Sender<StateEvent>,
}

/// A running listener waiting for its redirect.
///
/// Owns the bound port until the redirect has been served and the handle is
/// consumed, cancelled or dropped.
#[derive(Debug)]
pub struct CallbackHandle {
    port: u16,
    result: Option<oneshot::Receiver<CallbackParams>>,
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
    active: Arc<AtomicBool>,
}

impl CallbackHandle {
    /// Bind the port and start serving.
    ///
    /// `port` 0 asks the OS for a free port; `port()` reports the real one.
    pub(crate) async fn start(
        port: u16,
        reply_content: Vec<u8>,
        decode_mode: DecodeMode,
        events: broadcast::Sender<StateEvent>,
        active: Arc<AtomicBool>,
    ) -> Result<Self> {
        let listener = bind(port).await?;
        let port = listener
            .local_addr()
            .map_err(|e| Error::Bind {
                port,
                reason: e.to_string(),
            })?
            .port();

        let (result_tx, result_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        let shared = Arc::new(Shared {
            pending: Mutex::new(Some(result_tx)),
            done: Notify::new(),
            reply: Bytes::from(reply_content),
            decode_mode,
            events,
        });

        let app = Router::new()
            .fallback(callback_handler)
            .layer(tower::limit::ConcurrencyLimitLayer::new(1))
            .with_state(shared.clone());

        let shutdown = async move {
            tokio::select! {
                _ = cancel_rx => debug!("callback listener cancelled"),
                _ = shared.done.notified() => debug!("callback captured, draining listener"),
            }
        };

        active.store(true, Ordering::SeqCst);
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
        });

        info!(port, "callback listener started");
        Ok(Self {
            port,
            result: Some(result_rx),
            cancel: Some(cancel_tx),
            task: Some(task),
            active,
        })
    }

    /// Port the listener is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Redirect URI that reaches this listener, for `path` (e.g.
    /// `/callback`). Uses the IPv4 literal that is actually bound.
    pub fn redirect_uri(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("http://{}:{}/{path}", Ipv4Addr::LOCALHOST, self.port)
    }

    /// Wait for the redirect, however long it takes.
    pub async fn wait(mut self) -> Result<CallbackParams> {
        let received = match self.result.take() {
            Some(rx) => rx.await.map_err(|_| Error::ListenerClosed),
            None => Err(Error::ListenerClosed),
        };
        self.shutdown().await;
        received
    }

    /// Wait for the redirect, giving up after `timeout`.
    ///
    /// The port is released before this returns, whatever the outcome.
    pub async fn wait_timeout(mut self, timeout: Duration) -> Result<CallbackParams> {
        let received = match self.result.take() {
            Some(rx) => match tokio::time::timeout(timeout, rx).await {
                Ok(result) => result.map_err(|_| Error::ListenerClosed),
                Err(_) => {
                    warn!(
                        port = self.port,
                        timeout_secs = timeout.as_secs(),
                        "timed out waiting for OAuth callback"
                    );
                    Err(Error::Timeout)
                }
            },
            None => Err(Error::ListenerClosed),
        };
        self.shutdown().await;
        received
    }

    /// Abort the wait and release the port.
    pub async fn cancel(mut self) {
        info!(port = self.port, "cancelling callback listener");
        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
                Ok(Ok(Ok(()))) => debug!(port = self.port, "callback listener stopped"),
                Ok(Ok(Err(e))) => warn!(port = self.port, error = %e, "callback listener failed"),
                Ok(Err(e)) => warn!(port = self.port, error = %e, "callback listener task ended abnormally"),
                Err(_) => {
                    warn!(port = self.port, "callback listener did not drain, aborting");
                    task.abort();
                    let _ = task.await;
                }
            }
        }
        self.active.store(false, Ordering::SeqCst);
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.active.store(false, Ordering::SeqCst);
    }
}

async fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    TcpListener::bind(addr).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::AddrInUse {
            warn!(port, "callback port already in use");
            Error::PortInUse(port)
        } else {
            warn!(port, error = %e, "failed to bind callback port");
            Error::Bind {
                port,
                reason: e.to_string(),
            }
        }
    })
}

async fn callback_handler(State(shared): State<Arc<Shared>>, uri: Uri) -> Response {
    if uri.path() == "/favicon.ico" {
        return StatusCode::NOT_FOUND.into_response();
    }

    let Some(tx) = shared.pending.lock().await.take() else {
        debug!(path = uri.path(), "redirect already captured, ignoring request");
        return StatusCode::GONE.into_response();
    };

    let params = decode_query(uri.query().unwrap_or_default(), shared.decode_mode);
    info!(params = params.len(), "captured OAuth redirect");
    metrics::record_callback("local");

    let _ = shared
        .events
        .send(StateEvent::CallbackReceived(params.clone()));
    let _ = tx.send(params);
    shared.done.notify_one();

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CONNECTION, "close"),
        ],
        shared.reply.clone(),
    )
        .into_response()
}
