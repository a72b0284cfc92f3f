//! State-change notifications
//!
//! `CredentialState` publishes these on a broadcast channel. Publishing
//! happens synchronously inside the mutating call, after the store write has
//! succeeded, so a subscriber that drains with `try_recv` right after a
//! setter returns always sees the event.

use crate::callback::CallbackParams;

/// Capacity of the broadcast channel; slow subscribers see `Lagged`.
pub(crate) const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent {
    LinkedChanged,
    TokenChanged,
    TokenSecretChanged,
    ExtraTokensChanged,
    ClientIdChanged,
    ClientSecretChanged,
    LocalPortChanged,
    /// A redirect was decoded, either by the local listener or through
    /// `process_external_callback`.
    CallbackReceived(CallbackParams),
}
