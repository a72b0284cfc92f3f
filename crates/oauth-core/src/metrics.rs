//! Counters for callbacks and store writes
//!
//! - `oauth_callbacks_total` (counter): label `source` (`local` / `external`)
//! - `oauth_store_writes_total` (counter): label `purpose`
//!
//! The embedding application installs the recorder; without one these are
//! no-ops.

pub(crate) fn record_callback(source: &'static str) {
    metrics::counter!("oauth_callbacks_total", "source" => source).increment(1);
}

pub(crate) fn record_store_write(purpose: &'static str) {
    metrics::counter!("oauth_store_writes_total", "purpose" => purpose).increment(1);
}
