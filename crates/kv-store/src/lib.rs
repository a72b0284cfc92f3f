//! String key-value storage backends for OAuth credential state
//!
//! Defines the `KeyValueStore` trait that decouples credential bookkeeping
//! from the persistence medium. `MemoryStore` keeps values for the lifetime
//! of the process; `FileStore` persists them to a JSON file with owner-only
//! permissions. Encryption at rest, OS keychains and the like are further
//! implementations of the same trait.
//!
//! Contract:
//! - `get` returns an empty string for a key that was never written
//! - `set` either persists the value or returns an error; writes are never
//!   dropped silently

pub mod error;
pub mod file;
pub mod memory;

pub use error::{Error, Result};
pub use file::FileStore;
pub use memory::MemoryStore;

/// Abstract get/set of string values by string key.
///
/// Keys are opaque to the store. Implementations must be `Send + Sync` so a
/// credential state owning one can move across tasks.
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, or `""` if absent.
    fn get(&self, key: &str) -> Result<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}
