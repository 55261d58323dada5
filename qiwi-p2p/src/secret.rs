//! Rotatable secret key shared between the API client and the webhook receiver.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

/// The P2P secret key.
///
/// Clones share the same slot, so rotating the key through one handle is seen by every
/// holder, including a running webhook receiver. Each read takes a consistent snapshot.
#[derive(Clone)]
pub struct SecretKey(Arc<ArcSwap<String>>);

impl SecretKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Arc::new(ArcSwap::from_pointee(key.into())))
    }

    /// Snapshot of the current key.
    pub fn load(&self) -> Arc<String> {
        self.0.load_full()
    }

    /// Replace the key for all holders.
    pub fn rotate(&self, key: impl Into<String>) {
        self.0.store(Arc::new(key.into()));
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}
