//! Cancellation registry: external correlation key → cancel signal.
//!
//! An entry lives exactly as long as its [`Registration`]. The engine holds
//! the registration inside the operation's task, so the entry disappears on
//! every terminal path (success, error, cancellation, panic unwinding).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Shared map of in-flight operations. Cheap to clone.
#[derive(Clone, Default)]
pub struct CancellationRegistry {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: Mutex<HashMap<String, Entry>>,
    next_id: AtomicU64,
}

struct Entry {
    id: u64,
    token: CancellationToken,
}

impl Inner {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // Critical sections never panic midway; a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh signal under `key`.
    ///
    /// Registering a key that is still live replaces the old entry; the older
    /// operation can then no longer be cancelled by key.
    pub fn register(&self, key: impl Into<String>) -> Registration {
        let key = key.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        let previous = self.inner.entries().insert(
            key.clone(),
            Entry {
                id,
                token: token.clone(),
            },
        );
        if previous.is_some() {
            warn!(key = %key, "Replacing live cancellation entry");
        }
        debug!(key = %key, "Registered cancellable operation");

        Registration {
            key,
            id,
            token,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Raise the signal for `key`. Returns false if no such operation is in
    /// flight (already completed, or never registered).
    pub fn cancel(&self, key: &str) -> bool {
        match self.inner.entries().get(key) {
            Some(entry) => {
                debug!(key = %key, "Cancelling operation");
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.entries().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for CancellationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationRegistry")
            .field("in_flight", &self.len())
            .finish()
    }
}

/// A live registry entry. Dropping it removes the entry.
pub struct Registration {
    key: String,
    id: u64,
    token: CancellationToken,
    inner: Arc<Inner>,
}

impl Registration {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The signal raised by [`CancellationRegistry::cancel`].
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut entries = self.inner.entries();
        // A newer registration under the same key owns the entry now.
        if entries.get(&self.key).is_some_and(|e| e.id == self.id) {
            entries.remove(&self.key);
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("key", &self.key)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
