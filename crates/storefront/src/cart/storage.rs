//! Persistence of the active cart id.
//!
//! The cart id is the only durable client-side state of the cart. It lives
//! either in the cookie session (one per browser) or, for tests and
//! multi-tab simulation, in a shared in-memory map that broadcasts changes
//! the way browsers fire `storage` events at other tabs.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tokio::sync::broadcast;
use tower_sessions::Session;

/// Capacity of the change broadcast; slower subscribers miss older events.
const EVENT_CAPACITY: usize = 64;

/// Errors from cart id storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Session store failed.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// Key-value storage for the active cart id.
pub trait CartIdStorage: Send + Sync {
    /// Read the value under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Store `value` under `key`.
    fn set(&self, key: &str, value: &str)
    -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Delete `key`. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
}

// =============================================================================
// Session Storage
// =============================================================================

/// Cart id storage backed by the visitor's session.
#[derive(Debug, Clone)]
pub struct SessionCartIdStorage {
    session: Session,
}

impl SessionCartIdStorage {
    /// Wrap a request's session.
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

impl CartIdStorage for SessionCartIdStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.session.get::<String>(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Ok(self.session.insert(key, value).await?)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.session.remove::<String>(key).await?;
        Ok(())
    }
}

// =============================================================================
// Memory Storage
// =============================================================================

/// A change to a key, as seen by other handles of the same storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Changed key.
    pub key: String,
    /// New value; `None` when the key was removed.
    pub new_value: Option<String>,
    origin: u64,
}

/// In-memory cart id storage shared between handles.
///
/// Each handle created with [`MemoryCartIdStorage::new_tab`] acts like one
/// browser tab: it sees the same values, and its subscribers receive changes
/// made through every other handle but not its own.
#[derive(Debug, Clone)]
pub struct MemoryCartIdStorage {
    shared: Arc<Shared>,
    origin: u64,
}

#[derive(Debug)]
struct Shared {
    values: RwLock<HashMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
    next_origin: AtomicU64,
}

impl Default for MemoryCartIdStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCartIdStorage {
    /// Create an empty storage with a single handle.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                values: RwLock::new(HashMap::new()),
                events,
                next_origin: AtomicU64::new(1),
            }),
            origin: 0,
        }
    }

    /// Another handle over the same values, with its own event origin.
    #[must_use]
    pub fn new_tab(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            origin: self.shared.next_origin.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Subscribe to changes made through other handles.
    #[must_use]
    pub fn subscribe(&self) -> StorageEvents {
        StorageEvents {
            receiver: self.shared.events.subscribe(),
            origin: self.origin,
        }
    }

    /// Read a value without going through the async trait.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.shared
            .values
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn write(&self, key: &str, value: Option<&str>) {
        let changed = {
            let mut values = self
                .shared
                .values
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            match value {
                Some(v) => values.insert(key.to_string(), v.to_string()).as_deref() != Some(v),
                None => values.remove(key).is_some(),
            }
        };

        if changed {
            // No subscribers is fine: nobody is listening.
            let _ = self.shared.events.send(StorageEvent {
                key: key.to_string(),
                new_value: value.map(String::from),
                origin: self.origin,
            });
        }
    }
}

impl CartIdStorage for MemoryCartIdStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.write(key, Some(value));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.write(key, None);
        Ok(())
    }
}

/// Stream of storage changes made by other handles.
///
/// Delivery is best effort: if this subscriber falls behind, missed events
/// are skipped rather than replayed.
#[derive(Debug)]
pub struct StorageEvents {
    receiver: broadcast::Receiver<StorageEvent>,
    origin: u64,
}

impl StorageEvents {
    /// Wait for the next foreign change. Returns `None` once every handle is
    /// dropped.
    pub async fn recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.origin == self.origin => {}
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "Storage event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Return a pending foreign change without waiting.
    pub fn try_recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if event.origin == self.origin => {}
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_roundtrip() {
        let storage = MemoryCartIdStorage::new();
        assert_eq!(storage.get("k").await.unwrap(), None);

        storage.set("k", "cart_1").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap().as_deref(), Some("cart_1"));

        storage.remove("k").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_tabs_see_each_others_changes() {
        let first = MemoryCartIdStorage::new();
        let second = first.new_tab();
        let mut first_events = first.subscribe();
        let mut second_events = second.subscribe();

        first.set("duka_cart_id_guest", "cart_9").await.unwrap();

        assert_eq!(second.peek("duka_cart_id_guest").as_deref(), Some("cart_9"));
        let event = second_events.try_recv().unwrap();
        assert_eq!(event.key, "duka_cart_id_guest");
        assert_eq!(event.new_value.as_deref(), Some("cart_9"));

        // A tab is not notified of its own writes.
        assert!(first_events.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_unchanged_write_is_silent() {
        let first = MemoryCartIdStorage::new();
        let second = first.new_tab();
        let mut events = second.subscribe();

        first.set("k", "v").await.unwrap();
        first.set("k", "v").await.unwrap();
        first.remove("missing").await.unwrap();

        assert!(events.try_recv().is_some());
        assert!(events.try_recv().is_none());
    }
}
