//! Signals that prompt a cart refresh.
//!
//! Several tabs can show the same cart. None of them is told when another
//! changes it; instead each tab refreshes when it has reason to believe its
//! copy is stale. This is eventual consistency with last-refresh-wins, not a
//! transaction.

use super::StorageEvent;

/// Something that happened in the page hosting a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncSignal {
    /// Another tab changed a storage key.
    StorageChanged {
        /// The changed key.
        key: String,
    },
    /// The page became visible again.
    VisibilityVisible,
    /// The page was hidden. Never triggers a refresh.
    VisibilityHidden,
    /// The window regained focus.
    WindowFocused,
}

impl SyncSignal {
    /// Whether this signal should refresh a cart stored under `storage_key`.
    #[must_use]
    pub fn should_refresh(&self, storage_key: &str) -> bool {
        match self {
            Self::StorageChanged { key } => key == storage_key,
            Self::VisibilityVisible | Self::WindowFocused => true,
            Self::VisibilityHidden => false,
        }
    }

    /// Parse a signal posted by the page: `storage` (with a key), `visible`,
    /// `hidden` or `focus`.
    #[must_use]
    pub fn parse(kind: &str, key: Option<&str>) -> Option<Self> {
        match kind {
            "storage" => key.map(|key| Self::StorageChanged {
                key: key.to_string(),
            }),
            "visible" | "visibilitychange" => Some(Self::VisibilityVisible),
            "hidden" => Some(Self::VisibilityHidden),
            "focus" => Some(Self::WindowFocused),
            _ => None,
        }
    }
}

impl From<StorageEvent> for SyncSignal {
    fn from(event: StorageEvent) -> Self {
        Self::StorageChanged { key: event.key }
    }
}
