//! Observer list for weather consumers.
//!
//! Entries are kept in subscription order and removed by handle. Anything a
//! consumer needs alongside the result is captured by its callback.

use crate::types::{FetchStatus, WeatherSnapshot};

/// Callback invoked on every completed fetch.
pub type WeatherHandler = Box<dyn Fn(&WeatherSnapshot, FetchStatus) + Send>;

/// Identity of a subscription. Never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberHandle(u64);

struct SubscriberEntry {
    handle: SubscriberHandle,
    handler: WeatherHandler,
}

#[derive(Default)]
pub struct SubscriberRegistry {
    entries: Vec<SubscriberEntry>,
    next_id: u64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, handler: WeatherHandler) -> SubscriberHandle {
        let handle = SubscriberHandle(self.next_id);
        self.next_id += 1;
        self.entries.push(SubscriberEntry { handle, handler });
        tracing::debug!(?handle, count = self.entries.len(), "Weather subscriber added");
        handle
    }

    /// Remove the entry for `handle`. Returns false if it wasn't registered.
    pub fn unsubscribe(&mut self, handle: SubscriberHandle) -> bool {
        match self.entries.iter().position(|e| e.handle == handle) {
            Some(index) => {
                self.entries.remove(index);
                tracing::debug!(?handle, count = self.entries.len(), "Weather subscriber removed");
                true
            }
            None => {
                tracing::debug!(?handle, "Unsubscribe for unknown handle ignored");
                false
            }
        }
    }

    pub fn notify_all(&self, snapshot: &WeatherSnapshot, status: FetchStatus) {
        for entry in &self.entries {
            (entry.handler)(snapshot, status);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("count", &self.entries.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}
