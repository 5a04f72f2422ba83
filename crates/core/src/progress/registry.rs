use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::ingest::{ImportKind, ImportSnapshot};

/// Proof of ownership over one registry slot.
///
/// Writes and evictions through a stale registration (one whose slot was
/// since taken over by a newer session of the same kind) are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub kind: ImportKind,
    generation: u64,
}

struct Entry {
    generation: u64,
    snapshot: ImportSnapshot,
}

/// Process-wide map from import kind to its latest progress snapshot.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
pub struct ProgressRegistry {
    entries: RwLock<HashMap<ImportKind, Entry>>,
    next_generation: AtomicU64,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    pub async fn get(&self, kind: ImportKind) -> Option<ImportSnapshot> {
        self.entries
            .read()
            .await
            .get(&kind)
            .map(|entry| entry.snapshot.clone())
    }

    /// Install `snapshot` as the current entry for its kind, replacing any
    /// previous session's entry.
    pub async fn set(&self, snapshot: ImportSnapshot) -> Registration {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let kind = snapshot.kind;
        let replaced = self
            .entries
            .write()
            .await
            .insert(kind, Entry {
                generation,
                snapshot,
            });
        if replaced.is_some() {
            tracing::warn!(kind = %kind, "Replacing progress of an earlier upload of the same type");
        }
        Registration { kind, generation }
    }

    /// Mutate the entry owned by `registration`. Returns `false` when the
    /// entry was evicted or taken over.
    pub async fn update<F>(&self, registration: &Registration, f: F) -> bool
    where
        F: FnOnce(&mut ImportSnapshot),
    {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&registration.kind) {
            Some(entry) if entry.generation == registration.generation => {
                f(&mut entry.snapshot);
                true
            }
            _ => false,
        }
    }

    /// Remove the entry owned by `registration`, if it is still current.
    pub async fn evict(&self, registration: &Registration) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get(&registration.kind) {
            Some(entry) if entry.generation == registration.generation => {
                entries.remove(&registration.kind);
                true
            }
            _ => false,
        }
    }

    /// Evict `registration`'s entry once `grace` has elapsed.
    pub fn schedule_eviction(
        self: &Arc<Self>,
        registration: Registration,
        grace: Duration,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if registry.evict(&registration).await {
                tracing::debug!(kind = %registration.kind, "Evicted finished import progress");
            }
        })
    }
}

impl Default for ProgressRegistry {
    fn default() -> Self {
        Self::new()
    }
}
