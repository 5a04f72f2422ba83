use std::sync::Arc;

use registrar_core::progress::ProgressRegistry;
use registrar_core::store::KeyedStore;
use registrar_db::{DbPool, PgStore};
use tokio_util::task::TaskTracker;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Persistence seam used by imports and deletions.
    pub store: Arc<dyn KeyedStore>,
    /// Latest progress snapshot per import type.
    pub progress: Arc<ProgressRegistry>,
    /// Background import sessions, drained on shutdown.
    pub imports: TaskTracker,
}

impl AppState {
    /// State backed by a [`PgStore`] over `pool` and an empty registry.
    pub fn new(pool: DbPool, config: ServerConfig) -> Self {
        Self {
            store: Arc::new(PgStore::new(pool.clone())),
            pool,
            config: Arc::new(config),
            progress: Arc::new(ProgressRegistry::new()),
            imports: TaskTracker::new(),
        }
    }
}
