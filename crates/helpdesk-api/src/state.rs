use std::sync::Arc;

use helpdesk_db::Database;
use helpdesk_platforms::ClientFactory;
use helpdesk_sync::{Orchestrator, OutboundDispatcher};
use tracing::error;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub orchestrator: Orchestrator,
    pub dispatcher: OutboundDispatcher,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, clients: Arc<dyn ClientFactory>) -> AppState {
        Arc::new(Self {
            orchestrator: Orchestrator::new(Arc::clone(&db), Arc::clone(&clients)),
            dispatcher: OutboundDispatcher::new(Arc::clone(&db), clients),
            db,
        })
    }

    /// Runs a blocking database call off the async runtime.
    pub async fn db<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal(anyhow::anyhow!("storage task failed"))
            })?
            .map_err(ApiError::Internal)
    }
}
