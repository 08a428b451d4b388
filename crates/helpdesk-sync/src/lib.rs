//! Pulls tickets in from the connected platforms and pushes agent replies
//! back out.

pub mod dispatch;
pub mod error;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use helpdesk_db::Database;
use tracing::error;

pub use dispatch::{OutboundDispatcher, ReplyOutcome};
pub use error::{DispatchError, ReplyError, SyncError};
pub use orchestrator::{Orchestrator, SyncOutcome, SyncSummary};

/// Runs a storage call off the async runtime. rusqlite blocks, so every
/// database touch from async code goes through here.
pub(crate) async fn blocking<T, F>(db: &Arc<Database>, f: F) -> anyhow::Result<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            anyhow::anyhow!("storage task failed: {e}")
        })?
}
