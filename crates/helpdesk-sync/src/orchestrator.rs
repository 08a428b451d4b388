use std::sync::Arc;

use chrono::Utc;
use helpdesk_db::{Database, Upserted};
use helpdesk_platforms::{
    ChannelRouting, ClientFactory, Feed, PlatformClient, TransformContext, normalize, opening_message,
};
use helpdesk_types::api::{ChannelSyncResult, SyncResponse};
use helpdesk_types::{ChannelConfig, SyncStatus};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::blocking;
use crate::error::SyncError;

/// Result of one `sync_channel` call. `tickets_synced` counts upserts made
/// before any failure.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub success: bool,
    pub tickets_synced: u32,
    pub error: Option<String>,
}

impl SyncOutcome {
    fn succeeded(tickets_synced: u32) -> Self {
        Self {
            success: true,
            tickets_synced,
            error: None,
        }
    }

    fn failed(tickets_synced: u32, error: impl Into<String>) -> Self {
        Self {
            success: false,
            tickets_synced,
            error: Some(error.into()),
        }
    }

    pub fn for_channel(self, config: &ChannelConfig) -> ChannelSyncResult {
        ChannelSyncResult {
            channel_id: config.id,
            channel_type: config.channel_type,
            brand_name: config.brand_name().map(str::to_string),
            success: self.success,
            tickets_synced: self.tickets_synced,
            error: self.error,
        }
    }
}

/// Aggregate over a batch of channel results.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSummary {
    pub success: bool,
    pub total_synced: u32,
    pub message: String,
}

impl SyncSummary {
    pub fn from_results(results: &[ChannelSyncResult]) -> Self {
        let total_synced = results.iter().map(|r| r.tickets_synced).sum();
        let failed: Vec<&str> = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.channel_type.as_str())
            .collect();

        let message = if failed.is_empty() {
            format!("Synced {total_synced} inquiries.")
        } else {
            format!("Some channels failed to sync: {}", failed.join(", "))
        };

        Self {
            success: failed.is_empty(),
            total_synced,
            message,
        }
    }

    pub fn into_response(self, results: Vec<ChannelSyncResult>) -> SyncResponse {
        SyncResponse {
            success: self.success,
            total_synced: self.total_synced,
            results,
            message: self.message,
        }
    }
}

/// Pulls every feed of a channel into the ticket store.
pub struct Orchestrator {
    db: Arc<Database>,
    clients: Arc<dyn ClientFactory>,
}

impl Orchestrator {
    pub fn new(db: Arc<Database>, clients: Arc<dyn ClientFactory>) -> Self {
        Self { db, clients }
    }

    /// One sync attempt, recorded in `sync_logs`. Never returns an error;
    /// failures are reported in the outcome and the log row.
    pub async fn sync_channel(&self, config: &ChannelConfig) -> SyncOutcome {
        let channel_id = config.id;
        let started_at = Utc::now();
        let log_id = match blocking(&self.db, move |db| db.create_sync_log(channel_id, started_at)).await {
            Ok(id) => id,
            Err(e) => {
                error!(%channel_id, "could not open sync log: {:#}", e);
                return SyncOutcome::failed(0, SyncError::Storage(e).to_string());
            }
        };

        let mut synced = 0u32;
        let result = self.pull_feeds(config, &mut synced).await;
        let completed_at = Utc::now();

        let outcome = match result {
            Ok(()) => SyncOutcome::succeeded(synced),
            Err(e) => {
                warn!(%channel_id, channel_type = %config.channel_type, error = %e, "channel sync failed");
                SyncOutcome::failed(synced, e.to_string())
            }
        };

        let status = if outcome.success {
            SyncStatus::Success
        } else {
            SyncStatus::Failed
        };
        let error_message = outcome.error.clone();
        let finished = blocking(&self.db, move |db| {
            db.finish_sync_log(log_id, status, synced, error_message.as_deref(), completed_at)?;
            if status == SyncStatus::Success {
                db.mark_channel_synced(channel_id, completed_at)?;
            }
            Ok(())
        })
        .await;

        match finished {
            Ok(()) => {
                info!(%channel_id, channel_type = %config.channel_type, synced, success = outcome.success, "channel sync finished");
                outcome
            }
            Err(e) => {
                error!(%channel_id, "could not close sync log: {:#}", e);
                SyncOutcome::failed(synced, SyncError::Storage(e).to_string())
            }
        }
    }

    /// Syncs every active channel that has credentials, one after another.
    /// A failing channel never stops the ones after it.
    pub async fn sync_all_channels(&self) -> Result<Vec<ChannelSyncResult>, SyncError> {
        let configs = blocking(&self.db, |db| db.list_channel_configs(None)).await?;

        let mut results = Vec::new();
        for config in configs.iter().filter(|c| c.is_active && c.has_credentials()) {
            let outcome = self.sync_channel(config).await;
            results.push(outcome.for_channel(config));
        }
        info!(channels = results.len(), "sync pass complete");
        Ok(results)
    }

    /// Syncs one channel on request, whether or not it is active.
    pub async fn sync_channel_by_id(&self, id: Uuid) -> Result<ChannelSyncResult, SyncError> {
        let config = blocking(&self.db, move |db| db.get_channel_config(id))
            .await?
            .ok_or(SyncError::ChannelNotFound(id))?;
        Ok(self.sync_channel(&config).await.for_channel(&config))
    }

    async fn pull_feeds(&self, config: &ChannelConfig, synced: &mut u32) -> Result<(), SyncError> {
        let client = self.clients.client_for(config)?;
        let ctx = TransformContext::from_config(config);

        let mut failures = Vec::new();
        for &feed in config.channel_type.feeds() {
            if let Err(message) = self.pull_feed(client.as_ref(), feed, &ctx, synced).await? {
                failures.push(format!("{feed:?}: {message}"));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SyncError::FeedsFailed(failures))
        }
    }

    /// Outer error aborts the channel; inner error is a failed list call.
    async fn pull_feed(
        &self,
        client: &dyn PlatformClient,
        feed: Feed,
        ctx: &TransformContext,
        synced: &mut u32,
    ) -> Result<Result<(), String>, SyncError> {
        let page = client.list(feed, feed.first_page()).await;
        if !page.success {
            let message = page.error.unwrap_or_else(|| "list call failed".to_string());
            warn!(?feed, error = %message, "feed list failed");
            return Ok(Err(message));
        }

        for record in page.data {
            let ticket = match normalize(feed, &record, ctx) {
                Ok(ticket) => ticket,
                Err(e) => {
                    warn!(?feed, error = %e, "skipping record");
                    continue;
                }
            };
            let upserted = blocking(&self.db, move |db| {
                db.upsert_synced_ticket(&ticket, |id| opening_message(feed, &record, id))
            })
            .await?;
            if let Upserted::Created(id) = upserted {
                info!(?feed, ticket_id = %id, "new ticket");
            }
            *synced += 1;
        }
        Ok(Ok(()))
    }
}
