use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    response::IntoResponse,
};

use helpdesk_sync::SyncSummary;
use helpdesk_types::api::{SyncLogsResponse, SyncQuery};

use crate::error::ApiError;
use crate::state::AppState;

const RECENT_LOGS: u32 = 20;

/// Syncs one channel when `channelId` is given, otherwise every active one.
pub async fn run_sync(
    State(state): State<AppState>,
    query: Result<Query<SyncQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let results = match query.channel_id {
        Some(id) => vec![state.orchestrator.sync_channel_by_id(id).await?],
        None => state.orchestrator.sync_all_channels().await?,
    };

    let summary = SyncSummary::from_results(&results);
    Ok(Json(summary.into_response(results)))
}

pub async fn recent_logs(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let logs = state.db(|db| db.recent_sync_logs(RECENT_LOGS)).await?;
    Ok(Json(SyncLogsResponse { logs }))
}
