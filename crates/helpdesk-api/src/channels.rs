use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    response::IntoResponse,
};
use tracing::info;

use helpdesk_types::api::{
    ChannelQuery, ChannelResponse, ChannelsResponse, DeleteChannelQuery, SuccessResponse,
    UpsertChannelRequest,
};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_channels(
    State(state): State<AppState>,
    query: Result<Query<ChannelQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let channels = state
        .db(move |db| db.list_channel_configs(query.brand_id))
        .await?;
    Ok(Json(ChannelsResponse { channels }))
}

/// Creates or updates a channel config; matched by `id`, then by
/// (brand_id, channel_type).
pub async fn upsert_channel(
    State(state): State<AppState>,
    payload: Result<Json<UpsertChannelRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let Some(brand_id) = req.brand_id else {
        return Err(ApiError::bad_request("brand_id and channel_type are required"));
    };
    if req.channel_type.is_none() {
        return Err(ApiError::bad_request("brand_id and channel_type are required"));
    }

    let brand_exists = state
        .db(move |db| Ok(db.list_brands()?.iter().any(|b| b.id == brand_id)))
        .await?;
    if !brand_exists {
        return Err(ApiError::bad_request(format!("unknown brand: {brand_id}")));
    }

    let channel = state.db(move |db| db.upsert_channel_config(&req)).await?;
    info!(channel_id = %channel.id, channel_type = %channel.channel_type, "channel config saved");
    Ok(Json(ChannelResponse { channel }))
}

pub async fn delete_channel(
    State(state): State<AppState>,
    query: Result<Query<DeleteChannelQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let id = query.id.ok_or_else(|| ApiError::bad_request("id is required"))?;

    if !state.db(move |db| db.delete_channel_config(id)).await? {
        return Err(ApiError::not_found(format!("channel config not found: {id}")));
    }
    info!(channel_id = %id, "channel config deleted");
    Ok(Json(SuccessResponse { success: true }))
}
