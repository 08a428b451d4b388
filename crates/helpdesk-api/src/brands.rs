use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use helpdesk_types::api::{
    BrandResponse, BrandsResponse, CreateBrandRequest, QuickRepliesResponse, QuickReplyQuery,
    SuccessResponse,
};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_brands(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let brands = state.db(|db| db.list_brands()).await?;
    Ok(Json(BrandsResponse { brands }))
}

pub async fn create_brand(
    State(state): State<AppState>,
    payload: Result<Json<CreateBrandRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }

    let brand = state
        .db(move |db| db.create_brand(&name, req.icon.as_deref(), req.color.as_deref()))
        .await?;
    Ok((StatusCode::CREATED, Json(BrandResponse { brand })))
}

// -- Quick replies --

/// The brand's own replies plus the shared ones, most used first.
pub async fn list_quick_replies(
    State(state): State<AppState>,
    query: Result<Query<QuickReplyQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let quick_replies = state
        .db(move |db| db.list_quick_replies(query.brand_id))
        .await?;
    Ok(Json(QuickRepliesResponse { quick_replies }))
}

pub async fn use_quick_reply(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    if !state.db(move |db| db.increment_quick_reply_usage(id)).await? {
        return Err(ApiError::not_found(format!("quick reply not found: {id}")));
    }
    Ok(Json(SuccessResponse { success: true }))
}
