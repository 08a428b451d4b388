//! Routes mounted when the server starts without a database.
//!
//! Reads answer with empty collections so the dashboard renders; anything
//! that would write is refused with 400.

use axum::{
    Json, Router,
    routing::{get, post, put},
};

use helpdesk_types::TicketStats;
use helpdesk_types::api::{
    BrandsResponse, ChannelsResponse, QuickRepliesResponse, SyncLogsResponse, TicketsResponse,
};

use crate::error::ApiError;

const DEMO_NOTICE: &str = "Running in demo mode: no database is configured.";

pub fn demo_router() -> Router {
    let api = Router::new()
        .route("/tickets", get(tickets).post(not_configured))
        .route("/tickets/stats", get(stats))
        .route("/tickets/status", put(not_configured))
        .route("/tickets/read", put(not_configured))
        .route("/tickets/reply", post(not_configured))
        .route("/tickets/{id}", get(not_configured))
        .route(
            "/channels",
            get(channels).post(not_configured).delete(not_configured),
        )
        .route("/sync", get(sync_logs).post(not_configured))
        .route("/brands", get(brands).post(not_configured))
        .route("/quick-replies", get(quick_replies))
        .route("/quick-replies/{id}/use", post(not_configured));

    Router::new().nest("/api", api)
}

async fn tickets() -> Json<TicketsResponse> {
    Json(TicketsResponse {
        tickets: Vec::new(),
        message: Some(DEMO_NOTICE.to_string()),
    })
}

async fn stats() -> Json<TicketStats> {
    Json(TicketStats::default())
}

async fn channels() -> Json<ChannelsResponse> {
    Json(ChannelsResponse { channels: Vec::new() })
}

async fn sync_logs() -> Json<SyncLogsResponse> {
    Json(SyncLogsResponse { logs: Vec::new() })
}

async fn brands() -> Json<BrandsResponse> {
    Json(BrandsResponse { brands: Vec::new() })
}

async fn quick_replies() -> Json<QuickRepliesResponse> {
    Json(QuickRepliesResponse {
        quick_replies: Vec::new(),
    })
}

async fn not_configured() -> ApiError {
    ApiError::bad_request("database is not configured")
}
