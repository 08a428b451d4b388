use std::fmt::Display;
use std::str::FromStr;

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use helpdesk_types::api::{
    MarkReadRequest, ReplyRequest, ReplyResponse, StatsQuery, TicketQuery, TicketResponse,
    TicketsResponse, UpdateStatusRequest,
};
use helpdesk_types::{NewTicket, TicketFilter, TicketStatus};

use crate::error::ApiError;
use crate::state::AppState;

/// Display name stored on replies sent from the dashboard.
const AGENT_NAME: &str = "Agent";

/// `None`, blank and `all` mean no filter.
fn filter_value<T>(raw: Option<String>, name: &str) -> Result<Option<T>, ApiError>
where
    T: FromStr,
    T::Err: Display,
{
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|e| ApiError::bad_request(format!("invalid {name}: {e}"))),
    }
}

pub async fn list_tickets(
    State(state): State<AppState>,
    query: Result<Query<TicketQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let filter = TicketFilter {
        brand_id: filter_value(query.brand_id, "brandId")?,
        channel_type: filter_value(query.channel_type, "channelType")?,
        status: filter_value(query.status, "status")?,
        search: query
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    };

    let tickets = state.db(move |db| db.list_tickets(&filter)).await?;
    Ok(Json(TicketsResponse {
        tickets,
        message: None,
    }))
}

pub async fn create_ticket(
    State(state): State<AppState>,
    payload: Result<Json<NewTicket>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(ticket) = payload?;
    if ticket.subject.trim().is_empty() {
        return Err(ApiError::bad_request("subject is required"));
    }

    let brand_id = ticket.brand_id;
    let brand_exists = state
        .db(move |db| Ok(db.list_brands()?.iter().any(|b| b.id == brand_id)))
        .await?;
    if !brand_exists {
        return Err(ApiError::bad_request(format!("unknown brand: {brand_id}")));
    }

    let ticket = state.db(move |db| db.create_ticket(&ticket)).await?;
    info!(ticket_id = %ticket.id, channel_type = %ticket.channel_type, "ticket created");
    Ok((StatusCode::CREATED, Json(TicketResponse { ticket })))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let ticket = state
        .db(move |db| db.get_ticket(id))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("ticket not found: {id}")))?;
    Ok(Json(TicketResponse { ticket }))
}

/// `resolved` stamps `resolved_at`; other statuses leave it as it was.
pub async fn update_status(
    State(state): State<AppState>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let (Some(ticket_id), Some(status)) = (req.ticket_id, req.status) else {
        return Err(ApiError::bad_request("ticketId and status are required"));
    };

    let resolved_at = (status == TicketStatus::Resolved).then(Utc::now);
    let ticket = state
        .db(move |db| db.update_ticket_status(ticket_id, status, resolved_at))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("ticket not found: {ticket_id}")))?;
    Ok(Json(TicketResponse { ticket }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    payload: Result<Json<MarkReadRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let ticket_id = req
        .ticket_id
        .ok_or_else(|| ApiError::bad_request("ticketId is required"))?;

    let ticket = state
        .db(move |db| db.mark_ticket_read(ticket_id))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("ticket not found: {ticket_id}")))?;
    Ok(Json(TicketResponse { ticket }))
}

/// Succeeds once the message is stored; the platform delivery result rides
/// along in `delivery`.
pub async fn reply(
    State(state): State<AppState>,
    payload: Result<Json<ReplyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let (Some(ticket_id), Some(text)) = (req.ticket_id, req.message) else {
        return Err(ApiError::bad_request("ticketId and message are required"));
    };

    let outcome = state.dispatcher.reply(ticket_id, &text, AGENT_NAME).await?;
    Ok(Json(ReplyResponse {
        success: true,
        message: outcome.message,
        delivery: outcome.delivery,
    }))
}

pub async fn ticket_stats(
    State(state): State<AppState>,
    query: Result<Query<StatsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let brand_id = filter_value(query.brand_id, "brandId")?;
    let channel_type = filter_value(query.channel_type, "channelType")?;

    let stats = state.db(move |db| db.ticket_stats(brand_id, channel_type)).await?;
    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_types::ChannelType;

    #[test]
    fn all_and_blank_mean_no_filter() {
        assert_eq!(filter_value::<ChannelType>(Some("all".into()), "channelType").unwrap(), None);
        assert_eq!(filter_value::<ChannelType>(Some(" ".into()), "channelType").unwrap(), None);
        assert_eq!(
            filter_value::<ChannelType>(Some("coupang".into()), "channelType").unwrap(),
            Some(ChannelType::Coupang)
        );
        assert!(filter_value::<Uuid>(Some("nope".into()), "brandId").is_err());
    }
}
