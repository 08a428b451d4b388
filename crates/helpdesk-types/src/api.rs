use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Brand, ChannelConfig, ChannelType, Message, QuickReply, SyncLog, Ticket, TicketStatus,
};

// -- Tickets --

/// Query string for `GET /api/tickets`. The UI sends `all` for "no filter",
/// so values stay raw strings until the handler interprets them.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketQuery {
    pub brand_id: Option<String>,
    pub channel_type: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    pub brand_id: Option<String>,
    pub channel_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TicketsResponse {
    pub tickets: Vec<Ticket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub ticket: Ticket,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateStatusRequest {
    pub ticket_id: Option<Uuid>,
    pub status: Option<TicketStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MarkReadRequest {
    pub ticket_id: Option<Uuid>,
}

// -- Replies --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReplyRequest {
    pub ticket_id: Option<Uuid>,
    pub message: Option<String>,
}

/// Outcome of pushing a reply to the originating platform. Never blocks the
/// local save; surfaced to the caller as a warning only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl DeliveryReport {
    pub fn delivered() -> Self {
        Self {
            delivered: true,
            warning: None,
        }
    }

    pub fn failed(warning: impl Into<String>) -> Self {
        Self {
            delivered: false,
            warning: Some(warning.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    pub success: bool,
    pub message: Message,
    pub delivery: DeliveryReport,
}

// -- Channels --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelQuery {
    pub brand_id: Option<Uuid>,
}

/// Body of `POST /api/channels`. Absent fields keep their stored value when
/// the config already exists.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct UpsertChannelRequest {
    pub id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub channel_type: Option<ChannelType>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub store_id: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteChannelQuery {
    pub id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ChannelsResponse {
    pub channels: Vec<ChannelConfig>,
}

#[derive(Debug, Serialize)]
pub struct ChannelResponse {
    pub channel: ChannelConfig,
}

// -- Sync --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQuery {
    pub channel_id: Option<Uuid>,
}

/// One channel's line in a sync report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSyncResult {
    pub channel_id: Uuid,
    pub channel_type: ChannelType,
    pub brand_name: Option<String>,
    pub success: bool,
    #[serde(rename = "ticketsSynced")]
    pub tickets_synced: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    pub total_synced: u32,
    pub results: Vec<ChannelSyncResult>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SyncLogsResponse {
    pub logs: Vec<SyncLog>,
}

// -- Brands --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBrandRequest {
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BrandsResponse {
    pub brands: Vec<Brand>,
}

#[derive(Debug, Serialize)]
pub struct BrandResponse {
    pub brand: Brand,
}

// -- Quick replies --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickReplyQuery {
    pub brand_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickRepliesResponse {
    pub quick_replies: Vec<QuickReply>,
}

// -- Shared --

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
