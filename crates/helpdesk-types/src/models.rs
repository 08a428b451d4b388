use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// -- Enumerations --

/// Every inbox a ticket can come from. The set is closed: platform dispatch
/// matches on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    /// Kakao business channel consultations
    Kakao,
    /// Naver SmartStore product Q&A
    SmartstoreInquiry,
    /// Naver SmartStore TalkTalk direct messages
    SmartstoreTalk,
    /// Naver Pay order claims and customer inquiries
    Naverpay,
    /// Coupang Wing inquiries, returns and cancellations
    Coupang,
}

impl ChannelType {
    pub const ALL: [ChannelType; 5] = [
        Self::Kakao,
        Self::SmartstoreInquiry,
        Self::SmartstoreTalk,
        Self::Naverpay,
        Self::Coupang,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kakao => "kakao",
            Self::SmartstoreInquiry => "smartstore_inquiry",
            Self::SmartstoreTalk => "smartstore_talk",
            Self::Naverpay => "naverpay",
            Self::Coupang => "coupang",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ct| ct.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("channel type", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Pending,
    InProgress,
    Resolved,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            other => Err(ParseEnumError::new("ticket status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(ParseEnumError::new("priority", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    Customer,
    Agent,
}

impl SenderType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Agent => "agent",
        }
    }
}

impl FromStr for SenderType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "agent" => Ok(Self::Agent),
            other => Err(ParseEnumError::new("sender type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    InProgress,
    Success,
    Failed,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(ParseEnumError::new("sync status", other)),
        }
    }
}

// -- Metadata --

/// Platform payload attached to a ticket.
///
/// Forward-compatible and never validated: whatever the upstream platform
/// sent is kept under `original_data` so new fields survive without a
/// schema change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    pub fn for_platform(platform: &str) -> Self {
        let mut map = Map::new();
        map.insert("platform".into(), Value::String(platform.to_string()));
        Self(map)
    }

    /// Adds a key unless the value is JSON null.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.0.insert(key.to_string(), value);
        }
        self
    }

    pub fn with_original(mut self, record: &Value) -> Self {
        self.0.insert("original_data".into(), record.clone());
        self
    }

    pub fn platform(&self) -> Option<&str> {
        self.0.get("platform").and_then(Value::as_str)
    }

    pub fn original_data(&self) -> Option<&Value> {
        self.0.get("original_data")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl From<Map<String, Value>> for Metadata {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// -- Records --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub id: Uuid,
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The brand columns joined onto tickets and channel configs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandSummary {
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
}

/// Credentials and activation state for one brand's channel.
///
/// `api_key` is the admin key (Kakao), client id (Naver) or access key
/// (Coupang); `store_id` is the channel id, store id or vendor id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub channel_type: ChannelType,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub store_id: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub is_active: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "brands")]
    pub brand: Option<BrandSummary>,
}

impl ChannelConfig {
    pub fn has_credentials(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn brand_name(&self) -> Option<&str> {
        self.brand.as_ref().map(|b| b.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub channel_type: ChannelType,
    pub external_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_id: Option<String>,
    pub subject: String,
    pub status: TicketStatus,
    pub priority: Priority,
    pub order_number: Option<String>,
    pub product_name: Option<String>,
    pub metadata: Metadata,
    pub is_read: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "brands")]
    pub brand: Option<BrandSummary>,
    pub messages: Vec<Message>,
}

/// A ticket as produced by a platform transform or an operator, before it
/// has been stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTicket {
    pub brand_id: Uuid,
    pub channel_type: ChannelType,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub subject: String,
    #[serde(default)]
    pub status: TicketStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub external_id: Option<String>,
    pub sender_type: SenderType,
    pub sender_name: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub ticket_id: Uuid,
    pub external_id: Option<String>,
    pub sender_type: SenderType,
    pub sender_name: Option<String>,
    pub content: String,
    /// Platform timestamp when known; storage time otherwise.
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLog {
    pub id: Uuid,
    pub channel_config_id: Uuid,
    pub status: SyncStatus,
    pub tickets_synced: u32,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub channel_type: Option<ChannelType>,
    pub brand_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickReply {
    pub id: Uuid,
    /// `None` means the reply is shared by every brand.
    pub brand_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub usage_count: u32,
    pub created_at: DateTime<Utc>,
}

// -- Queries --

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketFilter {
    pub brand_id: Option<Uuid>,
    pub channel_type: Option<ChannelType>,
    pub status: Option<TicketStatus>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketStats {
    pub total: u32,
    pub pending: u32,
    pub in_progress: u32,
    pub resolved: u32,
}
