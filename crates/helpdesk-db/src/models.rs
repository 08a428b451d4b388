//! Row mapping between SQLite and the helpdesk-types models.
//!
//! Ids are stored as TEXT uuids, enums as their wire strings, timestamps as
//! RFC 3339 with microseconds so lexical order matches time order.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use helpdesk_types::{
    Brand, BrandSummary, ChannelConfig, Message, Metadata, QuickReply, SyncLog, Ticket,
};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

pub(crate) const BRAND_COLUMNS: &str = "id, name, icon, color, created_at";

pub(crate) const CHANNEL_COLUMNS: &str = "c.id, c.brand_id, c.channel_type, c.api_key, c.api_secret, \
     c.store_id, c.access_token, c.refresh_token, c.is_active, c.last_synced_at, c.created_at, \
     b.name, b.icon, b.color";

pub(crate) const TICKET_COLUMNS: &str = "t.id, t.brand_id, t.channel_type, t.external_id, \
     t.customer_name, t.customer_id, t.subject, t.status, t.priority, t.order_number, \
     t.product_name, t.metadata, t.is_read, t.resolved_at, t.created_at, t.updated_at, \
     b.name, b.icon, b.color";

pub(crate) const MESSAGE_COLUMNS: &str =
    "id, ticket_id, external_id, sender_type, sender_name, content, created_at";

pub(crate) const SYNC_LOG_COLUMNS: &str = "l.id, l.channel_config_id, l.status, l.tickets_synced, \
     l.error_message, l.started_at, l.completed_at, c.channel_type, b.name";

pub(crate) const QUICK_REPLY_COLUMNS: &str =
    "id, brand_id, title, content, usage_count, created_at";

pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_ts() -> String {
    format_ts(Utc::now())
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_error(idx, e))
}

fn parse_opt_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| r.parse::<T>().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(&raw).map_err(|e| conversion_error(idx, e))
}

fn opt_ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| parse_ts(&r).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

/// Accepts RFC 3339 and SQLite's `datetime('now')` format.
pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    raw.parse::<DateTime<Utc>>().or_else(|_| {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
    })
}

fn brand_summary(row: &Row<'_>, first: usize) -> rusqlite::Result<Option<BrandSummary>> {
    let name: Option<String> = row.get(first)?;
    Ok(match name {
        Some(name) => Some(BrandSummary {
            name,
            icon: row.get(first + 1)?,
            color: row.get(first + 2)?,
        }),
        None => None,
    })
}

pub(crate) fn brand_from_row(row: &Row<'_>) -> rusqlite::Result<Brand> {
    Ok(Brand {
        id: parse_col(row, 0)?,
        name: row.get(1)?,
        icon: row.get(2)?,
        color: row.get(3)?,
        created_at: ts_col(row, 4)?,
    })
}

pub(crate) fn channel_from_row(row: &Row<'_>) -> rusqlite::Result<ChannelConfig> {
    Ok(ChannelConfig {
        id: parse_col(row, 0)?,
        brand_id: parse_col(row, 1)?,
        channel_type: parse_col(row, 2)?,
        api_key: row.get(3)?,
        api_secret: row.get(4)?,
        store_id: row.get(5)?,
        access_token: row.get(6)?,
        refresh_token: row.get(7)?,
        is_active: row.get(8)?,
        last_synced_at: opt_ts_col(row, 9)?,
        created_at: ts_col(row, 10)?,
        brand: brand_summary(row, 11)?,
    })
}

/// Messages are attached separately; see `Database::attach_messages`.
pub(crate) fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    let raw_metadata: String = row.get(11)?;
    let metadata: Metadata =
        serde_json::from_str(&raw_metadata).map_err(|e| conversion_error(11, e))?;

    Ok(Ticket {
        id: parse_col(row, 0)?,
        brand_id: parse_col(row, 1)?,
        channel_type: parse_col(row, 2)?,
        external_id: row.get(3)?,
        customer_name: row.get(4)?,
        customer_id: row.get(5)?,
        subject: row.get(6)?,
        status: parse_col(row, 7)?,
        priority: parse_col(row, 8)?,
        order_number: row.get(9)?,
        product_name: row.get(10)?,
        metadata,
        is_read: row.get(12)?,
        resolved_at: opt_ts_col(row, 13)?,
        created_at: ts_col(row, 14)?,
        updated_at: ts_col(row, 15)?,
        brand: brand_summary(row, 16)?,
        messages: Vec::new(),
    })
}

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: parse_col(row, 0)?,
        ticket_id: parse_col(row, 1)?,
        external_id: row.get(2)?,
        sender_type: parse_col(row, 3)?,
        sender_name: row.get(4)?,
        content: row.get(5)?,
        created_at: ts_col(row, 6)?,
    })
}

pub(crate) fn sync_log_from_row(row: &Row<'_>) -> rusqlite::Result<SyncLog> {
    Ok(SyncLog {
        id: parse_col(row, 0)?,
        channel_config_id: parse_col(row, 1)?,
        status: parse_col(row, 2)?,
        tickets_synced: row.get(3)?,
        error_message: row.get(4)?,
        started_at: ts_col(row, 5)?,
        completed_at: opt_ts_col(row, 6)?,
        channel_type: parse_opt_col(row, 7)?,
        brand_name: row.get(8)?,
    })
}

pub(crate) fn quick_reply_from_row(row: &Row<'_>) -> rusqlite::Result<QuickReply> {
    Ok(QuickReply {
        id: parse_col(row, 0)?,
        brand_id: parse_opt_col::<Uuid>(row, 1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        usage_count: row.get(4)?,
        created_at: ts_col(row, 5)?,
    })
}
