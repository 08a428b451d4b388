use std::collections::HashMap;

use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Utc};
use helpdesk_types::api::UpsertChannelRequest;
use helpdesk_types::{
    Brand, ChannelConfig, ChannelType, Message, Metadata, NewMessage, NewTicket, QuickReply,
    SyncLog, SyncStatus, Ticket, TicketFilter, TicketStats, TicketStatus,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params, params_from_iter};
use uuid::Uuid;

use crate::Database;
use crate::models::{
    BRAND_COLUMNS, CHANNEL_COLUMNS, MESSAGE_COLUMNS, QUICK_REPLY_COLUMNS, SYNC_LOG_COLUMNS,
    TICKET_COLUMNS, brand_from_row, channel_from_row, format_ts, message_from_row, now_ts,
    quick_reply_from_row, sync_log_from_row, ticket_from_row,
};

/// What a sync upsert did with a platform record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Created(Uuid),
    Refreshed(Uuid),
}

impl Database {
    // -- Brands --

    pub fn list_brands(&self) -> Result<Vec<Brand>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BRAND_COLUMNS} FROM brands ORDER BY created_at"
            ))?;
            let rows = stmt
                .query_map([], brand_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn create_brand(&self, name: &str, icon: Option<&str>, color: Option<&str>) -> Result<Brand> {
        let id = Uuid::new_v4();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO brands (id, name, icon, color, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.to_string(), name, icon, color, now_ts()],
            )?;
            let brand = conn.query_row(
                &format!("SELECT {BRAND_COLUMNS} FROM brands WHERE id = ?1"),
                [id.to_string()],
                brand_from_row,
            )?;
            Ok(brand)
        })
    }

    // -- Channel configs --

    pub fn list_channel_configs(&self, brand_id: Option<Uuid>) -> Result<Vec<ChannelConfig>> {
        self.with_conn(|conn| {
            let mut sql = format!(
                "SELECT {CHANNEL_COLUMNS} FROM channel_configs c LEFT JOIN brands b ON c.brand_id = b.id"
            );
            let mut args: Vec<SqlValue> = Vec::new();
            if let Some(brand_id) = brand_id {
                sql.push_str(" WHERE c.brand_id = ?1");
                args.push(SqlValue::Text(brand_id.to_string()));
            }
            sql.push_str(" ORDER BY c.created_at");

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(args), channel_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_channel_config(&self, id: Uuid) -> Result<Option<ChannelConfig>> {
        self.with_conn(|conn| query_channel_config(conn, id))
    }

    pub fn find_channel_config(
        &self,
        brand_id: Uuid,
        channel_type: ChannelType,
    ) -> Result<Option<ChannelConfig>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {CHANNEL_COLUMNS} FROM channel_configs c
                         LEFT JOIN brands b ON c.brand_id = b.id
                         WHERE c.brand_id = ?1 AND c.channel_type = ?2"
                    ),
                    params![brand_id.to_string(), channel_type.as_str()],
                    channel_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Inserts or updates a channel config. The target row is found by `id`,
    /// then by (brand_id, channel_type); fields absent from the request keep
    /// their stored values.
    pub fn upsert_channel_config(&self, req: &UpsertChannelRequest) -> Result<ChannelConfig> {
        self.with_conn_mut(|conn| {
            let existing = match req.id {
                Some(id) => query_channel_config(conn, id)?,
                None => None,
            };
            let existing = match (existing, req.brand_id, req.channel_type) {
                (Some(found), _, _) => Some(found),
                (None, Some(brand_id), Some(channel_type)) => conn
                    .query_row(
                        &format!(
                            "SELECT {CHANNEL_COLUMNS} FROM channel_configs c
                             LEFT JOIN brands b ON c.brand_id = b.id
                             WHERE c.brand_id = ?1 AND c.channel_type = ?2"
                        ),
                        params![brand_id.to_string(), channel_type.as_str()],
                        channel_from_row,
                    )
                    .optional()?,
                _ => None,
            };

            let id = match existing {
                Some(current) => {
                    conn.execute(
                        "UPDATE channel_configs SET
                            brand_id = ?2, channel_type = ?3, api_key = ?4, api_secret = ?5,
                            store_id = ?6, access_token = ?7, refresh_token = ?8, is_active = ?9
                         WHERE id = ?1",
                        params![
                            current.id.to_string(),
                            req.brand_id.unwrap_or(current.brand_id).to_string(),
                            req.channel_type.unwrap_or(current.channel_type).as_str(),
                            req.api_key.clone().or(current.api_key),
                            req.api_secret.clone().or(current.api_secret),
                            req.store_id.clone().or(current.store_id),
                            req.access_token.clone().or(current.access_token),
                            req.refresh_token.clone().or(current.refresh_token),
                            req.is_active.unwrap_or(current.is_active),
                        ],
                    )?;
                    current.id
                }
                None => {
                    let (Some(brand_id), Some(channel_type)) = (req.brand_id, req.channel_type)
                    else {
                        bail!("brand_id and channel_type are required for a new channel config");
                    };
                    let id = req.id.unwrap_or_else(Uuid::new_v4);
                    conn.execute(
                        "INSERT INTO channel_configs
                            (id, brand_id, channel_type, api_key, api_secret, store_id,
                             access_token, refresh_token, is_active, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                        params![
                            id.to_string(),
                            brand_id.to_string(),
                            channel_type.as_str(),
                            req.api_key,
                            req.api_secret,
                            req.store_id,
                            req.access_token,
                            req.refresh_token,
                            req.is_active.unwrap_or(true),
                            now_ts(),
                        ],
                    )?;
                    id
                }
            };

            query_channel_config(conn, id)?
                .ok_or_else(|| anyhow!("Channel config vanished after upsert: {}", id))
        })
    }

    /// Returns false when no config had that id.
    pub fn delete_channel_config(&self, id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM channel_configs WHERE id = ?1", [id.to_string()])?;
            Ok(deleted > 0)
        })
    }

    pub fn mark_channel_synced(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE channel_configs SET last_synced_at = ?2 WHERE id = ?1",
                params![id.to_string(), format_ts(at)],
            )?;
            Ok(())
        })
    }

    // -- Tickets --

    /// Newest first, each with its brand and full message history.
    pub fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>> {
        self.with_conn(|conn| {
            let mut clauses: Vec<String> = Vec::new();
            let mut args: Vec<SqlValue> = Vec::new();

            if let Some(brand_id) = filter.brand_id {
                args.push(SqlValue::Text(brand_id.to_string()));
                clauses.push(format!("t.brand_id = ?{}", args.len()));
            }
            if let Some(channel_type) = filter.channel_type {
                args.push(SqlValue::Text(channel_type.as_str().to_string()));
                clauses.push(format!("t.channel_type = ?{}", args.len()));
            }
            if let Some(status) = filter.status {
                args.push(SqlValue::Text(status.as_str().to_string()));
                clauses.push(format!("t.status = ?{}", args.len()));
            }
            if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
                args.push(SqlValue::Text(format!("%{}%", escape_like(search))));
                let n = args.len();
                clauses.push(format!(
                    "(t.customer_name LIKE ?{n} ESCAPE '\\' OR t.subject LIKE ?{n} ESCAPE '\\')"
                ));
            }

            let mut sql = format!(
                "SELECT {TICKET_COLUMNS} FROM tickets t LEFT JOIN brands b ON t.brand_id = b.id"
            );
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push_str(" ORDER BY t.created_at DESC, t.rowid DESC");

            let mut stmt = conn.prepare(&sql)?;
            let mut tickets = stmt
                .query_map(params_from_iter(args), ticket_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            attach_messages(conn, &mut tickets)?;
            Ok(tickets)
        })
    }

    pub fn get_ticket(&self, id: Uuid) -> Result<Option<Ticket>> {
        self.with_conn(|conn| query_ticket(conn, id))
    }

    pub fn create_ticket(&self, ticket: &NewTicket) -> Result<Ticket> {
        self.with_conn_mut(|conn| {
            let id = insert_ticket(conn, ticket)?;
            query_ticket(conn, id)?.ok_or_else(|| anyhow!("Ticket vanished after insert: {}", id))
        })
    }

    /// Sync upsert, deduplicated on (external_id, channel_type) inside one
    /// transaction. A known ticket gets subject, status and metadata
    /// refreshed and nothing else. A new ticket is inserted together with
    /// the message `opening` builds for its id, or not at all.
    pub fn upsert_synced_ticket<F>(&self, ticket: &NewTicket, opening: F) -> Result<Upserted>
    where
        F: FnOnce(Uuid) -> Option<NewMessage>,
    {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let existing = match ticket.external_id.as_deref() {
                Some(external_id) => find_ticket_id(&tx, external_id, ticket.channel_type)?,
                None => None,
            };

            let upserted = match existing {
                Some(id) => {
                    tx.execute(
                        "UPDATE tickets SET subject = ?2, status = ?3, metadata = ?4, updated_at = ?5
                         WHERE id = ?1",
                        params![
                            id.to_string(),
                            ticket.subject,
                            ticket.status.as_str(),
                            serde_json::to_string(&ticket.metadata)?,
                            now_ts()
                        ],
                    )?;
                    Upserted::Refreshed(id)
                }
                None => {
                    let id = insert_ticket(&tx, ticket)?;
                    if let Some(message) = opening(id) {
                        insert_message(&tx, &message)?;
                    }
                    Upserted::Created(id)
                }
            };

            tx.commit()?;
            Ok(upserted)
        })
    }

    /// Sets the status. `resolved_at` is written only when given; other
    /// transitions leave the stored resolution time untouched.
    pub fn update_ticket_status(
        &self,
        id: Uuid,
        status: TicketStatus,
        resolved_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Ticket>> {
        self.with_conn_mut(|conn| {
            let updated = match resolved_at {
                Some(at) => conn.execute(
                    "UPDATE tickets SET status = ?2, resolved_at = ?3, updated_at = ?4 WHERE id = ?1",
                    params![id.to_string(), status.as_str(), format_ts(at), now_ts()],
                )?,
                None => conn.execute(
                    "UPDATE tickets SET status = ?2, updated_at = ?3 WHERE id = ?1",
                    params![id.to_string(), status.as_str(), now_ts()],
                )?,
            };
            if updated == 0 {
                return Ok(None);
            }
            query_ticket(conn, id)
        })
    }

    pub fn mark_ticket_read(&self, id: Uuid) -> Result<Option<Ticket>> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE tickets SET is_read = 1, updated_at = ?2 WHERE id = ?1",
                params![id.to_string(), now_ts()],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_ticket(conn, id)
        })
    }

    pub fn ticket_stats(
        &self,
        brand_id: Option<Uuid>,
        channel_type: Option<ChannelType>,
    ) -> Result<TicketStats> {
        self.with_conn(|conn| {
            let mut clauses: Vec<String> = Vec::new();
            let mut args: Vec<SqlValue> = Vec::new();
            if let Some(brand_id) = brand_id {
                args.push(SqlValue::Text(brand_id.to_string()));
                clauses.push(format!("brand_id = ?{}", args.len()));
            }
            if let Some(channel_type) = channel_type {
                args.push(SqlValue::Text(channel_type.as_str().to_string()));
                clauses.push(format!("channel_type = ?{}", args.len()));
            }

            let mut sql = "SELECT status, COUNT(*) FROM tickets".to_string();
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push_str(" GROUP BY status");

            let mut stmt = conn.prepare(&sql)?;
            let counts = stmt
                .query_map(params_from_iter(args), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut stats = TicketStats::default();
            for (status, count) in counts {
                stats.total += count;
                match status.parse::<TicketStatus>()? {
                    TicketStatus::Pending => stats.pending += count,
                    TicketStatus::InProgress => stats.in_progress += count,
                    TicketStatus::Resolved => stats.resolved += count,
                }
            }
            Ok(stats)
        })
    }

    // -- Messages --

    pub fn create_message(&self, message: &NewMessage) -> Result<Message> {
        self.with_conn_mut(|conn| {
            let id = insert_message(conn, message)?;
            let row = conn.query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                [id.to_string()],
                message_from_row,
            )?;
            Ok(row)
        })
    }

    /// Oldest first.
    pub fn get_messages(&self, ticket_id: Uuid) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE ticket_id = ?1 ORDER BY created_at, rowid"
            ))?;
            let rows = stmt
                .query_map([ticket_id.to_string()], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Sync logs --

    pub fn create_sync_log(&self, channel_config_id: Uuid, started_at: DateTime<Utc>) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sync_logs (id, channel_config_id, status, started_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    id.to_string(),
                    channel_config_id.to_string(),
                    SyncStatus::InProgress.as_str(),
                    format_ts(started_at),
                ],
            )?;
            Ok(id)
        })
    }

    pub fn finish_sync_log(
        &self,
        id: Uuid,
        status: SyncStatus,
        tickets_synced: u32,
        error_message: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE sync_logs SET status = ?2, tickets_synced = ?3, error_message = ?4, completed_at = ?5
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    status.as_str(),
                    tickets_synced,
                    error_message,
                    format_ts(completed_at),
                ],
            )?;
            Ok(())
        })
    }

    /// Newest first.
    pub fn recent_sync_logs(&self, limit: u32) -> Result<Vec<SyncLog>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SYNC_LOG_COLUMNS} FROM sync_logs l
                 LEFT JOIN channel_configs c ON l.channel_config_id = c.id
                 LEFT JOIN brands b ON c.brand_id = b.id
                 ORDER BY l.started_at DESC
                 LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map([limit], sync_log_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Quick replies --

    pub fn create_quick_reply(
        &self,
        brand_id: Option<Uuid>,
        title: &str,
        content: &str,
    ) -> Result<QuickReply> {
        let id = Uuid::new_v4();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO quick_replies (id, brand_id, title, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.to_string(), brand_id.map(|b| b.to_string()), title, content, now_ts()],
            )?;
            let row = conn.query_row(
                &format!("SELECT {QUICK_REPLY_COLUMNS} FROM quick_replies WHERE id = ?1"),
                [id.to_string()],
                quick_reply_from_row,
            )?;
            Ok(row)
        })
    }

    /// The brand's replies plus the shared ones, most used first.
    pub fn list_quick_replies(&self, brand_id: Option<Uuid>) -> Result<Vec<QuickReply>> {
        self.with_conn(|conn| {
            let mut sql = format!("SELECT {QUICK_REPLY_COLUMNS} FROM quick_replies");
            let mut args: Vec<SqlValue> = Vec::new();
            if let Some(brand_id) = brand_id {
                sql.push_str(" WHERE brand_id = ?1 OR brand_id IS NULL");
                args.push(SqlValue::Text(brand_id.to_string()));
            }
            sql.push_str(" ORDER BY usage_count DESC, created_at");

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(args), quick_reply_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn increment_quick_reply_usage(&self, id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE quick_replies SET usage_count = usage_count + 1 WHERE id = ?1",
                [id.to_string()],
            )?;
            Ok(updated > 0)
        })
    }
}

fn query_channel_config(conn: &Connection, id: Uuid) -> Result<Option<ChannelConfig>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {CHANNEL_COLUMNS} FROM channel_configs c
                 LEFT JOIN brands b ON c.brand_id = b.id
                 WHERE c.id = ?1"
            ),
            [id.to_string()],
            channel_from_row,
        )
        .optional()?;
    Ok(row)
}

fn find_ticket_id(conn: &Connection, external_id: &str, channel_type: ChannelType) -> Result<Option<Uuid>> {
    let id: Option<String> = conn
        .query_row(
            "SELECT id FROM tickets WHERE external_id = ?1 AND channel_type = ?2",
            params![external_id, channel_type.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    id.map(|id| id.parse::<Uuid>().map_err(Into::into)).transpose()
}

fn insert_ticket(conn: &Connection, ticket: &NewTicket) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let metadata = serde_json::to_string(&ticket.metadata)?;
    conn.execute(
        "INSERT INTO tickets
            (id, brand_id, channel_type, external_id, customer_name, customer_id, subject,
             status, priority, order_number, product_name, metadata, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
        params![
            id.to_string(),
            ticket.brand_id.to_string(),
            ticket.channel_type.as_str(),
            ticket.external_id,
            ticket.customer_name,
            ticket.customer_id,
            ticket.subject,
            ticket.status.as_str(),
            ticket.priority.as_str(),
            ticket.order_number,
            ticket.product_name,
            metadata,
            now_ts(),
        ],
    )?;
    Ok(id)
}

fn insert_message(conn: &Connection, message: &NewMessage) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let created_at = message.created_at.map(format_ts).unwrap_or_else(now_ts);
    conn.execute(
        "INSERT INTO messages (id, ticket_id, external_id, sender_type, sender_name, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id.to_string(),
            message.ticket_id.to_string(),
            message.external_id,
            message.sender_type.as_str(),
            message.sender_name,
            message.content,
            created_at,
        ],
    )?;
    Ok(id)
}

fn query_ticket(conn: &Connection, id: Uuid) -> Result<Option<Ticket>> {
    let ticket = conn
        .query_row(
            &format!(
                "SELECT {TICKET_COLUMNS} FROM tickets t
                 LEFT JOIN brands b ON t.brand_id = b.id
                 WHERE t.id = ?1"
            ),
            [id.to_string()],
            ticket_from_row,
        )
        .optional()?;

    match ticket {
        Some(ticket) => {
            let mut tickets = vec![ticket];
            attach_messages(conn, &mut tickets)?;
            Ok(tickets.pop())
        }
        None => Ok(None),
    }
}

/// Ids bound per `IN (...)` query; keeps well under SQLite's variable limit.
const MESSAGE_BATCH: usize = 500;

/// Batch-fetch messages for a set of tickets (avoids N+1).
fn attach_messages(conn: &Connection, tickets: &mut [Ticket]) -> Result<()> {
    if tickets.is_empty() {
        return Ok(());
    }

    let ids: Vec<String> = tickets.iter().map(|t| t.id.to_string()).collect();
    let mut by_ticket: HashMap<Uuid, Vec<Message>> = HashMap::new();

    for batch in ids.chunks(MESSAGE_BATCH) {
        let placeholders: Vec<String> = (1..=batch.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE ticket_id IN ({}) ORDER BY created_at, rowid",
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let messages = stmt
            .query_map(params_from_iter(batch.iter()), message_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for message in messages {
            by_ticket.entry(message.ticket_id).or_default().push(message);
        }
    }

    for ticket in tickets.iter_mut() {
        ticket.messages = by_ticket.remove(&ticket.id).unwrap_or_default();
    }
    Ok(())
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_types::{Priority, SenderType};

    fn seeded() -> (Database, Brand) {
        let db = Database::open_in_memory().unwrap();
        let brand = db.create_brand("Acme", Some("A"), Some("#ff0000")).unwrap();
        (db, brand)
    }

    fn new_ticket(brand_id: Uuid, external_id: Option<&str>, subject: &str) -> NewTicket {
        NewTicket {
            brand_id,
            channel_type: ChannelType::Coupang,
            external_id: external_id.map(str::to_string),
            customer_name: Some("Kim".into()),
            customer_id: Some("c-1".into()),
            subject: subject.into(),
            status: TicketStatus::Pending,
            priority: Priority::Medium,
            order_number: None,
            product_name: None,
            metadata: Metadata::for_platform("coupang"),
        }
    }

    fn agent_message(ticket_id: Uuid, content: &str) -> NewMessage {
        NewMessage {
            ticket_id,
            external_id: None,
            sender_type: SenderType::Agent,
            sender_name: Some("Agent".into()),
            content: content.into(),
            created_at: None,
        }
    }

    #[test]
    fn external_id_is_unique_per_channel_type() {
        let (db, brand) = seeded();
        db.create_ticket(&new_ticket(brand.id, Some("42"), "first")).unwrap();
        assert!(db.create_ticket(&new_ticket(brand.id, Some("42"), "dup")).is_err());

        // Operator tickets without an external id never collide.
        db.create_ticket(&new_ticket(brand.id, None, "manual 1")).unwrap();
        db.create_ticket(&new_ticket(brand.id, None, "manual 2")).unwrap();

        let again = db
            .upsert_synced_ticket(&new_ticket(brand.id, Some("42"), "again"), |_| None)
            .unwrap();
        assert!(matches!(again, Upserted::Refreshed(_)));

        let mut kakao = new_ticket(brand.id, Some("42"), "other platform");
        kakao.channel_type = ChannelType::Kakao;
        assert!(matches!(
            db.upsert_synced_ticket(&kakao, |_| None).unwrap(),
            Upserted::Created(_)
        ));
        assert_eq!(db.list_tickets(&TicketFilter::default()).unwrap().len(), 4);
    }

    #[test]
    fn refresh_keeps_message_history() {
        let (db, brand) = seeded();
        let ticket = db.create_ticket(&new_ticket(brand.id, Some("7"), "old")).unwrap();
        db.create_message(&agent_message(ticket.id, "hello")).unwrap();

        let mut update = new_ticket(brand.id, Some("7"), "new subject");
        update.status = TicketStatus::Resolved;
        update.metadata = Metadata::for_platform("coupang").with("vendor_id", "V");
        let upserted = db
            .upsert_synced_ticket(&update, |id| Some(agent_message(id, "never stored")))
            .unwrap();
        assert_eq!(upserted, Upserted::Refreshed(ticket.id));

        let reloaded = db.get_ticket(ticket.id).unwrap().unwrap();
        assert_eq!(reloaded.subject, "new subject");
        assert_eq!(reloaded.status, TicketStatus::Resolved);
        assert_eq!(reloaded.metadata.get("vendor_id"), Some(&serde_json::json!("V")));
        assert_eq!(reloaded.messages.len(), 1);
        assert_eq!(reloaded.messages[0].content, "hello");
        assert_eq!(reloaded.brand.unwrap().name, "Acme");
    }

    #[test]
    fn new_synced_ticket_is_stored_with_its_opening_message() {
        let (db, brand) = seeded();
        let upserted = db
            .upsert_synced_ticket(&new_ticket(brand.id, Some("9"), "Where is it?"), |id| {
                Some(agent_message(id, "opening"))
            })
            .unwrap();
        let Upserted::Created(id) = upserted else {
            panic!("expected a new ticket, got {upserted:?}");
        };

        let ticket = db.get_ticket(id).unwrap().unwrap();
        assert_eq!(ticket.messages.len(), 1);
        assert_eq!(ticket.messages[0].content, "opening");
    }

    #[test]
    fn failed_opening_message_leaves_no_ticket_behind() {
        let (db, brand) = seeded();
        let orphan = Uuid::new_v4();
        let result = db.upsert_synced_ticket(&new_ticket(brand.id, Some("13"), "rolled back"), |_| {
            Some(agent_message(orphan, "points at no ticket"))
        });
        assert!(result.is_err());
        assert!(db.list_tickets(&TicketFilter::default()).unwrap().is_empty());

        // The next sync sees a fresh record and seeds it properly.
        let retried = db
            .upsert_synced_ticket(&new_ticket(brand.id, Some("13"), "rolled back"), |id| {
                Some(agent_message(id, "opening"))
            })
            .unwrap();
        assert!(matches!(retried, Upserted::Created(_)));
    }

    #[test]
    fn status_update_only_stamps_resolution_when_given() {
        let (db, brand) = seeded();
        let ticket = db.create_ticket(&new_ticket(brand.id, None, "t")).unwrap();

        let resolved_at: DateTime<Utc> = "2024-03-01T12:00:00Z".parse().unwrap();
        let resolved = db
            .update_ticket_status(ticket.id, TicketStatus::Resolved, Some(resolved_at))
            .unwrap()
            .unwrap();
        assert_eq!(resolved.resolved_at, Some(resolved_at));

        let reopened = db
            .update_ticket_status(ticket.id, TicketStatus::InProgress, None)
            .unwrap()
            .unwrap();
        assert_eq!(reopened.status, TicketStatus::InProgress);
        assert_eq!(reopened.resolved_at, Some(resolved_at));

        assert!(
            db.update_ticket_status(Uuid::new_v4(), TicketStatus::Pending, None)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn list_tickets_filters_and_searches() {
        let (db, brand) = seeded();
        let other = db.create_brand("Other", None, None).unwrap();
        db.create_ticket(&new_ticket(brand.id, Some("1"), "Broken zipper")).unwrap();
        db.create_ticket(&new_ticket(brand.id, Some("2"), "Late delivery")).unwrap();
        db.create_ticket(&new_ticket(other.id, Some("3"), "Zipper color")).unwrap();

        let all = db.list_tickets(&TicketFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].subject, "Zipper color");

        let by_brand = db
            .list_tickets(&TicketFilter {
                brand_id: Some(brand.id),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_brand.len(), 2);

        let search = db
            .list_tickets(&TicketFilter {
                search: Some("zipper".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(search.len(), 2);

        let wildcard = db
            .list_tickets(&TicketFilter {
                search: Some("%".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(wildcard.is_empty());
    }

    #[test]
    fn messages_come_back_oldest_first() {
        let (db, brand) = seeded();
        let ticket = db.create_ticket(&new_ticket(brand.id, None, "t")).unwrap();
        for content in ["one", "two", "three"] {
            db.create_message(&agent_message(ticket.id, content)).unwrap();
        }
        let contents: Vec<String> = db
            .get_messages(ticket.id)
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn channel_upsert_merges_by_brand_and_type() {
        let (db, brand) = seeded();
        let created = db
            .upsert_channel_config(&UpsertChannelRequest {
                brand_id: Some(brand.id),
                channel_type: Some(ChannelType::Kakao),
                api_key: Some("admin".into()),
                store_id: Some("_abc".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(created.is_active);
        assert_eq!(created.brand_name(), Some("Acme"));

        let updated = db
            .upsert_channel_config(&UpsertChannelRequest {
                brand_id: Some(brand.id),
                channel_type: Some(ChannelType::Kakao),
                is_active: Some(false),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert!(!updated.is_active);
        assert_eq!(updated.api_key.as_deref(), Some("admin"));

        assert!(db.upsert_channel_config(&UpsertChannelRequest::default()).is_err());

        assert!(db.delete_channel_config(created.id).unwrap());
        assert!(!db.delete_channel_config(created.id).unwrap());
    }

    #[test]
    fn sync_logs_list_newest_first_with_channel_info() {
        let (db, brand) = seeded();
        let channel = db
            .upsert_channel_config(&UpsertChannelRequest {
                brand_id: Some(brand.id),
                channel_type: Some(ChannelType::Naverpay),
                api_key: Some("id".into()),
                ..Default::default()
            })
            .unwrap();

        let first = db
            .create_sync_log(channel.id, "2024-01-01T00:00:00Z".parse().unwrap())
            .unwrap();
        let second = db
            .create_sync_log(channel.id, "2024-01-02T00:00:00Z".parse().unwrap())
            .unwrap();
        db.finish_sync_log(first, SyncStatus::Failed, 0, Some("boom"), Utc::now())
            .unwrap();

        let logs = db.recent_sync_logs(20).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].id, second);
        assert_eq!(logs[0].status, SyncStatus::InProgress);
        assert_eq!(logs[1].error_message.as_deref(), Some("boom"));
        assert_eq!(logs[1].channel_type, Some(ChannelType::Naverpay));
        assert_eq!(logs[1].brand_name.as_deref(), Some("Acme"));
    }

    #[test]
    fn stats_count_by_status() {
        let (db, brand) = seeded();
        let a = db.create_ticket(&new_ticket(brand.id, Some("1"), "a")).unwrap();
        db.create_ticket(&new_ticket(brand.id, Some("2"), "b")).unwrap();
        db.update_ticket_status(a.id, TicketStatus::Resolved, Some(Utc::now()))
            .unwrap();

        let stats = db.ticket_stats(Some(brand.id), None).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.in_progress, 0);
    }

    #[test]
    fn quick_replies_include_shared_entries() {
        let (db, brand) = seeded();
        let other = db.create_brand("Other", None, None).unwrap();
        let shared = db.create_quick_reply(None, "Thanks", "Thank you!").unwrap();
        db.create_quick_reply(Some(brand.id), "Refund", "Refund started").unwrap();
        db.create_quick_reply(Some(other.id), "Other", "Not ours").unwrap();

        assert!(db.increment_quick_reply_usage(shared.id).unwrap());
        let replies = db.list_quick_replies(Some(brand.id)).unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].id, shared.id);
        assert_eq!(replies[0].usage_count, 1);
    }

    #[test]
    fn mark_read_flips_flag_and_touches_updated_at() {
        let (db, brand) = seeded();
        let ticket = db.create_ticket(&new_ticket(brand.id, None, "Unread")).unwrap();
        assert!(!ticket.is_read);

        std::thread::sleep(std::time::Duration::from_millis(5));
        let read = db.mark_ticket_read(ticket.id).unwrap().unwrap();
        assert!(read.is_read);
        assert!(read.updated_at > ticket.updated_at);
        assert_eq!(read.status, ticket.status);

        assert!(db.mark_ticket_read(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn list_tickets_handles_more_tickets_than_bind_variables() {
        const COUNT: usize = 33_000;
        let (db, brand) = seeded();
        let metadata = serde_json::to_string(&Metadata::for_platform("coupang")).unwrap();
        let ids: Vec<Uuid> = (0..COUNT).map(|_| Uuid::new_v4()).collect();

        db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO tickets (id, brand_id, channel_type, subject, metadata, created_at, updated_at)
                     VALUES (?1, ?2, 'coupang', ?3, ?4, ?5, ?5)",
                )?;
                let start = Utc::now();
                for (i, id) in ids.iter().enumerate() {
                    let at = format_ts(start + chrono::Duration::milliseconds(i as i64));
                    stmt.execute(params![
                        id.to_string(),
                        brand.id.to_string(),
                        format!("Inquiry {i}"),
                        metadata,
                        at
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .unwrap();

        let oldest = ids[0];
        let newest = ids[COUNT - 1];
        db.create_message(&agent_message(oldest, "first")).unwrap();
        db.create_message(&agent_message(newest, "last")).unwrap();

        let tickets = db.list_tickets(&TicketFilter::default()).unwrap();
        assert_eq!(tickets.len(), COUNT);
        assert_eq!(tickets[0].id, newest);
        assert_eq!(tickets[0].messages[0].content, "last");
        assert_eq!(tickets[COUNT - 1].id, oldest);
        assert_eq!(tickets[COUNT - 1].messages[0].content, "first");
        assert!(tickets[1..COUNT - 1].iter().all(|t| t.messages.is_empty()));
    }
}
