use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE brands (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                icon        TEXT,
                color       TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE channel_configs (
                id              TEXT PRIMARY KEY,
                brand_id        TEXT NOT NULL REFERENCES brands(id),
                channel_type    TEXT NOT NULL,
                api_key         TEXT,
                api_secret      TEXT,
                store_id        TEXT,
                access_token    TEXT,
                refresh_token   TEXT,
                is_active       INTEGER NOT NULL DEFAULT 1,
                last_synced_at  TEXT,
                created_at      TEXT NOT NULL,
                UNIQUE(brand_id, channel_type)
            );

            CREATE TABLE tickets (
                id              TEXT PRIMARY KEY,
                brand_id        TEXT NOT NULL REFERENCES brands(id),
                channel_type    TEXT NOT NULL,
                external_id     TEXT,
                customer_name   TEXT,
                customer_id     TEXT,
                subject         TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'pending',
                priority        TEXT NOT NULL DEFAULT 'medium',
                order_number    TEXT,
                product_name    TEXT,
                metadata        TEXT NOT NULL DEFAULT '{}',
                is_read         INTEGER NOT NULL DEFAULT 0,
                resolved_at     TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            -- One ticket per upstream record. Operator-created tickets have a
            -- NULL external_id and are never deduplicated.
            CREATE UNIQUE INDEX idx_tickets_external
                ON tickets(external_id, channel_type);

            CREATE INDEX idx_tickets_created
                ON tickets(created_at);

            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                ticket_id       TEXT NOT NULL REFERENCES tickets(id),
                external_id     TEXT,
                sender_type     TEXT NOT NULL,
                sender_name     TEXT,
                content         TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_messages_ticket
                ON messages(ticket_id, created_at);

            CREATE TABLE sync_logs (
                id                  TEXT PRIMARY KEY,
                channel_config_id   TEXT NOT NULL REFERENCES channel_configs(id) ON DELETE CASCADE,
                status              TEXT NOT NULL,
                tickets_synced      INTEGER NOT NULL DEFAULT 0,
                error_message       TEXT,
                started_at          TEXT NOT NULL,
                completed_at        TEXT
            );

            CREATE INDEX idx_sync_logs_started
                ON sync_logs(started_at);

            CREATE TABLE quick_replies (
                id          TEXT PRIMARY KEY,
                brand_id    TEXT REFERENCES brands(id),
                title       TEXT NOT NULL,
                content     TEXT NOT NULL,
                usage_count INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }
}
