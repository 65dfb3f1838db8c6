use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (reports, media)");
        conn.execute_batch(
            "
            CREATE TABLE reports (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL,
                category    TEXT NOT NULL,
                location    TEXT NOT NULL,
                date        TEXT NOT NULL,
                description TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                media_refs  TEXT NOT NULL DEFAULT '[]',
                status      TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'in_progress', 'resolved'))
            );

            CREATE INDEX idx_reports_created
                ON reports(created_at);

            -- Append-only evidence store; reports reference rows by id
            CREATE TABLE media (
                id          TEXT PRIMARY KEY,
                data        TEXT NOT NULL,
                mime        TEXT NOT NULL,
                uploaded_at TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
