use crate::models::{MediaRow, ReportRow};
use crate::Database;
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Reports --

    pub fn insert_report(&self, report: &ReportRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reports (id, title, category, location, date, description, created_at, updated_at, media_refs, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    report.id,
                    report.title,
                    report.category,
                    report.location,
                    report.date,
                    report.description,
                    report.created_at,
                    report.updated_at,
                    report.media_refs,
                    report.status,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_report(&self, id: &str) -> Result<Option<ReportRow>> {
        self.with_conn(|conn| query_report(conn, id))
    }

    pub fn count_reports(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM reports", [], |r| r.get(0))?;
            Ok(count as u64)
        })
    }

    // -- Media --

    /// Insert all rows or none.
    pub fn insert_media(&self, rows: &[MediaRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO media (id, data, mime, uploaded_at) VALUES (?1, ?2, ?3, ?4)",
                )?;
                for row in rows {
                    stmt.execute(rusqlite::params![row.id, row.data, row.mime, row.uploaded_at])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_media(&self, id: &str) -> Result<Option<MediaRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, data, mime, uploaded_at FROM media WHERE id = ?1",
                [id],
                |row| {
                    Ok(MediaRow {
                        id: row.get(0)?,
                        data: row.get(1)?,
                        mime: row.get(2)?,
                        uploaded_at: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }
}

fn query_report(conn: &Connection, id: &str) -> Result<Option<ReportRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, category, location, date, description, created_at, updated_at, media_refs, status
         FROM reports WHERE id = ?1",
    )?;

    let row = stmt
        .query_row([id], |row| {
            Ok(ReportRow {
                id: row.get(0)?,
                title: row.get(1)?,
                category: row.get(2)?,
                location: row.get(3)?,
                date: row.get(4)?,
                description: row.get(5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
                media_refs: row.get(8)?,
                status: row.get(9)?,
            })
        })
        .optional()?;

    Ok(row)
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
