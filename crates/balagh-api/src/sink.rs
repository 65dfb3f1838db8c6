use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;
use uuid::Uuid;

use balagh_conversation::sink::{MediaStore, ReportSink};
use balagh_db::Database;
use balagh_db::models::{MediaRow, ReportRow};
use balagh_types::api::FileAttachment;
use balagh_types::models::{MediaRecord, Report};

const DEFAULT_MIME: &str = "application/octet-stream";

fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Reports table writer. Blocking SQLite work runs off the async runtime.
pub struct SqliteReportSink {
    db: Arc<Database>,
}

impl SqliteReportSink {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReportSink for SqliteReportSink {
    async fn insert(&self, report: &Report) -> anyhow::Result<()> {
        let row = ReportRow {
            id: report.id.to_string(),
            title: report.title.clone(),
            category: report.category.clone(),
            location: report.address.clone(),
            date: timestamp(&report.date),
            description: report.description.clone(),
            created_at: timestamp(&report.created_at),
            updated_at: timestamp(&report.updated_at),
            media_refs: serde_json::to_string(&report.media)?,
            status: report.status.as_str().to_string(),
        };

        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.insert_report(&row)).await??;
        debug!(report_id = %report.id, "Report row inserted");
        Ok(())
    }
}

/// Append-only evidence table.
pub struct SqliteMediaStore {
    db: Arc<Database>,
}

impl SqliteMediaStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MediaStore for SqliteMediaStore {
    async fn store(&self, files: &[FileAttachment]) -> anyhow::Result<Vec<String>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let uploaded_at = Utc::now();
        let records: Vec<MediaRecord> = files
            .iter()
            .map(|f| MediaRecord {
                id: Uuid::new_v4().to_string(),
                data: f.data.clone(),
                mime: f
                    .mime
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_MIME.to_string()),
                uploaded_at,
            })
            .collect();
        let ids = records.iter().map(|r| r.id.clone()).collect();

        let rows: Vec<MediaRow> = records
            .into_iter()
            .map(|r| MediaRow {
                uploaded_at: timestamp(&r.uploaded_at),
                id: r.id,
                data: r.data,
                mime: r.mime,
            })
            .collect();

        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.insert_media(&rows)).await??;
        Ok(ids)
    }
}
