use async_trait::async_trait;

use balagh_types::api::FileAttachment;
use balagh_types::models::Report;

/// Where finished reports go.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn insert(&self, report: &Report) -> anyhow::Result<()>;
}

/// Evidence storage. Returns one opaque id per attachment, in order.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn store(&self, files: &[FileAttachment]) -> anyhow::Result<Vec<String>>;
}
