//! Row types mirroring the SQLite tables. Kept apart from balagh-types so
//! this crate has no domain dependencies.

pub struct ReportRow {
    pub id: String,
    pub title: String,
    pub category: String,
    pub location: String,
    pub date: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
    /// JSON array of media ids.
    pub media_refs: String,
    pub status: String,
}

pub struct MediaRow {
    pub id: String,
    pub data: String,
    pub mime: String,
    pub uploaded_at: String,
}
