use serde::{Deserialize, Serialize};

// -- Keys --

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    pub public_key: String,
}

// -- Sealed requests --

/// Outer body of `POST /chat` and `POST /submit-report`.
///
/// Every field is optional at the serde level so a missing one maps to a
/// 400 with a message instead of a framework rejection.
#[derive(Debug, Default, Deserialize)]
pub struct SealedRequest {
    pub ephemeral_pub: Option<String>,
    pub nonce: Option<String>,
    pub ciphertext: Option<String>,
    pub ts: Option<i64>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

// -- Chat --

/// Decrypted body of `POST /chat`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatPayload {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub files: Vec<FileAttachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttachment {
    #[serde(default)]
    pub mime: Option<String>,
    /// Base64 file contents, passed through untouched.
    pub data: String,
}

/// Decrypted body of the `POST /chat` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
}

// -- Manual report submission --

/// Decrypted body of `POST /submit-report`. Older clients send the report
/// object bare instead of wrapping it.
///
/// A `report` key always selects the wrapped form, so a bad field inside it
/// is a parse error rather than an empty bare draft.
#[derive(Debug, Deserialize)]
pub struct SubmitReportPayload {
    #[serde(default)]
    report: Option<ReportDraft>,
    #[serde(flatten)]
    bare: ReportDraft,
}

impl SubmitReportPayload {
    pub fn into_draft(self) -> ReportDraft {
        self.report.unwrap_or(self.bare)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportDraft {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub media: Vec<FileAttachment>,
}

// -- Misc --

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_payload_accepts_wrapped_and_bare() {
        let wrapped: SubmitReportPayload = serde_json::from_str(
            r#"{"report":{"title":"سرقة","media":[{"data":"AAAA","mime":"image/png"}]}}"#,
        )
        .unwrap();
        let draft = wrapped.into_draft();
        assert_eq!(draft.title.as_deref(), Some("سرقة"));
        assert_eq!(draft.media.len(), 1);

        let bare: SubmitReportPayload =
            serde_json::from_str(r#"{"title":"احتيال","address":"جدة"}"#).unwrap();
        let draft = bare.into_draft();
        assert_eq!(draft.title.as_deref(), Some("احتيال"));
        assert!(draft.media.is_empty());
    }

    #[test]
    fn bad_field_inside_wrapper_is_rejected() {
        let missing_data = r#"{"report":{"title":"سرقة سيارة","address":"جدة","media":[{"mime":"image/png"}]}}"#;
        assert!(serde_json::from_str::<SubmitReportPayload>(missing_data).is_err());

        let numeric_title = r#"{"report":{"title":5}}"#;
        assert!(serde_json::from_str::<SubmitReportPayload>(numeric_title).is_err());

        assert!(serde_json::from_str::<SubmitReportPayload>(r#"{"report":"سرقة"}"#).is_err());
        assert!(serde_json::from_str::<SubmitReportPayload>(r#"{"title":["x"]}"#).is_err());
    }

    #[test]
    fn sealed_request_tolerates_missing_fields() {
        let req: SealedRequest = serde_json::from_str(r#"{"nonce":"AA==","sessionId":"s1"}"#).unwrap();
        assert!(req.ephemeral_pub.is_none());
        assert_eq!(req.session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn chat_payload_files_default_empty() {
        let payload: ChatPayload = serde_json::from_str(r#"{"prompt":"مرحبا"}"#).unwrap();
        assert!(payload.files.is_empty());
    }
}
