use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use balagh_types::conversation::{Role, Turn};

use crate::assistant::{AssistantClient, AssistantError};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// `generateContent` client for the Gemini REST API.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, AssistantError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                base_url.trim_end_matches('/'),
                model
            ),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AssistantClient for GeminiClient {
    async fn generate(&self, history: &[Turn]) -> Result<Option<String>, AssistantError> {
        let request = build_request(history);

        let resp = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Gemini request failed");
            return Err(AssistantError::Status {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await?;
        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| AssistantError::Malformed(e.to_string()))?;

        let answer = parsed.first_text();
        debug!(has_text = answer.is_some(), "Gemini responded");
        Ok(answer)
    }
}

// -- Wire types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    contents: Vec<WireContent>,
}

#[derive(Debug, Serialize)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart {
    Text { text: String },
    Media { inline_data: WireBlob },
}

#[derive(Debug, Serialize)]
struct WireBlob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

/// System turns are folded into `systemInstruction`; the rest keep their order.
fn build_request(history: &[Turn]) -> GenerateRequest {
    let mut system_parts = Vec::new();
    let mut contents = Vec::new();

    for turn in history {
        let parts = turn.parts.iter().filter_map(|part| {
            if let Some(media) = &part.inline_media {
                Some(WirePart::Media {
                    inline_data: WireBlob {
                        mime_type: media.mime.clone(),
                        data: media.data.clone(),
                    },
                })
            } else {
                part.text.as_ref().map(|text| WirePart::Text { text: text.clone() })
            }
        });

        match turn.role {
            Role::System => system_parts.extend(parts),
            Role::User => contents.push(WireContent {
                role: Some("user"),
                parts: parts.collect(),
            }),
            Role::Model => contents.push(WireContent {
                role: Some("model"),
                parts: parts.collect(),
            }),
        }
    }

    GenerateRequest {
        system_instruction: (!system_parts.is_empty()).then(|| WireContent {
            role: None,
            parts: system_parts,
        }),
        contents,
    }
}
