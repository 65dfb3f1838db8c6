//! Completion detection and report extraction from assistant replies.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use balagh_types::models::{Report, ReportStatus};

use crate::dates;
use crate::prompt::{REPORT_JSON_CLOSE, REPORT_JSON_OPEN, REPORT_READY_MARKER};

pub const DEFAULT_TITLE: &str = "بلاغ بدون عنوان";
pub const DEFAULT_CATEGORY: &str = "أخرى";
pub const DEFAULT_ADDRESS: &str = "غير محدد";
pub const DEFAULT_DESCRIPTION: &str = "";

/// Shown when a completed reply carried nothing but the machine payload.
pub const DEFAULT_CONFIRMATION: &str = "تم استلام بلاغك بنجاح، شكراً لك.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Text between the JSON delimiters parsed.
    Delimited,
    /// First balanced `{...}` span in the reply parsed.
    BraceScan,
    /// Nothing parsed; fields fall back to defaults.
    None,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delimited => "delimited",
            Self::BraceScan => "brace_scan",
            Self::None => "none",
        }
    }
}

#[derive(Debug)]
pub struct Extraction {
    pub strategy: Strategy,
    pub fields: Map<String, Value>,
}

pub fn is_complete(reply: &str) -> bool {
    reply.contains(REPORT_READY_MARKER)
}

/// Pull the report object out of a completed reply. Never fails: an
/// unparsable reply gives an empty object.
pub fn extract(reply: &str) -> Extraction {
    let delimited = delimited_block(reply).and_then(|(_, inner)| parse_object(inner));
    let extraction = match delimited {
        Some(fields) => Extraction {
            strategy: Strategy::Delimited,
            fields,
        },
        None => match first_balanced_object(reply).and_then(|(_, span)| parse_object(span)) {
            Some(fields) => Extraction {
                strategy: Strategy::BraceScan,
                fields,
            },
            None => Extraction {
                strategy: Strategy::None,
                fields: Map::new(),
            },
        },
    };

    if extraction.strategy == Strategy::None {
        warn!(strategy = extraction.strategy.as_str(), "No report JSON could be parsed");
    } else {
        debug!(
            strategy = extraction.strategy.as_str(),
            fields = extraction.fields.len(),
            "Report JSON extracted"
        );
    }
    extraction
}

/// The reply as the user should see it: payload and completion flag removed.
pub fn visible_answer(reply: &str) -> String {
    let mut text = match delimited_block(reply) {
        Some((range, _)) => {
            let mut s = String::with_capacity(reply.len());
            s.push_str(&reply[..range.start]);
            s.push_str(&reply[range.end..]);
            s
        }
        None => match first_balanced_object(reply) {
            Some((range, _)) if is_complete(reply) => {
                let mut s = String::with_capacity(reply.len());
                s.push_str(&reply[..range.start]);
                s.push_str(&reply[range.end..]);
                s
            }
            _ => reply.to_string(),
        },
    };

    text = text.replace(REPORT_READY_MARKER, "");
    let trimmed = text.trim();
    if trimmed.is_empty() {
        DEFAULT_CONFIRMATION.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Report fields before defaults are applied. Shared by the chat path and
/// manual submission.
#[derive(Debug, Default, Clone)]
pub struct RawReport {
    pub title: Option<String>,
    pub category: Option<String>,
    pub address: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
    pub media: Vec<String>,
}

impl RawReport {
    /// Non-string values count as absent. `location` is accepted for `address`.
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);

        Self {
            title: text("title"),
            category: text("category"),
            address: text("address").or_else(|| text("location")),
            date: text("date"),
            description: text("description"),
            media: fields
                .get("media")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// Apply placeholders, interpret the date, and stamp identity and status.
pub fn normalize_report(raw: RawReport, now: DateTime<Utc>) -> Report {
    let date = raw
        .date
        .as_deref()
        .and_then(|d| dates::interpret(d, now))
        .unwrap_or(now);

    Report {
        id: Uuid::new_v4(),
        title: or_default(raw.title, DEFAULT_TITLE),
        category: or_default(raw.category, DEFAULT_CATEGORY),
        address: or_default(raw.address, DEFAULT_ADDRESS),
        date,
        description: or_default(raw.description, DEFAULT_DESCRIPTION),
        media: raw.media,
        status: ReportStatus::Pending,
        created_at: now,
        updated_at: now,
    }
}

pub fn build_report(fields: &Map<String, Value>, now: DateTime<Utc>) -> Report {
    normalize_report(RawReport::from_fields(fields), now)
}

fn or_default(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Byte range of the whole delimited block and the text inside it.
fn delimited_block(reply: &str) -> Option<(std::ops::Range<usize>, &str)> {
    let start = reply.find(REPORT_JSON_OPEN)?;
    let inner_start = start + REPORT_JSON_OPEN.len();
    let inner_len = reply[inner_start..].find(REPORT_JSON_CLOSE)?;
    let inner_end = inner_start + inner_len;
    let end = inner_end + REPORT_JSON_CLOSE.len();
    Some((start..end, &reply[inner_start..inner_end]))
}

/// First `{...}` span whose braces balance, ignoring braces inside JSON strings.
fn first_balanced_object(text: &str) -> Option<(std::ops::Range<usize>, &str)> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return Some((start..end, &text[start..end]));
                }
            }
            _ => {}
        }
    }
    None
}
