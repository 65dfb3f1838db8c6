use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use balagh_types::api::FileAttachment;
use balagh_types::conversation::{Part, Role, Turn};
use balagh_types::models::Report;

use crate::assistant::{AssistantClient, FALLBACK_ANSWER};
use crate::extractor;
use crate::sink::ReportSink;
use crate::store::{ConversationStore, StoreError};

pub const DEFAULT_MIME: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The report was complete but could not be saved. The conversation is kept.
    #[error("report persistence failed: {0}")]
    Persistence(anyhow::Error),
}

#[derive(Debug)]
pub struct ChatOutcome {
    /// What the user sees.
    pub answer: String,
    /// Set when this message completed and persisted a report.
    pub report: Option<Report>,
}

/// One chat message, start to finish, under the session's lease.
pub struct ChatPipeline {
    store: Arc<dyn ConversationStore>,
    assistant: Arc<dyn AssistantClient>,
    reports: Arc<dyn ReportSink>,
    assistant_timeout: Duration,
}

impl ChatPipeline {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        assistant: Arc<dyn AssistantClient>,
        reports: Arc<dyn ReportSink>,
        assistant_timeout: Duration,
    ) -> Self {
        Self {
            store,
            assistant,
            reports,
            assistant_timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub async fn handle(
        &self,
        session_id: &str,
        prompt: &str,
        files: &[FileAttachment],
    ) -> Result<ChatOutcome, PipelineError> {
        let mut lease = self.store.lease(session_id).await?;
        let mut history = lease.get_or_create().await?;

        let user = user_turn(prompt, files);
        history.push(user.clone());

        // Nothing is appended until an answer (real or fallback) exists
        let reply = self.ask(session_id, &history).await;
        lease.append(user).await?;
        lease.append(Turn::text(Role::Model, reply.clone())).await?;

        if !extractor::is_complete(&reply) {
            debug!(session_id = %session_id, turns = history.len() + 1, "Conversation continues");
            return Ok(ChatOutcome {
                answer: reply,
                report: None,
            });
        }

        let extraction = extractor::extract(&reply);
        let report = extractor::build_report(&extraction.fields, Utc::now());

        if let Err(e) = self.reports.insert(&report).await {
            warn!(session_id = %session_id, error = %e, "Failed to persist report, keeping conversation");
            return Err(PipelineError::Persistence(e));
        }
        lease.delete().await?;

        info!(
            session_id = %session_id,
            report_id = %report.id,
            strategy = extraction.strategy.as_str(),
            "Report filed from conversation"
        );

        Ok(ChatOutcome {
            answer: extractor::visible_answer(&reply),
            report: Some(report),
        })
    }

    async fn ask(&self, session_id: &str, history: &[Turn]) -> String {
        match tokio::time::timeout(self.assistant_timeout, self.assistant.generate(history)).await {
            Ok(Ok(Some(text))) if !text.trim().is_empty() => text,
            Ok(Ok(_)) => {
                warn!(session_id = %session_id, "Assistant returned no text");
                FALLBACK_ANSWER.to_string()
            }
            Ok(Err(e)) => {
                warn!(session_id = %session_id, error = %e, "Assistant call failed");
                FALLBACK_ANSWER.to_string()
            }
            Err(_) => {
                warn!(
                    session_id = %session_id,
                    timeout_ms = self.assistant_timeout.as_millis() as u64,
                    "Assistant call timed out"
                );
                FALLBACK_ANSWER.to_string()
            }
        }
    }
}

/// Prompt text followed by one inline part per attachment.
fn user_turn(prompt: &str, files: &[FileAttachment]) -> Turn {
    let mut parts = Vec::with_capacity(files.len() + 1);
    if !prompt.is_empty() || files.is_empty() {
        parts.push(Part::text(prompt));
    }
    for file in files {
        let mime = file
            .mime
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_MIME);
        parts.push(Part::media(mime, file.data.clone()));
    }
    Turn {
        role: Role::User,
        parts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::AssistantError;
    use crate::store::MemoryConversationStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const COMPLETE: &str = r#"تم تسجيل بلاغك.
<REPORT_JSON>{"title":"تسرب مياه","category":"تسرب مياه","address":"شارع الملك","date":"اليوم","description":"ماء يتسرب من السقف"}</REPORT_JSON>
<REPORT_READY>"#;

    /// Replies from a script, then echoes the last user text.
    #[derive(Default)]
    struct FakeAssistant {
        script: Mutex<VecDeque<Result<Option<String>, AssistantError>>>,
        delay: Duration,
        seen_lengths: Mutex<Vec<usize>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeAssistant {
        fn scripted(replies: Vec<Result<Option<String>, AssistantError>>) -> Self {
            Self {
                script: Mutex::new(replies.into()),
                ..Default::default()
            }
        }

        fn echo_with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl AssistantClient for FakeAssistant {
        async fn generate(&self, history: &[Turn]) -> Result<Option<String>, AssistantError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.seen_lengths.lock().unwrap().push(history.len());

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let scripted = self.script.lock().unwrap().pop_front();
            match scripted {
                Some(reply) => reply,
                None => {
                    let last = history.last().map(Turn::joined_text).unwrap_or_default();
                    Ok(Some(format!("echo:{last}")))
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<Report>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl ReportSink for RecordingSink {
        async fn insert(&self, report: &Report) -> anyhow::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("database is locked");
            }
            self.reports.lock().unwrap().push(report.clone());
            Ok(())
        }
    }

    struct Harness {
        store: Arc<MemoryConversationStore>,
        assistant: Arc<FakeAssistant>,
        sink: Arc<RecordingSink>,
        pipeline: Arc<ChatPipeline>,
    }

    fn harness(assistant: FakeAssistant, timeout: Duration) -> Harness {
        let store = Arc::new(MemoryConversationStore::new("preamble"));
        let assistant = Arc::new(assistant);
        let sink = Arc::new(RecordingSink::default());
        let pipeline = Arc::new(ChatPipeline::new(
            store.clone(),
            assistant.clone(),
            sink.clone(),
            timeout,
        ));
        Harness {
            store,
            assistant,
            sink,
            pipeline,
        }
    }

    async fn history(store: &MemoryConversationStore, session_id: &str) -> Vec<(Role, String)> {
        store
            .lease(session_id)
            .await
            .unwrap()
            .get_or_create()
            .await
            .unwrap()
            .iter()
            .map(|t| (t.role, t.joined_text()))
            .collect()
    }

    #[tokio::test]
    async fn sequential_messages_append_in_order() {
        let h = harness(FakeAssistant::default(), Duration::from_secs(5));

        let first = h.pipeline.handle("s1", "مرحبا", &[]).await.unwrap();
        let second = h.pipeline.handle("s1", "سُرقت سيارتي", &[]).await.unwrap();
        assert_eq!(first.answer, "echo:مرحبا");
        assert!(second.report.is_none());

        assert_eq!(
            history(&h.store, "s1").await,
            vec![
                (Role::System, "preamble".to_string()),
                (Role::User, "مرحبا".to_string()),
                (Role::Model, "echo:مرحبا".to_string()),
                (Role::User, "سُرقت سيارتي".to_string()),
                (Role::Model, "echo:سُرقت سيارتي".to_string()),
            ]
        );
        // preamble + pending user turn, then the same plus the first exchange
        assert_eq!(*h.assistant.seen_lengths.lock().unwrap(), vec![2, 4]);
    }

    #[tokio::test]
    async fn concurrent_messages_on_one_session_do_not_interleave() {
        let h = harness(
            FakeAssistant::echo_with_delay(Duration::from_millis(50)),
            Duration::from_secs(5),
        );

        let tasks: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|prompt| {
                let pipeline = h.pipeline.clone();
                tokio::spawn(async move { pipeline.handle("s1", prompt, &[]).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(h.assistant.max_in_flight.load(Ordering::SeqCst), 1);

        let turns = history(&h.store, "s1").await;
        assert_eq!(turns.len(), 7);
        for pair in turns[1..].chunks(2) {
            assert_eq!(pair[0].0, Role::User);
            assert_eq!(pair[1].0, Role::Model);
            assert_eq!(pair[1].1, format!("echo:{}", pair[0].1));
        }
    }

    #[tokio::test]
    async fn different_sessions_run_concurrently() {
        let h = harness(
            FakeAssistant::echo_with_delay(Duration::from_millis(100)),
            Duration::from_secs(5),
        );

        let a = {
            let pipeline = h.pipeline.clone();
            tokio::spawn(async move { pipeline.handle("s1", "x", &[]).await })
        };
        let b = {
            let pipeline = h.pipeline.clone();
            tokio::spawn(async move { pipeline.handle("s2", "y", &[]).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(h.assistant.max_in_flight.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn completion_persists_once_and_clears_session() {
        let h = harness(
            FakeAssistant::scripted(vec![Ok(Some(COMPLETE.to_string()))]),
            Duration::from_secs(5),
        );

        let outcome = h.pipeline.handle("s1", "الماء يتسرب", &[]).await.unwrap();

        let reports = h.sink.reports.lock().unwrap().clone();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.title, "تسرب مياه");
        assert_eq!(report.address, "شارع الملك");
        assert_eq!(report.status, balagh_types::models::ReportStatus::Pending);
        assert_eq!(report.date.date_naive(), Utc::now().date_naive());

        assert_eq!(outcome.report.map(|r| r.id), Some(report.id));
        assert_eq!(outcome.answer, "تم تسجيل بلاغك.");
        assert!(!h.store.contains("s1").await);
    }

    #[tokio::test]
    async fn no_marker_keeps_session_and_skips_persistence() {
        let h = harness(
            FakeAssistant::scripted(vec![Ok(Some("ما هو موقع الحادثة؟".to_string()))]),
            Duration::from_secs(5),
        );

        let outcome = h.pipeline.handle("s1", "سرقة", &[]).await.unwrap();
        assert_eq!(outcome.answer, "ما هو موقع الحادثة؟");
        assert!(outcome.report.is_none());
        assert!(h.sink.reports.lock().unwrap().is_empty());
        assert!(h.store.contains("s1").await);
        assert_eq!(history(&h.store, "s1").await.len(), 3);
    }

    #[tokio::test]
    async fn unparsable_report_still_completes_with_defaults() {
        let h = harness(
            FakeAssistant::scripted(vec![Ok(Some(
                "<REPORT_JSON>{not json</REPORT_JSON><REPORT_READY>".to_string(),
            ))]),
            Duration::from_secs(5),
        );

        h.pipeline.handle("s1", "انتهيت", &[]).await.unwrap();

        let reports = h.sink.reports.lock().unwrap().clone();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].title, extractor::DEFAULT_TITLE);
        assert_eq!(reports[0].category, extractor::DEFAULT_CATEGORY);
        assert!(!h.store.contains("s1").await);
    }

    #[tokio::test]
    async fn persistence_failure_keeps_session() {
        let h = harness(
            FakeAssistant::scripted(vec![Ok(Some(COMPLETE.to_string()))]),
            Duration::from_secs(5),
        );
        h.sink.fail.store(true, Ordering::SeqCst);

        let result = h.pipeline.handle("s1", "الماء يتسرب", &[]).await;
        assert!(matches!(result, Err(PipelineError::Persistence(_))));
        assert!(h.store.contains("s1").await);
        assert_eq!(history(&h.store, "s1").await.len(), 3);
    }

    #[tokio::test]
    async fn assistant_failures_become_fallback_answer() {
        let h = harness(
            FakeAssistant::scripted(vec![
                Err(AssistantError::Status { status: 503 }),
                Ok(None),
                Ok(Some("   ".to_string())),
            ]),
            Duration::from_secs(5),
        );

        for _ in 0..3 {
            let outcome = h.pipeline.handle("s1", "مرحبا", &[]).await.unwrap();
            assert_eq!(outcome.answer, FALLBACK_ANSWER);
        }
        assert_eq!(history(&h.store, "s1").await.len(), 7);
    }

    #[tokio::test]
    async fn timeout_becomes_fallback_answer() {
        let h = harness(
            FakeAssistant::echo_with_delay(Duration::from_millis(500)),
            Duration::from_millis(20),
        );

        let outcome = h.pipeline.handle("s1", "مرحبا", &[]).await.unwrap();
        assert_eq!(outcome.answer, FALLBACK_ANSWER);

        let turns = history(&h.store, "s1").await;
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2], (Role::Model, FALLBACK_ANSWER.to_string()));
    }

    #[test]
    fn user_turn_carries_attachments() {
        let files = vec![
            FileAttachment {
                mime: Some("image/jpeg".into()),
                data: "AAAA".into(),
            },
            FileAttachment {
                mime: None,
                data: "BBBB".into(),
            },
        ];
        let turn = user_turn("صورة الضرر", &files);
        assert_eq!(turn.parts.len(), 3);
        assert_eq!(turn.parts[0].text.as_deref(), Some("صورة الضرر"));
        assert_eq!(turn.parts[1].inline_media.as_ref().unwrap().mime, "image/jpeg");
        assert_eq!(turn.parts[2].inline_media.as_ref().unwrap().mime, DEFAULT_MIME);
    }
}
