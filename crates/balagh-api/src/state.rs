use std::sync::Arc;

use balagh_conversation::pipeline::ChatPipeline;
use balagh_conversation::sink::{MediaStore, ReportSink};
use balagh_crypto::keys::ServerKeyPair;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub keys: ServerKeyPair,
    pub pipeline: ChatPipeline,
    pub reports: Arc<dyn ReportSink>,
    pub media: Arc<dyn MediaStore>,
    /// Advisory only; stale envelopes are logged, not rejected.
    pub replay_window_secs: i64,
    pub body_limit_bytes: usize,
}
