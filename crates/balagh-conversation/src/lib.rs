//! Conversation-to-report intake.
//!
//! A session's turns live in a [`store::ConversationStore`]; each chat message
//! runs through [`pipeline::ChatPipeline`], which asks the assistant, records
//! the exchange, and hands a finished report to a [`sink::ReportSink`].

pub mod assistant;
pub mod dates;
pub mod extractor;
pub mod gemini;
pub mod pipeline;
pub mod prompt;
pub mod sink;
pub mod store;
