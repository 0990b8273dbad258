/// Streaming chat orchestration: send, fold, converge, recover.
pub mod controller;
/// User-facing error taxonomy and notices.
pub mod failure;
/// In-memory replay backend for tests and the QA runner.
pub mod replay;
/// Conversation state and the stream event reducer.
pub mod state;

pub use controller::{ChatController, InterruptHandle};
pub use failure::{ChatFailure, Notice, NoticeSeverity};
pub use replay::{
    DEFAULT_SESSION_TITLE, GenerationScript, MemorySessions, ScriptedGeneration,
    derive_session_title,
};
pub use state::{ConversationState, StreamTurn};
