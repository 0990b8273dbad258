pub mod error;
pub mod event;
pub mod service;
pub mod types;

pub use error::{ServiceError, ServiceResult, StatusCode};
pub use event::{GenerateContentResponse, StreamEvent, StreamEventType};
pub use service::{BoxFuture, ChatSessionService, ContentGenerationService, EventStream};
pub use types::{ChatMessage, ChatSession, GenerateContentRequest, Role, SessionPatch};
