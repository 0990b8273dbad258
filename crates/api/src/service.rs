use std::future::Future;
use std::pin::Pin;

use futures::Stream;

use crate::error::ServiceResult;
use crate::event::StreamEvent;
use crate::types::{ChatSession, GenerateContentRequest, SessionPatch};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Pull-driven sequence of events for one generation request.
///
/// The stream is unbounded and ends by exhaustion after the terminal markers;
/// transport or server failure mid-stream surfaces as an `Err` item.
pub type EventStream = Pin<Box<dyn Stream<Item = ServiceResult<StreamEvent>> + Send>>;

/// Session bookkeeping operations on the backend.
pub trait ChatSessionService: Send + Sync {
    /// Lists session summaries; message histories may be omitted.
    fn list_sessions<'a>(&'a self) -> BoxFuture<'a, ServiceResult<Vec<ChatSession>>>;

    /// Fetches one full session, including its message history.
    ///
    /// Fails with `NotFound` when the uid is unknown.
    fn get_session<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, ServiceResult<ChatSession>>;

    fn update_session<'a>(
        &'a self,
        uid: &'a str,
        patch: SessionPatch,
    ) -> BoxFuture<'a, ServiceResult<ChatSession>>;

    fn delete_session<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, ServiceResult<()>>;
}

/// Streaming generation against the backend.
pub trait ContentGenerationService: Send + Sync {
    /// Opens one generation stream for the given message history.
    ///
    /// Fails before yielding any event for authentication, credential, rate
    /// limit, quota, and configuration problems; an opened stream may still
    /// fail mid-flight through its items.
    fn generate<'a>(
        &'a self,
        request: GenerateContentRequest,
    ) -> BoxFuture<'a, ServiceResult<EventStream>>;
}
