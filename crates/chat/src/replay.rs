use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use futures::StreamExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use scribe_api::{
    BoxFuture, ChatSession, ChatSessionService, ContentGenerationService, EventStream,
    GenerateContentRequest, ServiceError, ServiceResult, SessionPatch, StatusCode, StreamEvent,
};

/// Title given to implicitly-created sessions before one is derived.
pub const DEFAULT_SESSION_TITLE: &str = "New Conversation";

const TITLE_MAX_CHARS: usize = 50;

/// Derives an implicit session title from the first user message, the way the
/// backend does: truncated at 50 characters with an ellipsis.
pub fn derive_session_title(first_user_message: &str) -> String {
    let mut title: String = first_user_message.chars().take(TITLE_MAX_CHARS).collect();
    if first_user_message.chars().count() > TITLE_MAX_CHARS {
        title.push_str("...");
    }
    title
}

/// One scripted reply for a `generate` call.
pub enum GenerationScript {
    /// Fail before any event is produced.
    Refuse(ServiceError),
    /// Yield the steps in order, then end by exhaustion.
    Events(Vec<ServiceResult<StreamEvent>>),
    /// Yield the steps, then stall until the consumer is interrupted.
    EventsThenStall(Vec<ServiceResult<StreamEvent>>),
}

/// Generation service that replays queued scripts, one per call.
///
/// Calls beyond the queue fail with a transport error so an unexpected extra
/// stream shows up as a failure instead of hanging a test.
pub struct ScriptedGeneration {
    scripts: Mutex<VecDeque<GenerationScript>>,
    requests: Mutex<Vec<GenerateContentRequest>>,
}

impl ScriptedGeneration {
    pub fn new() -> Self {
        Self::with_scripts(Vec::new())
    }

    pub fn with_scripts(scripts: Vec<GenerationScript>) -> Self {
        Self {
            scripts: Mutex::new(VecDeque::from(scripts)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn enqueue(&self, script: GenerationScript) {
        self.scripts.lock().await.push_back(script);
    }

    pub async fn remaining(&self) -> usize {
        self.scripts.lock().await.len()
    }

    /// Requests seen so far, in call order.
    pub async fn requests(&self) -> Vec<GenerateContentRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for ScriptedGeneration {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentGenerationService for ScriptedGeneration {
    fn generate<'a>(
        &'a self,
        request: GenerateContentRequest,
    ) -> BoxFuture<'a, ServiceResult<EventStream>> {
        Box::pin(async move {
            self.requests.lock().await.push(request);

            let script = self.scripts.lock().await.pop_front();
            match script {
                None => Err(ServiceError::transport(
                    "replay-generate",
                    "no scripted response remaining",
                )),
                Some(GenerationScript::Refuse(error)) => Err(error),
                Some(GenerationScript::Events(steps)) => {
                    Ok(futures::stream::iter(steps).boxed())
                }
                Some(GenerationScript::EventsThenStall(steps)) => Ok(futures::stream::iter(steps)
                    .chain(futures::stream::pending())
                    .boxed()),
            }
        })
    }
}

/// In-memory session backend playing the server role for tests and QA runs.
pub struct MemorySessions {
    sessions: Mutex<Vec<ChatSession>>,
    clock: AtomicI64,
    list_calls: AtomicUsize,
}

impl MemorySessions {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
            clock: AtomicI64::new(1),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Mints a server-side uid; the client never does this.
    pub fn mint_uid() -> String {
        Uuid::new_v4().to_string()
    }

    /// Inserts or replaces a session, stamping a fresh update time when the
    /// record carries none.
    pub async fn seed(&self, mut session: ChatSession) {
        if session.updated_time == 0 {
            session.updated_time = self.tick();
        }
        if session.created_time == 0 {
            session.created_time = session.updated_time;
        }

        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions.iter_mut().find(|s| s.uid == session.uid) {
            *existing = session;
        } else {
            sessions.push(session);
        }
    }

    pub async fn get(&self, uid: &str) -> Option<ChatSession> {
        self.sessions
            .lock()
            .await
            .iter()
            .find(|session| session.uid == uid)
            .cloned()
    }

    /// Number of `list_sessions` calls observed.
    pub fn list_call_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn tick(&self) -> i64 {
        self.clock.fetch_add(1, Ordering::SeqCst)
    }

    fn not_found(stage: &'static str) -> ServiceError {
        ServiceError::status(stage, StatusCode::NotFound, "chat session not found")
    }
}

impl Default for MemorySessions {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSessionService for MemorySessions {
    fn list_sessions<'a>(&'a self) -> BoxFuture<'a, ServiceResult<Vec<ChatSession>>> {
        Box::pin(async move {
            self.list_calls.fetch_add(1, Ordering::SeqCst);

            let mut summaries: Vec<ChatSession> = self
                .sessions
                .lock()
                .await
                .iter()
                .cloned()
                .map(|mut session| {
                    // List responses omit message histories.
                    session.messages.clear();
                    session
                })
                .collect();
            summaries.sort_by(|a, b| b.updated_time.cmp(&a.updated_time));
            Ok(summaries)
        })
    }

    fn get_session<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, ServiceResult<ChatSession>> {
        Box::pin(async move {
            self.get(uid)
                .await
                .ok_or_else(|| Self::not_found("get-chat-session"))
        })
    }

    fn update_session<'a>(
        &'a self,
        uid: &'a str,
        patch: SessionPatch,
    ) -> BoxFuture<'a, ServiceResult<ChatSession>> {
        Box::pin(async move {
            let mut sessions = self.sessions.lock().await;
            let Some(session) = sessions.iter_mut().find(|session| session.uid == uid) else {
                return Err(Self::not_found("update-chat-session"));
            };

            if let Some(title) = patch.title {
                session.title = title;
            }
            session.updated_time = self.clock.fetch_add(1, Ordering::SeqCst);
            Ok(session.clone())
        })
    }

    fn delete_session<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, ServiceResult<()>> {
        Box::pin(async move {
            let mut sessions = self.sessions.lock().await;
            let before = sessions.len();
            sessions.retain(|session| session.uid != uid);

            if sessions.len() == before {
                return Err(Self::not_found("delete-chat-session"));
            }
            Ok(())
        })
    }
}
