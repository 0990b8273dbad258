use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;

use scribe_api::{
    ChatMessage, ChatSession, ChatSessionService, ContentGenerationService,
    GenerateContentRequest, ServiceError, SessionPatch,
};

use crate::failure::{ChatFailure, Notice};
use crate::state::{ConversationState, StreamTurn};

const INTERRUPT_CHANNEL_CAPACITY: usize = 4;

/// Cloneable handle that asks the controller to stop the in-flight stream.
///
/// Tie one to the panel's lifecycle so teardown and a "stop generating"
/// action can signal the stream closed instead of merely ignoring it.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    sender: mpsc::Sender<()>,
}

impl InterruptHandle {
    /// Signals the active stream to stop. Queued signals sent while no
    /// stream is active are discarded at the next stream start.
    pub fn interrupt(&self) -> bool {
        self.sender.try_send(()).is_ok()
    }
}

enum TurnEnd {
    Completed,
    Interrupted,
    Failed(ServiceError),
}

/// Orchestrates one conversation panel: optimistic send, stream folding,
/// convergence, and error recovery.
///
/// All operations take `&mut self`, so nothing can overlap against the same
/// conversation state; `is_streaming` additionally gates the send action the
/// way the input widget disables its button.
pub struct ChatController {
    sessions: Arc<dyn ChatSessionService>,
    generation: Arc<dyn ContentGenerationService>,
    state: ConversationState,
    session_list: Vec<ChatSession>,
    pending_delete: Option<String>,
    notices: Vec<Notice>,
    interrupt_tx: mpsc::Sender<()>,
    interrupt_rx: mpsc::Receiver<()>,
}

impl ChatController {
    pub fn new(
        sessions: Arc<dyn ChatSessionService>,
        generation: Arc<dyn ContentGenerationService>,
    ) -> Self {
        let (interrupt_tx, interrupt_rx) = mpsc::channel(INTERRUPT_CHANNEL_CAPACITY);
        Self {
            sessions,
            generation,
            state: ConversationState::new(),
            session_list: Vec::new(),
            pending_delete: None,
            notices: Vec::new(),
            interrupt_tx,
            interrupt_rx,
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Cached session summaries from the last list refresh.
    pub fn session_list(&self) -> &[ChatSession] {
        &self.session_list
    }

    pub fn pending_delete(&self) -> Option<&str> {
        self.pending_delete.as_deref()
    }

    /// Drains queued user-facing notifications.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            sender: self.interrupt_tx.clone(),
        }
    }

    /// Sends one user message and consumes the resulting event stream.
    ///
    /// Blank input or an already-active stream is a silent no-op. The user
    /// message is appended optimistically and rolled back if the stream fails;
    /// accumulated content becomes the assistant message on completion.
    pub async fn send_message(&mut self, content: &str) {
        let trimmed = content.trim();
        if trimmed.is_empty() || self.state.is_streaming {
            return;
        }

        self.state.messages.push(ChatMessage::user(trimmed));
        self.state.is_streaming = true;
        self.state.streaming_content.clear();

        // Snapshot before any stream-driven mutation so a session bound during
        // this stream is never read back into its own request.
        let session_to_use = self.state.current_session.clone();
        let request = GenerateContentRequest {
            messages: self.state.messages.clone(),
            session_uid: session_to_use
                .as_ref()
                .map(|session| session.uid.clone())
                .unwrap_or_default(),
        };

        self.drain_stale_interrupts();

        let mut turn = StreamTurn::new();
        let end = self.run_stream(request, &mut turn).await;

        match end {
            TurnEnd::Completed => {
                let content = std::mem::take(&mut self.state.streaming_content);
                if !content.is_empty() {
                    self.state.messages.push(ChatMessage::assistant(content));
                }
                if session_to_use.is_some() || turn.session_involved() {
                    // One refresh per stream, however many session events arrived.
                    self.refresh_sessions().await;
                }
            }
            TurnEnd::Interrupted => {
                let content = std::mem::take(&mut self.state.streaming_content);
                if content.is_empty() {
                    // Nothing arrived; roll back like a failure, minus the error.
                    self.state.messages.pop();
                } else {
                    self.state.messages.push(ChatMessage::assistant(content));
                    if session_to_use.is_some() || turn.session_involved() {
                        self.refresh_sessions().await;
                    }
                }
                tracing::debug!("generation stream interrupted by user");
                self.notices.push(Notice::info("Generation stopped."));
            }
            TurnEnd::Failed(error) => {
                self.state.messages.pop();
                let failure = ChatFailure::classify(&error);
                tracing::error!(error = %error, "generation stream failed");
                self.notices.push(Notice::error(failure.user_message()));
            }
        }

        self.state.is_streaming = false;
        self.state.streaming_content.clear();
    }

    async fn run_stream(
        &mut self,
        request: GenerateContentRequest,
        turn: &mut StreamTurn,
    ) -> TurnEnd {
        let mut events = match self.generation.generate(request).await {
            Ok(events) => events,
            Err(error) => return TurnEnd::Failed(error),
        };

        loop {
            tokio::select! {
                biased;
                _ = self.interrupt_rx.recv() => return TurnEnd::Interrupted,
                next = events.next() => match next {
                    Some(Ok(event)) => turn.fold(event, &mut self.state),
                    Some(Err(error)) => return TurnEnd::Failed(error),
                    None => return TurnEnd::Completed,
                },
            }
        }
    }

    fn drain_stale_interrupts(&mut self) {
        while self.interrupt_rx.try_recv().is_ok() {}
    }

    /// Replaces the active conversation with the server's authoritative
    /// record. A failed fetch leaves the prior state intact.
    pub async fn select_session(&mut self, uid: &str) {
        match self.sessions.get_session(uid).await {
            Ok(session) => {
                self.state.messages = session.messages.clone();
                self.state.current_session = Some(session);
            }
            Err(error) => {
                tracing::warn!(uid = %uid, error = %error, "failed to load session");
                self.notices.push(Notice::error("Failed to load chat messages."));
            }
        }
    }

    /// Clears the active conversation without contacting the backend; the
    /// server creates a session lazily on the first successful exchange.
    pub fn start_new_session(&mut self) {
        self.state.clear_conversation();
    }

    /// Marks a session for deletion pending confirmation.
    pub fn request_delete(&mut self, uid: impl Into<String>) {
        self.pending_delete = Some(uid.into());
    }

    /// Clears the pending delete target without side effects.
    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Performs the pending delete, refreshes the list, and clears the
    /// conversation if the deleted session was active. The pending target is
    /// cleared on every path.
    pub async fn confirm_delete(&mut self) {
        let Some(uid) = self.pending_delete.take() else {
            return;
        };

        match self.sessions.delete_session(&uid).await {
            Ok(()) => {
                self.refresh_sessions().await;
                if self.state.active_session_uid() == Some(uid.as_str()) {
                    self.state.clear_conversation();
                }
            }
            Err(error) => {
                tracing::warn!(uid = %uid, error = %error, "failed to delete session");
                self.notices
                    .push(Notice::error("Failed to delete conversation."));
            }
        }
    }

    /// Retitles a session and refreshes the list.
    pub async fn rename_session(&mut self, uid: &str, title: &str) {
        let patch = SessionPatch {
            title: Some(title.to_string()),
        };
        match self.sessions.update_session(uid, patch).await {
            Ok(_) => self.refresh_sessions().await,
            Err(error) => {
                tracing::warn!(uid = %uid, error = %error, "failed to update session");
                self.notices
                    .push(Notice::error("Failed to update conversation."));
            }
        }
    }

    /// Replaces the cached session list with the server's.
    pub async fn refresh_sessions(&mut self) {
        match self.sessions.list_sessions().await {
            Ok(sessions) => self.session_list = sessions,
            Err(error) => {
                tracing::warn!(error = %error, "failed to refresh session list");
                self.notices
                    .push(Notice::error("Failed to load chat history."));
            }
        }
    }

    /// Initial list load; auto-selects the first session when none is active.
    pub async fn load_initial_sessions(&mut self) {
        match self.sessions.list_sessions().await {
            Ok(sessions) => {
                let first_uid = sessions.first().map(|session| session.uid.clone());
                self.session_list = sessions;
                if self.state.current_session.is_none()
                    && let Some(uid) = first_uid
                {
                    self.select_session(&uid).await;
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, "failed to load initial session list");
                self.notices
                    .push(Notice::error("Failed to load chat history."));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::failure::NoticeSeverity;
    use crate::replay::{GenerationScript, MemorySessions, ScriptedGeneration};
    use scribe_api::{Role, StatusCode, StreamEvent};

    fn session(uid: &str, title: &str) -> ChatSession {
        ChatSession::new(uid, title)
    }

    fn completed(events: Vec<StreamEvent>) -> GenerationScript {
        let mut steps: Vec<_> = events.into_iter().map(Ok).collect();
        steps.push(Ok(StreamEvent::OutputComplete));
        steps.push(Ok(StreamEvent::OutputEnd));
        GenerationScript::Events(steps)
    }

    struct Harness {
        controller: ChatController,
        sessions: Arc<MemorySessions>,
        generation: Arc<ScriptedGeneration>,
    }

    fn harness(scripts: Vec<GenerationScript>) -> Harness {
        let sessions = Arc::new(MemorySessions::new());
        let generation = Arc::new(ScriptedGeneration::with_scripts(scripts));
        let controller = ChatController::new(sessions.clone(), generation.clone());
        Harness {
            controller,
            sessions,
            generation,
        }
    }

    #[tokio::test]
    async fn blank_input_is_a_silent_noop() {
        let mut h = harness(vec![completed(vec![StreamEvent::Content("x".into())])]);

        h.controller.send_message("").await;
        h.controller.send_message("   ").await;

        assert!(h.controller.state().messages.is_empty());
        assert!(!h.controller.state().is_streaming);
        assert!(h.controller.take_notices().is_empty());
        assert_eq!(h.generation.remaining().await, 1);
    }

    #[tokio::test]
    async fn send_while_streaming_is_a_silent_noop() {
        let mut h = harness(vec![completed(vec![])]);
        h.controller.state.is_streaming = true;

        h.controller.send_message("hello").await;

        assert!(h.controller.state.messages.is_empty());
        assert_eq!(h.generation.remaining().await, 1);
    }

    #[tokio::test]
    async fn roundtrip_appends_exactly_one_assistant_message() {
        let mut h = harness(vec![completed(vec![
            StreamEvent::ModelReady(Some(session("s-1", "New Conversation"))),
            StreamEvent::Content("Hel".into()),
            StreamEvent::Content("lo".into()),
            StreamEvent::SessionUpdated(session("s-1", "Hi there")),
        ])]);
        h.sessions.seed(session("s-1", "Hi there")).await;

        h.controller.send_message("  hi there  ").await;

        let messages = &h.controller.state().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hi there");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Hello");
        assert!(!h.controller.state().is_streaming);
        assert!(h.controller.state().streaming_content.is_empty());
        // Session-bearing events arrived, so the list refreshed exactly once.
        assert_eq!(h.sessions.list_call_count(), 1);
        assert_eq!(h.controller.session_list().len(), 1);
    }

    #[tokio::test]
    async fn first_session_wins_through_the_controller() {
        let mut h = harness(vec![completed(vec![
            StreamEvent::ModelReady(Some(session("a", "A"))),
            StreamEvent::SessionUpdated(session("a", "A")),
            StreamEvent::SessionUpdated(session("b", "B")),
            StreamEvent::Content("ok".into()),
        ])]);

        h.controller.send_message("hi").await;

        assert_eq!(h.controller.state().active_session_uid(), Some("a"));
    }

    #[tokio::test]
    async fn title_generated_is_authoritative() {
        let mut h = harness(vec![completed(vec![
            StreamEvent::ModelReady(Some(session("a", ""))),
            StreamEvent::Content("ok".into()),
            StreamEvent::TitleGenerated(session("b", "Final title")),
        ])]);

        h.controller.send_message("hi").await;

        let current = h.controller.state().current_session.as_ref();
        assert_eq!(current.map(|s| s.uid.as_str()), Some("b"));
        assert_eq!(current.map(|s| s.title.as_str()), Some("Final title"));
    }

    #[tokio::test]
    async fn failure_rolls_back_the_optimistic_message() {
        let mut h = harness(vec![
            completed(vec![StreamEvent::Content("earlier".into())]),
            GenerationScript::Refuse(ServiceError::status(
                "generate",
                StatusCode::Unauthenticated,
                "Please sign in to use AI features",
            )),
        ]);

        h.controller.send_message("first").await;
        let before = h.controller.state().messages.clone();
        assert_eq!(before.len(), 2);

        h.controller.send_message("second").await;

        assert_eq!(h.controller.state().messages, before);
        assert!(!h.controller.state().is_streaming);
        assert!(h.controller.state().streaming_content.is_empty());

        let notices = h.controller.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].severity, NoticeSeverity::Error);
        assert_eq!(notices[0].message, "Please sign in to use AI features.");
    }

    #[tokio::test]
    async fn mid_stream_failure_discards_partial_content() {
        let mut h = harness(vec![GenerationScript::Events(vec![
            Ok(StreamEvent::Content("par".into())),
            Err(ServiceError::transport("stream-chunk", "connection reset")),
        ])]);

        h.controller.send_message("hi").await;

        // Baseline policy: partial content is dropped along with the
        // optimistic user message.
        assert!(h.controller.state().messages.is_empty());
        assert!(h.controller.state().streaming_content.is_empty());
        let notices = h.controller.take_notices();
        assert_eq!(notices[0].severity, NoticeSeverity::Error);
    }

    #[tokio::test]
    async fn streams_reset_and_reaccept_after_failure() {
        let mut h = harness(vec![
            GenerationScript::Refuse(ServiceError::transport("generate", "offline")),
            completed(vec![StreamEvent::Content("back".into())]),
        ]);

        h.controller.send_message("one").await;
        assert!(!h.controller.state().is_streaming);
        assert!(h.controller.state().streaming_content.is_empty());

        h.controller.send_message("two").await;

        let messages = &h.controller.state().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "back");
    }

    #[tokio::test]
    async fn session_uid_snapshot_is_taken_before_the_stream() {
        let mut h = harness(vec![
            completed(vec![StreamEvent::SessionUpdated(session("s-1", "T"))]),
            completed(vec![StreamEvent::Content("again".into())]),
        ]);

        h.controller.send_message("first").await;
        h.controller.send_message("second").await;

        let requests = h.generation.requests().await;
        assert_eq!(requests.len(), 2);
        // The first stream bound s-1 mid-flight; its own request predates that.
        assert_eq!(requests[0].session_uid, "");
        assert_eq!(requests[1].session_uid, "s-1");
    }

    #[tokio::test]
    async fn select_session_replaces_local_state() {
        let mut h = harness(vec![]);
        let mut full = session("s-9", "Notes");
        full.messages = vec![
            ChatMessage::user("question"),
            ChatMessage::assistant("answer"),
        ];
        h.sessions.seed(full.clone()).await;
        h.controller.state.messages = vec![ChatMessage::user("unrelated draft")];

        h.controller.select_session("s-9").await;

        assert_eq!(h.controller.state().messages, full.messages);
        assert_eq!(h.controller.state().active_session_uid(), Some("s-9"));
    }

    #[tokio::test]
    async fn failed_select_leaves_prior_state_intact() {
        let mut h = harness(vec![]);
        h.controller.state.current_session = Some(session("s-1", "Kept"));
        h.controller.state.messages = vec![ChatMessage::user("kept")];

        h.controller.select_session("missing").await;

        assert_eq!(h.controller.state().active_session_uid(), Some("s-1"));
        assert_eq!(h.controller.state().messages.len(), 1);
        let notices = h.controller.take_notices();
        assert_eq!(notices[0].message, "Failed to load chat messages.");
    }

    #[tokio::test]
    async fn interrupt_keeps_partial_content() {
        let mut h = harness(vec![GenerationScript::EventsThenStall(vec![
            Ok(StreamEvent::SessionUpdated(session("s-1", "T"))),
            Ok(StreamEvent::Content("partial answer".into())),
        ])]);
        let handle = h.controller.interrupt_handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.interrupt();
        });

        h.controller.send_message("hi").await;

        let messages = &h.controller.state().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "partial answer");
        assert!(!h.controller.state().is_streaming);
        let notices = h.controller.take_notices();
        assert_eq!(notices[0].severity, NoticeSeverity::Info);
    }

    #[tokio::test]
    async fn interrupt_before_content_rolls_back() {
        let mut h = harness(vec![GenerationScript::EventsThenStall(vec![])]);
        let handle = h.controller.interrupt_handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.interrupt();
        });

        h.controller.send_message("hi").await;

        assert!(h.controller.state().messages.is_empty());
        assert!(!h.controller.state().is_streaming);
    }

    #[tokio::test]
    async fn idle_interrupts_do_not_kill_the_next_stream() {
        let mut h = harness(vec![completed(vec![StreamEvent::Content("fine".into())])]);
        let handle = h.controller.interrupt_handle();
        handle.interrupt();

        h.controller.send_message("hi").await;

        let messages = &h.controller.state().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "fine");
    }

    #[tokio::test]
    async fn delete_is_two_phase_and_clears_active_conversation() {
        let mut h = harness(vec![]);
        h.sessions.seed(session("s-1", "Doomed")).await;
        h.controller.state.current_session = Some(session("s-1", "Doomed"));
        h.controller.state.messages = vec![ChatMessage::user("hi")];

        h.controller.request_delete("s-1");
        assert_eq!(h.controller.pending_delete(), Some("s-1"));
        // No backend call happened yet.
        assert_eq!(h.sessions.list_call_count(), 0);

        h.controller.confirm_delete().await;

        assert_eq!(h.controller.pending_delete(), None);
        assert!(h.controller.state().current_session.is_none());
        assert!(h.controller.state().messages.is_empty());
        assert!(h.controller.session_list().is_empty());
    }

    #[tokio::test]
    async fn cancel_delete_has_no_side_effects() {
        let mut h = harness(vec![]);
        h.sessions.seed(session("s-1", "Kept")).await;

        h.controller.request_delete("s-1");
        h.controller.cancel_delete();
        h.controller.confirm_delete().await;

        assert_eq!(h.controller.pending_delete(), None);
        assert!(h.sessions.get("s-1").await.is_some());
    }

    #[tokio::test]
    async fn deleting_an_inactive_session_keeps_the_conversation() {
        let mut h = harness(vec![]);
        h.sessions.seed(session("s-1", "Doomed")).await;
        h.sessions.seed(session("s-2", "Active")).await;
        h.controller.state.current_session = Some(session("s-2", "Active"));

        h.controller.request_delete("s-1");
        h.controller.confirm_delete().await;

        assert_eq!(h.controller.state().active_session_uid(), Some("s-2"));
        assert_eq!(h.controller.session_list().len(), 1);
    }

    #[tokio::test]
    async fn rename_updates_title_and_refreshes() {
        let mut h = harness(vec![]);
        h.sessions.seed(session("s-1", "Old")).await;

        h.controller.rename_session("s-1", "New title").await;

        assert_eq!(h.controller.session_list()[0].title, "New title");
        assert!(h.controller.take_notices().is_empty());
    }

    #[tokio::test]
    async fn initial_load_selects_the_first_session() {
        let mut h = harness(vec![]);
        let mut full = session("s-1", "Latest");
        full.messages = vec![ChatMessage::user("hello")];
        h.sessions.seed(full).await;

        h.controller.load_initial_sessions().await;

        assert_eq!(h.controller.state().active_session_uid(), Some("s-1"));
        assert_eq!(h.controller.state().messages.len(), 1);
    }

    #[tokio::test]
    async fn initial_load_with_empty_list_selects_nothing() {
        let mut h = harness(vec![]);

        h.controller.load_initial_sessions().await;

        assert!(h.controller.state().current_session.is_none());
        assert!(h.controller.session_list().is_empty());
        assert!(h.controller.take_notices().is_empty());
    }

    #[tokio::test]
    async fn start_new_session_is_purely_local() {
        let mut h = harness(vec![]);
        h.controller.state.current_session = Some(session("s-1", "T"));
        h.controller.state.messages = vec![ChatMessage::user("hi")];

        h.controller.start_new_session();

        assert!(h.controller.state().current_session.is_none());
        assert!(h.controller.state().messages.is_empty());
        assert_eq!(h.sessions.list_call_count(), 0);
    }

    #[tokio::test]
    async fn completion_without_session_skips_the_refresh() {
        let mut h = harness(vec![completed(vec![StreamEvent::Content("ok".into())])]);

        h.controller.send_message("hi").await;

        assert_eq!(h.sessions.list_call_count(), 0);
    }
}
