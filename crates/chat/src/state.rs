use scribe_api::{ChatMessage, ChatSession, StreamEvent};

/// Ephemeral client-side conversation state, rebuilt on session switch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    pub current_session: Option<ChatSession>,
    pub messages: Vec<ChatMessage>,
    /// Mutual-exclusion flag for the send action.
    pub is_streaming: bool,
    /// Draft accumulator; append-only within a stream, reset to empty exactly
    /// at stream start and stream end.
    pub streaming_content: String,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the active session and its local history.
    pub fn clear_conversation(&mut self) {
        self.current_session = None;
        self.messages.clear();
    }

    pub fn active_session_uid(&self) -> Option<&str> {
        self.current_session.as_ref().map(|session| session.uid.as_str())
    }
}

/// Per-stream bookkeeping, fresh for every send.
///
/// Session assignment pins on the first session-bearing event of a stream;
/// only `TitleGenerated` (and legacy session payloads) override an existing
/// pin. Keeping the flags here, not on `ConversationState`, guarantees a late
/// event from a previous stream can never be read as current.
#[derive(Debug, Default)]
pub struct StreamTurn {
    session_pinned: bool,
    latest_session: Option<ChatSession>,
}

impl StreamTurn {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once any session-bearing event arrived; decides the post-stream
    /// session-list refresh.
    pub fn session_involved(&self) -> bool {
        self.latest_session.is_some()
    }

    /// Latest session payload seen, regardless of pinning.
    pub fn latest_session(&self) -> Option<&ChatSession> {
        self.latest_session.as_ref()
    }

    /// Applies one stream event in arrival order.
    ///
    /// Correct under absence, duplication, and reordering of any event type;
    /// markers carry no state effect.
    pub fn fold(&mut self, event: StreamEvent, state: &mut ConversationState) {
        match event {
            StreamEvent::ModelReady(Some(session)) => self.assign_first(session, state),
            StreamEvent::ModelReady(None) => {}
            StreamEvent::Content(delta) => state.streaming_content.push_str(&delta),
            StreamEvent::SessionUpdated(session) => self.assign_first(session, state),
            StreamEvent::TitleGenerated(session) => self.assign_authoritative(session, state),
            StreamEvent::OutputComplete | StreamEvent::OutputEnd => {}
            StreamEvent::Legacy { content, session } => {
                if let Some(delta) = content {
                    state.streaming_content.push_str(&delta);
                }
                if let Some(session) = session {
                    // Untyped servers repeat the full session per frame; the
                    // last one carries the freshest title, so it always wins.
                    self.assign_authoritative(session, state);
                }
            }
        }
    }

    fn assign_first(&mut self, session: ChatSession, state: &mut ConversationState) {
        if self.session_pinned {
            self.latest_session = Some(session);
            return;
        }
        self.latest_session = Some(session.clone());
        state.current_session = Some(session);
        self.session_pinned = true;
    }

    fn assign_authoritative(&mut self, session: ChatSession, state: &mut ConversationState) {
        self.latest_session = Some(session.clone());
        state.current_session = Some(session);
        self.session_pinned = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(uid: &str) -> ChatSession {
        ChatSession::new(uid, format!("Session {uid}"))
    }

    fn fold_all(events: Vec<StreamEvent>) -> (ConversationState, StreamTurn) {
        let mut state = ConversationState::new();
        let mut turn = StreamTurn::new();
        for event in events {
            turn.fold(event, &mut state);
        }
        (state, turn)
    }

    #[test]
    fn first_session_wins_for_non_title_events() {
        let (state, turn) = fold_all(vec![
            StreamEvent::ModelReady(Some(session("a"))),
            StreamEvent::SessionUpdated(session("a")),
            StreamEvent::SessionUpdated(session("b")),
        ]);

        assert_eq!(state.active_session_uid(), Some("a"));
        // The duplicate is still tracked for refresh bookkeeping.
        assert_eq!(turn.latest_session().map(|s| s.uid.as_str()), Some("b"));
    }

    #[test]
    fn title_generated_overrides_pinned_session() {
        let (state, _) = fold_all(vec![
            StreamEvent::ModelReady(Some(session("a"))),
            StreamEvent::TitleGenerated(session("b")),
        ]);

        assert_eq!(state.active_session_uid(), Some("b"));
    }

    #[test]
    fn content_deltas_accumulate_in_order() {
        let mut state = ConversationState::new();
        let mut turn = StreamTurn::new();

        turn.fold(StreamEvent::Content("Hel".to_string()), &mut state);
        assert_eq!(state.streaming_content, "Hel");

        turn.fold(StreamEvent::Content("lo".to_string()), &mut state);
        assert_eq!(state.streaming_content, "Hello");
    }

    #[test]
    fn markers_and_empty_model_ready_have_no_effect() {
        let (state, turn) = fold_all(vec![
            StreamEvent::ModelReady(None),
            StreamEvent::OutputComplete,
            StreamEvent::OutputEnd,
        ]);

        assert_eq!(state, ConversationState::new());
        assert!(!turn.session_involved());
    }

    #[test]
    fn legacy_payloads_fold_by_field_presence() {
        let (state, _) = fold_all(vec![
            StreamEvent::ModelReady(Some(session("a"))),
            StreamEvent::Legacy {
                content: Some("hi".to_string()),
                session: Some(session("b")),
            },
        ]);

        assert_eq!(state.streaming_content, "hi");
        // Legacy session payloads assign unconditionally, like title events.
        assert_eq!(state.active_session_uid(), Some("b"));
    }

    #[test]
    fn session_updated_pins_when_nothing_assigned_yet() {
        let (state, turn) = fold_all(vec![StreamEvent::SessionUpdated(session("a"))]);

        assert_eq!(state.active_session_uid(), Some("a"));
        assert!(turn.session_involved());
    }
}
