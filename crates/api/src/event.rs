use serde::{Deserialize, Serialize};

use crate::types::ChatSession;

/// Wire-level event discriminator for one generation stream.
///
/// Unknown values deserialize to [`StreamEventType::Unspecified`] so newer
/// servers can introduce event kinds without breaking older clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamEventType {
    ModelReady,
    Content,
    SessionUpdated,
    TitleGenerated,
    OutputComplete,
    OutputEnd,
    #[default]
    #[serde(other)]
    Unspecified,
}

/// One frame of a generation stream as the backend emits it.
///
/// All fields are optional on the wire; older servers send untyped frames
/// carrying only `content`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateContentResponse {
    pub event_type: StreamEventType,
    pub content: String,
    pub session: Option<ChatSession>,
}

/// Typed stream event after wire decoding.
///
/// The union is closed: frames that do not match a typed variant's payload
/// shape fold into [`StreamEvent::Legacy`], which is interpreted by field
/// presence alone.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The model accepted the request; may carry the resolved or
    /// newly-created session.
    ModelReady(Option<ChatSession>),
    /// UTF-8 text delta to append to the draft.
    Content(String),
    /// Session bookkeeping update; may repeat within one stream.
    SessionUpdated(ChatSession),
    /// Carries the session with its final generated title.
    TitleGenerated(ChatSession),
    OutputComplete,
    OutputEnd,
    /// Untyped frame from a legacy or newer server.
    Legacy {
        content: Option<String>,
        session: Option<ChatSession>,
    },
}

impl GenerateContentResponse {
    /// Maps a wire frame into the domain union.
    ///
    /// A typed frame missing its required payload degrades to `Legacy` so the
    /// field-presence interpretation still applies.
    pub fn into_event(self) -> StreamEvent {
        match self.event_type {
            StreamEventType::ModelReady => StreamEvent::ModelReady(self.session),
            StreamEventType::Content => StreamEvent::Content(self.content),
            StreamEventType::SessionUpdated => match self.session {
                Some(session) => StreamEvent::SessionUpdated(session),
                None => Self::legacy(self.content, None),
            },
            StreamEventType::TitleGenerated => match self.session {
                Some(session) => StreamEvent::TitleGenerated(session),
                None => Self::legacy(self.content, None),
            },
            StreamEventType::OutputComplete => StreamEvent::OutputComplete,
            StreamEventType::OutputEnd => StreamEvent::OutputEnd,
            StreamEventType::Unspecified => Self::legacy(self.content, self.session),
        }
    }

    fn legacy(content: String, session: Option<ChatSession>) -> StreamEvent {
        let content = if content.is_empty() {
            None
        } else {
            Some(content)
        };
        StreamEvent::Legacy { content, session }
    }
}
