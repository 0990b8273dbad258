use serde::{Deserialize, Serialize};

/// Workspace-level AI model configuration.
///
/// Opaque to the chat controller; the backend consumes it when opening
/// generation streams. The local file and env overlay use snake_case keys;
/// aliases accept the wire's camelCase spellings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiModelSetting {
    pub model: String,
    #[serde(alias = "apiKey")]
    pub api_key: String,
    #[serde(alias = "baseUrl")]
    pub base_url: String,
}

impl AiModelSetting {
    pub fn new(
        model: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// All three fields are required before the backend will serve streams.
    pub fn is_complete(&self) -> bool {
        !self.model.trim().is_empty()
            && !self.api_key.trim().is_empty()
            && !self.base_url.trim().is_empty()
    }

    pub fn normalized(mut self) -> Self {
        self.model = self.model.trim().to_string();
        self.api_key = self.api_key.trim().to_string();
        self.base_url = self.base_url.trim().to_string();
        self
    }
}
