use scribe_api::ServiceError;

/// User-facing category for a failed chat operation.
///
/// Classification matches substrings of the rendered error, deliberately
/// loose because the transport does not carry a structured code to the client
/// in all cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatFailure {
    SignInRequired,
    InvalidCredential,
    RateLimited,
    QuotaExceeded,
    ConfigIncomplete,
    ConfigAbsent,
    Unclassified(String),
}

impl ChatFailure {
    pub fn classify(error: &ServiceError) -> Self {
        Self::classify_message(&error.to_string())
    }

    /// Earlier phrases win; the order is load-bearing. "failed precondition"
    /// maps to `ConfigIncomplete` before the config-absent phrases are
    /// consulted, so a config-absent status rendered with its code name still
    /// classifies as incomplete.
    pub fn classify_message(raw: &str) -> Self {
        let message = raw.to_lowercase();

        if message.contains("please sign in to use ai features") {
            Self::SignInRequired
        } else if message.contains("invalid api key") || message.contains("unauthenticated") {
            Self::InvalidCredential
        } else if message.contains("rate limit") || message.contains("resource exhausted") {
            Self::RateLimited
        } else if message.contains("quota") || message.contains("billing") {
            Self::QuotaExceeded
        } else if message.contains("ai configuration incomplete")
            || message.contains("failed precondition")
        {
            Self::ConfigIncomplete
        } else if message.contains("ai configuration is not set up")
            || message.contains("contact your administrator")
        {
            Self::ConfigAbsent
        } else {
            Self::Unclassified(raw.to_string())
        }
    }

    /// Notification text shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::SignInRequired => "Please sign in to use AI features.".to_string(),
            Self::InvalidCredential => {
                "Invalid API key. Please check the API key in workspace settings.".to_string()
            }
            Self::RateLimited => "Rate limit exceeded. Please try again later.".to_string(),
            Self::QuotaExceeded => {
                "API quota exceeded. Please check your provider account.".to_string()
            }
            Self::ConfigIncomplete => {
                "AI configuration is incomplete. Please review workspace settings.".to_string()
            }
            Self::ConfigAbsent => {
                "AI is not configured. Please contact your administrator.".to_string()
            }
            Self::Unclassified(message) => message.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeSeverity {
    Info,
    Error,
}

/// One user-facing notification queued by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: NoticeSeverity,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: NoticeSeverity::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: NoticeSeverity::Error,
            message: message.into(),
        }
    }
}
