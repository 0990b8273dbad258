use std::fmt;

use snafu::Snafu;

/// Backend status codes as the RPC layer surfaces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Unauthenticated,
    PermissionDenied,
    NotFound,
    InvalidArgument,
    FailedPrecondition,
    ResourceExhausted,
    Internal,
}

impl StatusCode {
    /// Canonical lowercase rendering, matching how the transport stringifies
    /// statuses. Error classification downstream matches on these phrases.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::PermissionDenied => "permission denied",
            Self::NotFound => "not found",
            Self::InvalidArgument => "invalid argument",
            Self::FailedPrecondition => "failed precondition",
            Self::ResourceExhausted => "resource exhausted",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ServiceError {
    #[snafu(display("rpc failed with {code} on `{stage}`: {message}"))]
    Status {
        stage: &'static str,
        code: StatusCode,
        message: String,
    },
    #[snafu(display("transport failed on `{stage}`: {message}"))]
    Transport {
        stage: &'static str,
        message: String,
    },
    #[snafu(display("failed to decode stream payload on `{stage}`: {source}"))]
    Decode {
        stage: &'static str,
        source: serde_json::Error,
    },
}

impl ServiceError {
    pub fn status(
        stage: &'static str,
        code: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self::Status {
            stage,
            code,
            message: message.into(),
        }
    }

    pub fn transport(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            stage,
            message: message.into(),
        }
    }

    /// Returns the backend status code, if this error carries one.
    pub fn code(&self) -> Option<StatusCode> {
        match self {
            Self::Status { code, .. } => Some(*code),
            Self::Transport { .. } | Self::Decode { .. } => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some(StatusCode::NotFound)
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
