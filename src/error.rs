//! Error types for session operations

/// Session-specific error type
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Token refresh rejected: {0}")]
    RefreshRejected(String),

    #[error("Profile load failed: {0}")]
    ProfileLoad(String),

    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Token claims error: {0}")]
    Token(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "reqwest-client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// Whether this error means the client configuration itself is unusable
    pub fn is_config(&self) -> bool {
        matches!(self, SessionError::Config(_))
    }

    /// HTTP status the transport layer would report for this error
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            SessionError::NotAuthenticated | SessionError::RefreshRejected(_) => StatusCode::UNAUTHORIZED,
            SessionError::Token(_) => StatusCode::UNAUTHORIZED,
            SessionError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
