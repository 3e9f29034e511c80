use thiserror::Error;

/// Error outputs from `SessionKit`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionKitError {
    /// Required configuration is missing or invalid.
    #[error("not_configured: {0}")]
    NotConfigured(String),
    /// The smart-account deployment transaction did not succeed.
    #[error("deployment_failed: {0}")]
    DeploymentFailed(String),
    /// The owner declined a signature request.
    #[error("user_rejected_signature")]
    UserRejectedSignature,
    /// Network connection error with details.
    #[error("network_error: {error} (url: {url}, status: {status:?})")]
    NetworkError {
        /// URL of the failed request.
        url: String,
        /// HTTP status code, when a response was received.
        status: Option<u16>,
        /// Human-readable failure detail.
        error: String,
    },
    /// The session key's validity window has elapsed.
    #[error("session_key_expired")]
    SessionKeyExpired,
    /// The session key has not been approved by the owner.
    #[error("session_key_not_approved")]
    SessionKeyNotApproved,
    /// The session key material is malformed or does not match its account.
    #[error("invalid_session_key: {0}")]
    InvalidSessionKey(String),
    /// Unexpected error serializing information.
    #[error("serialization_error: {0}")]
    Serialization(String),
    /// Any other unexpected failure.
    #[error("unknown_error: {error}")]
    Generic {
        /// Human-readable failure detail.
        error: String,
    },
}

impl From<reqwest::Error> for SessionKitError {
    fn from(err: reqwest::Error) -> Self {
        Self::NetworkError {
            url: err
                .url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            status: err.status().map(|s| s.as_u16()),
            error: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SessionKitError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
