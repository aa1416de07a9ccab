//! Authentication error types.

use crate::transport::TransportError;
use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Credentials rejected (401/403). The message is the server's.
    #[error("{0}")]
    Authentication(String),

    /// Refresh failed; both tokens have been cleared
    #[error("Session expired")]
    SessionExpired,

    /// Tokens were refreshed but the in-flight request was dropped.
    /// The caller must re-issue it after re-authenticating the view.
    #[error("Request abandoned after token refresh")]
    RequestAbandoned,

    /// No response from the server
    #[error("Network error: {0}")]
    Network(#[from] TransportError),

    /// Payload rejected by the server (400/409/422)
    #[error("{0}")]
    Validation(String),

    /// Any other non-2xx response
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Operation requires an authenticated session
    #[error("Not logged in")]
    NotLoggedIn,

    /// Invalid state transition in the session FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] credential_storage::StorageError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<client_config_and_utils::CoreError> for AuthError {
    fn from(e: client_config_and_utils::CoreError) -> Self {
        AuthError::Config(e.to_string())
    }
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Network(_) => true,
            AuthError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether the server reported an unknown or expired guest session.
    pub fn is_session_not_found(&self) -> bool {
        let mentions_missing_session =
            |message: &str| message.to_ascii_lowercase().contains("session not found");

        match self {
            AuthError::Api {
                status,
                code,
                message,
            } => {
                *status == 404
                    || code.as_deref() == Some("SESSION_NOT_FOUND")
                    || mentions_missing_session(message)
            }
            AuthError::Validation(message) => mentions_missing_session(message),
            _ => false,
        }
    }

    /// Text suitable for showing to the user.
    ///
    /// Server messages for rejected credentials and payloads are passed
    /// through verbatim; transport failures get a generic retry hint.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Authentication(message) | AuthError::Validation(message) => message.clone(),
            AuthError::Network(_) => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            AuthError::SessionExpired => "Your session has expired. Please log in again.".to_string(),
            AuthError::RequestAbandoned => {
                "Your session was renewed. Please try that again.".to_string()
            }
            AuthError::NotLoggedIn => "You need to log in first.".to_string(),
            AuthError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
