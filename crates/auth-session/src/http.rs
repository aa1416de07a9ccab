//! HTTP client core.
//!
//! [`ApiClient`] attaches the stored access token, turns non-2xx responses
//! into [`AuthError`]s and handles `TOKEN_EXPIRED` through the
//! [`RefreshCoordinator`].

use crate::events::{SessionEvent, EVENT_CHANNEL_CAPACITY};
use crate::refresh::RefreshCoordinator;
use crate::transport::{ApiRequest, HttpTransport, RawResponse};
use crate::{AuthError, AuthResult};
use client_config_and_utils::TokenExpiryMode;
use credential_storage::CredentialStore;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Error code the backend uses for an expired access token.
pub const TOKEN_EXPIRED_CODE: &str = "TOKEN_EXPIRED";

/// Message and optional code extracted from an error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiErrorBody {
    pub code: Option<String>,
    pub message: String,
}

impl ApiErrorBody {
    /// Parse `{error:{code,message}}`, `{detail:"..."}` or
    /// `{detail:[{msg:"..."},...]}`. Anything else yields `HTTP <status>`.
    pub fn parse(status: u16, body: &str) -> Self {
        let fallback = || Self {
            code: None,
            message: format!("HTTP {}", status),
        };

        let Ok(value) = serde_json::from_str::<Value>(body) else {
            return fallback();
        };

        if let Some(error) = value.get("error") {
            let code = error.get("code").and_then(Value::as_str).map(str::to_string);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| error.as_str().map(str::to_string));
            if code.is_some() || message.is_some() {
                return Self {
                    message: message.unwrap_or_else(|| format!("HTTP {}", status)),
                    code,
                };
            }
        }

        match value.get("detail") {
            Some(Value::String(detail)) => Self {
                code: None,
                message: detail.clone(),
            },
            Some(Value::Array(items)) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .collect();
                if messages.is_empty() {
                    fallback()
                } else {
                    Self {
                        code: None,
                        message: messages.join("; "),
                    }
                }
            }
            _ => fallback(),
        }
    }

    pub fn is_token_expired(&self) -> bool {
        self.code.as_deref() == Some(TOKEN_EXPIRED_CODE)
    }

    /// Map a non-2xx status to the error taxonomy.
    pub fn into_error(self, status: u16) -> AuthError {
        match status {
            401 | 403 => AuthError::Authentication(self.message),
            400 | 409 | 422 => AuthError::Validation(self.message),
            _ => AuthError::Api {
                status,
                code: self.code,
                message: self.message,
            },
        }
    }
}

enum Outcome {
    Success(Value),
    TokenExpired,
    Failed(AuthError),
}

fn interpret(response: RawResponse) -> Outcome {
    if response.is_success() {
        if response.body.trim().is_empty() {
            return Outcome::Success(Value::Null);
        }
        return match serde_json::from_str(&response.body) {
            Ok(value) => Outcome::Success(value),
            Err(e) => Outcome::Failed(AuthError::Json(e)),
        };
    }

    let error = ApiErrorBody::parse(response.status, &response.body);
    if error.is_token_expired() {
        return Outcome::TokenExpired;
    }
    Outcome::Failed(error.into_error(response.status))
}

/// Authenticated JSON client shared by the session and guest controllers.
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    store: CredentialStore,
    refresher: RefreshCoordinator,
    expiry_mode: TokenExpiryMode,
    events: broadcast::Sender<SessionEvent>,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: CredentialStore,
        expiry_mode: TokenExpiryMode,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            refresher: RefreshCoordinator::new(transport.clone(), store.clone()),
            transport,
            store,
            expiry_mode,
            events,
        }
    }

    /// Subscribe to session events (forced re-authentication).
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.refresher
    }

    pub fn expiry_mode(&self) -> TokenExpiryMode {
        self.expiry_mode
    }

    /// Send a request and decode the 2xx body as `T`.
    ///
    /// A `TOKEN_EXPIRED` rejection runs the shared refresh. With
    /// [`TokenExpiryMode::ForceReauth`] the request is then abandoned
    /// ([`AuthError::RequestAbandoned`] or [`AuthError::SessionExpired`]) and a
    /// [`SessionEvent::SessionExpired`] is broadcast. With
    /// [`TokenExpiryMode::RetryOnce`] a successful refresh re-issues the
    /// request one time.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> AuthResult<T> {
        let value = self.send_value(request, true).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Like [`send`](Self::send) but an expired token is reported as a plain
    /// authentication error and no refresh is attempted.
    pub async fn send_once<T: DeserializeOwned>(&self, request: ApiRequest) -> AuthResult<T> {
        let value = self.send_value(request, false).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn send_value(&self, request: ApiRequest, handle_expiry: bool) -> AuthResult<Value> {
        let mut retried = false;

        loop {
            let seen = self.refresher.completed_exchanges();
            let (response, sent_token) = self.dispatch(&request).await?;

            match interpret(response) {
                Outcome::Success(value) => return Ok(value),
                Outcome::Failed(e) => return Err(e),
                Outcome::TokenExpired if !handle_expiry => {
                    return Err(AuthError::Authentication("Token has expired".to_string()));
                }
                Outcome::TokenExpired if retried => {
                    warn!(path = %request.path, "Access token rejected again after refresh");
                    self.emit(SessionEvent::SessionExpired {
                        tokens_refreshed: true,
                    });
                    return Err(AuthError::RequestAbandoned);
                }
                Outcome::TokenExpired => {
                    debug!(path = %request.path, "Access token expired, refreshing");
                    let round = self
                        .refresher
                        .refresh_after(seen, sent_token.as_deref())
                        .await;

                    if !round.refreshed {
                        if round.led {
                            self.emit(SessionEvent::SessionExpired {
                                tokens_refreshed: false,
                            });
                        }
                        return Err(AuthError::SessionExpired);
                    }

                    if self.expiry_mode == TokenExpiryMode::RetryOnce {
                        info!(path = %request.path, "Retrying request with refreshed token");
                        retried = true;
                        continue;
                    }

                    if round.led {
                        self.emit(SessionEvent::SessionExpired {
                            tokens_refreshed: true,
                        });
                    }
                    return Err(AuthError::RequestAbandoned);
                }
            }
        }
    }

    /// Send with the stored access token; returns the response and the
    /// token that was attached.
    async fn dispatch(&self, request: &ApiRequest) -> AuthResult<(RawResponse, Option<String>)> {
        let mut request = request.clone();
        let bearer = self.store.access_token();
        request.bearer = bearer.clone();

        match self.transport.send(request).await {
            Ok(response) => Ok((response, bearer)),
            Err(e) => {
                warn!(error = %e, "API request failed without a response");
                Err(AuthError::Network(e))
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine: nothing is listening for forced re-auth.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_object() {
        let body = r#"{"error":{"code":"TOKEN_EXPIRED","message":"Token has expired"}}"#;
        let parsed = ApiErrorBody::parse(401, body);
        assert_eq!(parsed.code.as_deref(), Some("TOKEN_EXPIRED"));
        assert_eq!(parsed.message, "Token has expired");
        assert!(parsed.is_token_expired());
    }

    #[test]
    fn test_parse_detail_string() {
        let parsed = ApiErrorBody::parse(401, r#"{"detail":"Invalid credentials"}"#);
        assert_eq!(parsed.code, None);
        assert_eq!(parsed.message, "Invalid credentials");
    }

    #[test]
    fn test_parse_detail_list() {
        let body = r#"{"detail":[{"loc":["body","email"],"msg":"field required"},{"msg":"password too short"}]}"#;
        let parsed = ApiErrorBody::parse(422, body);
        assert_eq!(parsed.message, "field required; password too short");
    }

    #[test]
    fn test_parse_fallback() {
        assert_eq!(ApiErrorBody::parse(502, "<html>bad gateway</html>").message, "HTTP 502");
        assert_eq!(ApiErrorBody::parse(500, r#"{"unexpected":true}"#).message, "HTTP 500");
        assert_eq!(ApiErrorBody::parse(422, r#"{"detail":[]}"#).message, "HTTP 422");
    }

    #[test]
    fn test_status_classification() {
        let body = |m: &str| ApiErrorBody {
            code: None,
            message: m.to_string(),
        };

        assert!(matches!(body("x").into_error(401), AuthError::Authentication(_)));
        assert!(matches!(body("x").into_error(403), AuthError::Authentication(_)));
        assert!(matches!(body("x").into_error(400), AuthError::Validation(_)));
        assert!(matches!(body("x").into_error(409), AuthError::Validation(_)));
        assert!(matches!(body("x").into_error(422), AuthError::Validation(_)));
        assert!(matches!(
            body("x").into_error(404),
            AuthError::Api { status: 404, .. }
        ));
    }

    #[test]
    fn test_interpret_empty_success_is_null() {
        match interpret(RawResponse::new(204, "")) {
            Outcome::Success(Value::Null) => {}
            _ => panic!("expected null success"),
        }
    }

    #[test]
    fn test_interpret_malformed_success_is_json_error() {
        match interpret(RawResponse::new(200, "{oops")) {
            Outcome::Failed(AuthError::Json(_)) => {}
            _ => panic!("expected JSON error"),
        }
    }
}
