//! Guest tracking controller.
//!
//! Anonymous visitors get a server-side session keyed by the environment
//! fingerprint. Content views are reported against it and the server tells
//! us when continued access needs an account.

use crate::fingerprint::FingerprintProvider;
use crate::http::ApiClient;
use crate::models::{
    GuestSessionRequest, GuestSessionResponse, GuestStatus, TrackOutcome, TrackRequest, UserId,
};
use crate::transport::ApiRequest;
use crate::{AuthError, AuthResult};
use credential_storage::CredentialStore;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::de::IgnoredAny;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Characters escaped inside a single path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Encode an opaque token for use as one URL path segment.
fn path_segment(token: &str) -> String {
    utf8_percent_encode(token, PATH_SEGMENT).to_string()
}

pub struct GuestTracker {
    api: Arc<ApiClient>,
    store: CredentialStore,
    provider: Arc<dyn FingerprintProvider>,
    /// Held while creating a session so concurrent callers share one.
    creating: Mutex<()>,
    /// Cleared by `teardown`; late responses are dropped once false.
    alive: AtomicBool,
}

impl GuestTracker {
    pub fn new(
        api: Arc<ApiClient>,
        store: CredentialStore,
        provider: Arc<dyn FingerprintProvider>,
    ) -> Self {
        Self {
            api,
            store,
            provider,
            creating: Mutex::new(()),
            alive: AtomicBool::new(true),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Stop applying responses. Requests already in flight complete but
    /// their results are discarded.
    pub fn teardown(&self) {
        self.alive.store(false, Ordering::Release);
    }

    fn ensure_alive(&self) -> AuthResult<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(AuthError::InvalidStateTransition(
                "guest tracker has been torn down".to_string(),
            ))
        }
    }

    /// The cached fingerprint, computed and stored on first use.
    pub fn fingerprint(&self) -> String {
        if let Some(cached) = self.store.fingerprint() {
            return cached;
        }

        let fingerprint = self.provider.fingerprint();
        if let Err(e) = self.store.set_fingerprint(&fingerprint) {
            warn!(error = %e, "Failed to cache fingerprint");
        }
        fingerprint
    }

    pub fn session_token(&self) -> Option<String> {
        self.store.guest_session_token()
    }

    /// Create a new guest session and store its token, replacing any old one.
    pub async fn create_session(&self) -> AuthResult<String> {
        let fingerprint = self.fingerprint();
        let request = ApiRequest::post("guest/session").json(&GuestSessionRequest {
            fingerprint: &fingerprint,
        })?;

        self.ensure_alive()?;
        let response: GuestSessionResponse = self.api.send(request).await?;
        self.ensure_alive()?;
        self.store.set_guest_session_token(&response.session_token)?;

        info!("Created guest session");
        Ok(response.session_token)
    }

    /// Return the stored guest token, creating a session only if none exists.
    pub async fn ensure_session(&self) -> AuthResult<String> {
        if let Some(token) = self.store.guest_session_token() {
            return Ok(token);
        }

        let _creating = self.creating.lock().await;
        if let Some(token) = self.store.guest_session_token() {
            return Ok(token);
        }
        self.create_session().await
    }

    /// Report one content view.
    ///
    /// Creates a session first if needed. If the server no longer knows the
    /// stored session, it is replaced once and the view reported again.
    pub async fn track_access(&self, content_type: &str, content_id: &str) -> AuthResult<TrackOutcome> {
        self.ensure_alive()?;
        let token = self.ensure_session().await?;

        match self.send_track(&token, content_type, content_id).await {
            Err(e) if e.is_session_not_found() => {
                info!("Guest session unknown to server, starting a new one");
                self.discard_session_token(&token);
                let token = self.ensure_session().await?;
                self.send_track(&token, content_type, content_id).await
            }
            result => result,
        }
    }

    async fn send_track(
        &self,
        token: &str,
        content_type: &str,
        content_id: &str,
    ) -> AuthResult<TrackOutcome> {
        let request = ApiRequest::post("guest/track").json(&TrackRequest {
            session_token: token,
            content_type,
            content_id,
        })?;

        let outcome: TrackOutcome = self.api.send(request).await?;
        self.ensure_alive()?;
        debug!(
            content_type,
            content_id,
            count = outcome.content_accessed_count,
            requires_login = outcome.requires_login,
            "Tracked guest access"
        );
        Ok(outcome)
    }

    /// Server view of the stored guest session.
    ///
    /// Without a stored token, or when the server no longer knows it, the
    /// result has `exists: false`; an unknown token is also discarded.
    pub async fn status(&self) -> AuthResult<GuestStatus> {
        let Some(token) = self.store.guest_session_token() else {
            return Ok(GuestStatus::default());
        };

        let request = ApiRequest::get(format!("guest/status/{}", path_segment(&token)));
        let status = match self.api.send::<GuestStatus>(request).await {
            Ok(status) => status,
            Err(e) if e.is_session_not_found() => GuestStatus::default(),
            Err(e) => return Err(e),
        };
        self.ensure_alive()?;

        if !status.exists {
            self.discard_session_token(&token);
        }
        Ok(status)
    }

    /// Merge the guest history into `user_id`.
    ///
    /// The local guest token is discarded whatever the outcome, so it cannot
    /// leak into a later anonymous session on a shared device. Returns
    /// whether the server accepted the conversion; `false` without a token.
    pub async fn convert_to_user(&self, user_id: &UserId) -> bool {
        let Some(token) = self.store.guest_session_token() else {
            debug!("No guest session to convert");
            return false;
        };

        let request = ApiRequest::post(format!("guest/convert/{}", path_segment(&token)))
            .query("user_id", user_id.to_string());
        let result = self.api.send::<IgnoredAny>(request).await;
        self.discard_session_token(&token);

        match result {
            Ok(_) => {
                info!(user_id = %user_id, "Converted guest session");
                true
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Guest conversion failed");
                false
            }
        }
    }

    /// Remove the stored token if it is still `token`.
    fn discard_session_token(&self, token: &str) {
        if self.store.guest_session_token().as_deref() != Some(token) {
            return;
        }
        if let Err(e) = self.store.clear_guest_session_token() {
            warn!(error = %e, "Failed to clear guest session token");
        }
    }
}
