//! Client facade wiring session, guest tracking and escalation together.

use crate::escalation::{EscalationDecision, EscalationGate, EscalationPrompt, EscalationTrigger, GateInput};
use crate::events::SessionEvent;
use crate::fingerprint::{FingerprintProvider, SignalFingerprint};
use crate::guest::GuestTracker;
use crate::http::ApiClient;
use crate::models::{ProfilePatch, RegistrationRequest, TrackOutcome, User};
use crate::session::{SessionController, SessionState, SessionStateCallback};
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::AuthResult;
use client_config_and_utils::Config;
use credential_storage::CredentialStore;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Outcome of reporting a guest content view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GuestAccess {
    pub outcome: TrackOutcome,
    pub decision: EscalationDecision,
}

pub struct CampusClient {
    api: Arc<ApiClient>,
    store: CredentialStore,
    session: Arc<SessionController>,
    guest: GuestTracker,
    gate: Mutex<EscalationGate>,
}

impl CampusClient {
    /// Client talking to the configured API over reqwest.
    pub fn new(config: &Config, store: CredentialStore) -> AuthResult<Self> {
        let base_url = config.api_base_url()?;
        let transport = ReqwestTransport::new(
            base_url,
            config.request_timeout_secs.map(Duration::from_secs),
            &config.user_agent,
        )?;
        let fingerprint = SignalFingerprint::detect(&config.user_agent);

        Ok(Self::with_transport(
            config,
            store,
            Arc::new(transport),
            Arc::new(fingerprint),
        ))
    }

    /// Client over an arbitrary transport and fingerprint source.
    pub fn with_transport(
        config: &Config,
        store: CredentialStore,
        transport: Arc<dyn HttpTransport>,
        fingerprint: Arc<dyn FingerprintProvider>,
    ) -> Self {
        let api = Arc::new(ApiClient::new(
            transport,
            store.clone(),
            config.token_expiry_mode,
        ));
        let session = Arc::new(SessionController::new(api.clone(), store.clone()));
        let guest = GuestTracker::new(api.clone(), store.clone(), fingerprint);
        let gate = EscalationGate::with_threshold(u64::from(config.usage_limit_threshold));

        Self {
            api,
            store,
            session,
            guest,
            gate: Mutex::new(gate),
        }
    }

    pub fn session(&self) -> &Arc<SessionController> {
        &self.session
    }

    pub fn guest(&self) -> &GuestTracker {
        &self.guest
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.api.subscribe()
    }

    pub fn set_state_callback(&self, callback: SessionStateCallback) {
        self.session.set_state_callback(callback);
    }

    /// Start following session events and resolve the stored session.
    pub async fn initialize(&self) -> SessionState {
        self.session.start_event_listener();
        self.session.initialize().await
    }

    pub async fn login(&self, identifier: &str, password: &str) -> AuthResult<SessionState> {
        let state = self.session.login(identifier, password).await?;
        Ok(self.after_authentication(state).await)
    }

    pub async fn register(&self, payload: &RegistrationRequest) -> AuthResult<SessionState> {
        let state = self.session.register(payload).await?;
        Ok(self.after_authentication(state).await)
    }

    /// Close any open prompt and fold the guest session into the new account.
    async fn after_authentication(&self, state: SessionState) -> SessionState {
        if self.gate.lock().close_for_authentication() {
            debug!("Escalation closed by authentication");
        }

        let Some(user) = state.user.as_ref() else {
            return state;
        };
        if self.guest.session_token().is_some() {
            let converted = self.guest.convert_to_user(&user.id).await;
            info!(user_id = %user.id, converted, "Guest session handed over");
        }
        state
    }

    pub async fn logout(&self) -> SessionState {
        let state = self.session.logout().await;
        self.gate.lock().reset();
        state
    }

    pub async fn update_profile(&self, patch: &ProfilePatch) -> AuthResult<User> {
        self.session.update_profile(patch).await
    }

    pub async fn refresh_profile(&self) -> AuthResult<User> {
        self.session.refresh_profile().await
    }

    /// Report a content view and evaluate the usage-limit prompt.
    pub async fn track_access(&self, content_type: &str, content_id: &str) -> AuthResult<GuestAccess> {
        let outcome = self.guest.track_access(content_type, content_id).await?;
        let decision = self.request_escalation_with_count(
            EscalationTrigger::UsageLimit,
            outcome.content_accessed_count,
        );
        Ok(GuestAccess { outcome, decision })
    }

    /// Evaluate a trigger using the last known server-side count.
    pub async fn request_escalation(&self, trigger: EscalationTrigger) -> AuthResult<EscalationDecision> {
        let count = if trigger == EscalationTrigger::UsageLimit && !self.state().is_authenticated() {
            self.guest.status().await?.content_accessed_count
        } else {
            0
        };
        Ok(self.request_escalation_with_count(trigger, count))
    }

    fn request_escalation_with_count(&self, trigger: EscalationTrigger, count: u64) -> EscalationDecision {
        let input = GateInput {
            is_authenticated: self.state().is_authenticated(),
            content_accessed_count: count,
        };
        self.gate.lock().request(trigger, input)
    }

    pub fn dismiss_escalation(&self) -> bool {
        self.gate.lock().dismiss()
    }

    /// Navigation to new content: dismissed prompts may fire again.
    pub fn reset_escalation(&self) {
        self.gate.lock().reset();
    }

    pub fn escalation(&self) -> Option<EscalationPrompt> {
        self.gate.lock().current()
    }

    pub fn teardown(&self) {
        self.session.teardown();
        self.guest.teardown();
    }
}
