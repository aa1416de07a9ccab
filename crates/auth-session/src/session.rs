//! Auth session controller.
//!
//! Owns the in-memory "current user" and the session FSM. Tokens live in the
//! [`CredentialStore`]; this controller is the only writer of the token pair
//! apart from the refresh coordinator.

use crate::events::SessionEvent;
use crate::http::ApiClient;
use crate::models::{AuthResponse, LoginRequest, ProfilePatch, RegistrationRequest, Role, User};
use crate::session_fsm::{SessionMachine, SessionMachineInput, SessionPhase};
use crate::transport::ApiRequest;
use crate::{AuthError, AuthResult};
use credential_storage::CredentialStore;
use parking_lot::Mutex;
use serde::de::IgnoredAny;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Snapshot of the session as exposed to the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub user: Option<User>,
    pub is_loading: bool,
    pub last_error: Option<String>,
    pub phase: SessionPhase,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    fn has_role(&self, role: Role) -> bool {
        self.user.as_ref().is_some_and(|user| user.role == role)
    }

    pub fn is_student(&self) -> bool {
        self.has_role(Role::Student)
    }

    pub fn is_teacher(&self) -> bool {
        self.has_role(Role::Teacher)
    }

    pub fn is_parent(&self) -> bool {
        self.has_role(Role::Parent)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

/// Callback type for session state change notifications.
pub type SessionStateCallback = Box<dyn Fn(SessionState) + Send + Sync>;

#[derive(Default)]
struct Profile {
    user: Option<User>,
    last_error: Option<String>,
}

pub struct SessionController {
    api: Arc<ApiClient>,
    store: CredentialStore,
    fsm: Mutex<SessionMachine>,
    profile: Mutex<Profile>,
    state_callback: Mutex<Option<SessionStateCallback>>,
    /// Cleared by `teardown`; late responses are dropped once false.
    alive: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionController {
    pub fn new(api: Arc<ApiClient>, store: CredentialStore) -> Self {
        Self {
            api,
            store,
            fsm: Mutex::new(SessionMachine::new()),
            profile: Mutex::new(Profile::default()),
            state_callback: Mutex::new(None),
            alive: AtomicBool::new(true),
            listener: Mutex::new(None),
        }
    }

    /// Set a callback to be notified of session state changes.
    pub fn set_state_callback(&self, callback: SessionStateCallback) {
        *self.state_callback.lock() = Some(callback);
    }

    pub fn phase(&self) -> SessionPhase {
        SessionPhase::from(self.fsm.lock().state())
    }

    /// Current session snapshot.
    pub fn state(&self) -> SessionState {
        let phase = self.phase();
        let profile = self.profile.lock();
        SessionState {
            user: profile.user.clone(),
            is_loading: phase.is_loading(),
            last_error: profile.last_error.clone(),
            phase,
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.profile.lock().user.clone()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn ensure_alive(&self) -> AuthResult<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(AuthError::InvalidStateTransition(
                "session controller has been torn down".to_string(),
            ))
        }
    }

    /// Transition the FSM without notifying.
    fn consume(&self, input: &SessionMachineInput) -> AuthResult<SessionPhase> {
        let mut fsm = self.fsm.lock();
        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;
        Ok(SessionPhase::from(fsm.state()))
    }

    /// Transition the FSM, optionally updating the profile, and notify.
    fn transition(
        &self,
        input: &SessionMachineInput,
        update: impl FnOnce(&mut Profile),
    ) -> AuthResult<SessionPhase> {
        let phase = self.consume(input)?;
        update(&mut *self.profile.lock());
        debug!(phase = ?phase, input = ?input, "Session state transition");
        self.notify_state_change();
        Ok(phase)
    }

    fn notify_state_change(&self) {
        let state = self.state();
        if let Some(callback) = self.state_callback.lock().as_ref() {
            callback(state);
        }
    }

    fn clear_tokens(&self) {
        if let Err(e) = self.store.clear_token_pair() {
            warn!(error = %e, "Failed to clear stored tokens");
        }
    }

    /// Resolve the startup state from stored credentials.
    ///
    /// With an access token, the profile is fetched; any failure clears both
    /// tokens and leaves the session anonymous. `is_loading` turns false
    /// exactly once. Calling this again after startup returns the current
    /// state.
    pub async fn initialize(&self) -> SessionState {
        if self.phase() != SessionPhase::Initializing || !self.is_alive() {
            return self.state();
        }

        if self.store.access_token().is_none() {
            info!("No stored session on startup");
            if let Err(e) = self.transition(&SessionMachineInput::NoSession, |_| {}) {
                debug!(error = %e, "Startup already resolved");
            }
            return self.state();
        }

        let result = self.api.send::<User>(ApiRequest::get("auth/me")).await;
        if !self.is_alive() {
            debug!("Dropping startup profile after teardown");
            return self.state();
        }

        let applied = match result {
            Ok(user) => {
                info!(user_id = %user.id, "Restored session on startup");
                self.transition(&SessionMachineInput::ProfileLoaded, |profile| {
                    profile.user = Some(user);
                    profile.last_error = None;
                })
            }
            Err(e) => {
                info!(error = %e, "Stored session rejected on startup, clearing tokens");
                self.clear_tokens();
                self.transition(&SessionMachineInput::ProfileRejected, |profile| {
                    profile.user = None;
                })
            }
        };

        if let Err(e) = applied {
            // Logout raced the startup check; the logout already decided the outcome.
            debug!(error = %e, "Startup result superseded");
        }
        self.state()
    }

    /// Log in with an email address or phone number.
    pub async fn login(&self, identifier: &str, password: &str) -> AuthResult<SessionState> {
        let request = ApiRequest::post("auth/login").json(&LoginRequest {
            email_or_phone: identifier.trim(),
            password,
        })?;
        self.authenticate(request).await
    }

    /// Create an account and log in as it.
    pub async fn register(&self, payload: &RegistrationRequest) -> AuthResult<SessionState> {
        let request = ApiRequest::post("auth/register").json(payload)?;
        self.authenticate(request).await
    }

    async fn authenticate(&self, request: ApiRequest) -> AuthResult<SessionState> {
        self.ensure_alive()?;
        self.transition(&SessionMachineInput::LoginAttempt, |profile| {
            profile.last_error = None;
        })?;

        let result = self.api.send::<AuthResponse>(request).await;
        self.ensure_alive()?;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Authentication failed");
                self.fail_authentication(e.user_message());
                return Err(e);
            }
        };

        if let Err(e) = self
            .store
            .set_token_pair(&response.tokens.access_token, &response.tokens.refresh_token)
        {
            warn!(error = %e, "Failed to persist tokens after authentication");
            self.fail_authentication(e.to_string());
            return Err(e.into());
        }

        let user = response.user;
        let user_id = user.id.clone();
        if let Err(e) = self.transition(&SessionMachineInput::LoginSuccess, |profile| {
            profile.user = Some(user);
            profile.last_error = None;
        }) {
            // Logged out while the request was in flight.
            self.clear_tokens();
            return Err(e);
        }

        info!(user_id = %user_id, "Authenticated");
        Ok(self.state())
    }

    fn fail_authentication(&self, message: String) {
        if let Err(e) = self.transition(&SessionMachineInput::LoginFailed, |profile| {
            profile.last_error = Some(message);
        }) {
            debug!(error = %e, "Authentication outcome superseded by logout");
        }
    }

    /// Log out locally, notifying the server on a best-effort basis.
    ///
    /// Never fails: server errors are logged and the local session is
    /// cleared regardless.
    pub async fn logout(&self) -> SessionState {
        if let Err(e) = self.transition(&SessionMachineInput::LogoutRequested, |_| {}) {
            debug!(error = %e, "Logout requested outside a settled phase");
        }

        if self.store.access_token().is_some() {
            if let Err(e) = self
                .api
                .send_once::<IgnoredAny>(ApiRequest::post("auth/logout"))
                .await
            {
                warn!(error = %e, "Server logout failed, continuing with local logout");
            }
        }

        self.clear_tokens();
        let cleared = self.transition(&SessionMachineInput::LogoutComplete, |profile| {
            profile.user = None;
            profile.last_error = None;
        });
        if cleared.is_err() {
            // The FSM was not in LoggingOut; still drop the user.
            let mut profile = self.profile.lock();
            profile.user = None;
            profile.last_error = None;
        }

        info!("Logged out");
        self.state()
    }

    /// Update profile fields of the authenticated user.
    pub async fn update_profile(&self, patch: &ProfilePatch) -> AuthResult<User> {
        self.require_authenticated()?;
        let request = ApiRequest::put("auth/profile").json(patch)?;
        let user = self.authorized(self.api.send::<User>(request).await)?;
        self.apply_user(&user);
        Ok(user)
    }

    /// Re-fetch the authenticated user's profile.
    pub async fn refresh_profile(&self) -> AuthResult<User> {
        self.require_authenticated()?;
        let user = self.authorized(self.api.send::<User>(ApiRequest::get("auth/me")).await)?;
        self.apply_user(&user);
        Ok(user)
    }

    fn require_authenticated(&self) -> AuthResult<()> {
        self.ensure_alive()?;
        if self.phase().is_authenticated() {
            Ok(())
        } else {
            Err(AuthError::NotLoggedIn)
        }
    }

    /// Drop the user when an authenticated call reports an unrecoverable expiry.
    fn authorized<T>(&self, result: AuthResult<T>) -> AuthResult<T> {
        if matches!(result, Err(AuthError::SessionExpired)) {
            self.handle_session_expired();
        }
        result
    }

    fn apply_user(&self, user: &User) {
        if !self.is_alive() || !self.phase().is_authenticated() {
            debug!("Ignoring profile response for a session that has ended");
            return;
        }
        self.profile.lock().user = Some(user.clone());
        self.notify_state_change();
    }

    /// Refresh failed somewhere: the tokens are gone, so is the user.
    fn handle_session_expired(&self) {
        if !self.is_alive() {
            return;
        }
        match self.transition(&SessionMachineInput::SessionExpired, |profile| {
            profile.user = None;
            profile.last_error = Some(AuthError::SessionExpired.user_message());
        }) {
            Ok(_) => info!("Session expired, user logged out"),
            Err(e) => debug!(error = %e, "Session expiry outside an authenticated session"),
        }
    }

    /// Follow [`SessionEvent`]s from the HTTP client.
    ///
    /// The task holds only a weak reference and ends on `teardown`, when the
    /// controller is dropped, or when the channel closes.
    pub fn start_event_listener(self: &Arc<Self>) {
        let mut events = self.api.subscribe();
        let controller: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Session event listener lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let Some(controller) = controller.upgrade() else {
                    break;
                };
                if !controller.is_alive() {
                    break;
                }

                match event {
                    SessionEvent::SessionExpired {
                        tokens_refreshed: false,
                    } => controller.handle_session_expired(),
                    SessionEvent::SessionExpired {
                        tokens_refreshed: true,
                    } => debug!("Tokens refreshed, request abandoned for re-authentication"),
                }
            }
        });

        if let Some(previous) = self.listener.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Stop reacting to responses and events.
    pub fn teardown(&self) {
        self.alive.store(false, Ordering::Release);
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
        }
        debug!("Session controller torn down");
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;

    fn state_with(role: Option<Role>) -> SessionState {
        SessionState {
            user: role.map(|role| User {
                id: UserId::Number(1),
                role,
                first_name: None,
                last_name: None,
                email: None,
                phone: None,
                extra: Default::default(),
            }),
            is_loading: false,
            last_error: None,
            phase: if role.is_some() {
                SessionPhase::Authenticated
            } else {
                SessionPhase::Anonymous
            },
        }
    }

    #[test]
    fn test_role_flags_follow_user() {
        let anonymous = state_with(None);
        assert!(!anonymous.is_authenticated());
        assert!(!anonymous.is_student());
        assert!(!anonymous.is_admin());

        let teacher = state_with(Some(Role::Teacher));
        assert!(teacher.is_authenticated());
        assert!(teacher.is_teacher());
        assert!(!teacher.is_student());
        assert!(!teacher.is_parent());

        assert!(state_with(Some(Role::Parent)).is_parent());
        assert!(state_with(Some(Role::Admin)).is_admin());
        assert!(state_with(Some(Role::Student)).is_student());
    }
}
