//! Authentication and guest-session lifecycle for the Campus client.
//!
//! Layers, leaves first:
//! - [`transport`]: the HTTP seam (`HttpTransport`, reqwest implementation)
//! - [`ApiClient`]: bearer attachment, error envelopes, token-expiry handling
//! - [`RefreshCoordinator`]: single-flight refresh-token exchange
//! - [`SessionController`]: login/register/logout/profile over an explicit FSM
//! - [`GuestTracker`]: fingerprinted anonymous sessions and access tracking
//! - [`EscalationGate`]: when to interrupt a guest with an auth prompt
//! - [`CampusClient`]: wires the above together and performs guest conversion

mod client;
mod error;
mod escalation;
mod events;
mod fingerprint;
mod guest;
mod http;
mod models;
mod refresh;
mod session;
mod session_fsm;
pub mod transport;

#[cfg(test)]
mod tests;

pub use client::{CampusClient, GuestAccess};
pub use error::{AuthError, AuthResult};
pub use escalation::{
    EscalationDecision, EscalationGate, EscalationPrompt, EscalationTrigger, GateInput,
    USAGE_LIMIT_THRESHOLD,
};
pub use events::SessionEvent;
pub use fingerprint::{EnvironmentSignals, FingerprintProvider, SignalFingerprint};
pub use guest::GuestTracker;
pub use http::{ApiClient, ApiErrorBody};
pub use models::{
    GuestStatus, ProfilePatch, RegistrationRequest, Role, TokenPair, TrackOutcome, User, UserId,
};
pub use refresh::RefreshCoordinator;
pub use session::{SessionController, SessionState, SessionStateCallback};
pub use session_fsm::SessionPhase;
pub use transport::{ApiRequest, HttpTransport, Method, RawResponse, ReqwestTransport, TransportError};
