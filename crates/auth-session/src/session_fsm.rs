//! Session lifecycle state machine using rust-fsm.
//!
//! ```text
//!                 ┌──────────────┐
//!                 │ Initializing │ (initial)
//!                 └──────┬───────┘
//!       NoSession /      │      ProfileLoaded
//!   ProfileRejected      │
//!          ┌─────────────┴──────────────┐
//!          ▼                            ▼
//!   ┌─────────────┐  LoginAttempt  ┌────────────────┐
//!   │  Anonymous  │ ─────────────► │ Authenticating │
//!   └─────────────┘ ◄───────────── └───────┬────────┘
//!        ▲   ▲        LoginFailed          │ LoginSuccess
//!        │   │                             ▼
//!        │   │   SessionExpired    ┌───────────────┐
//!        │   └──────────────────── │ Authenticated │
//!        │                         └───────┬───────┘
//!        │ LogoutComplete                  │ LogoutRequested
//!   ┌────┴───────┐                         │
//!   │ LoggingOut │ ◄───────────────────────┘
//!   └────────────┘
//! ```
//!
//! `LogoutRequested` is accepted from every settled or pending phase so a
//! local logout can always complete.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Initializing)

    Initializing => {
        NoSession => Anonymous,
        ProfileLoaded => Authenticated,
        ProfileRejected => Anonymous,
        LogoutRequested => LoggingOut
    },
    Anonymous => {
        LoginAttempt => Authenticating,
        LogoutRequested => LoggingOut
    },
    Authenticating => {
        LoginSuccess => Authenticated,
        LoginFailed => Anonymous,
        LogoutRequested => LoggingOut
    },
    Authenticated => {
        SessionExpired => Anonymous,
        LogoutRequested => LoggingOut
    },
    LoggingOut => {
        LogoutComplete => Anonymous
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session phase for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Startup check of stored credentials in progress.
    Initializing,
    /// No authenticated user.
    Anonymous,
    /// Login or registration in flight.
    Authenticating,
    /// A user is logged in.
    Authenticated,
    /// Logout in progress.
    LoggingOut,
}

impl SessionPhase {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionPhase::Authenticated)
    }

    /// Only the startup check counts as loading.
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionPhase::Initializing)
    }
}

impl From<&SessionMachineState> for SessionPhase {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Initializing => SessionPhase::Initializing,
            SessionMachineState::Anonymous => SessionPhase::Anonymous,
            SessionMachineState::Authenticating => SessionPhase::Authenticating,
            SessionMachineState::Authenticated => SessionPhase::Authenticated,
            SessionMachineState::LoggingOut => SessionPhase::LoggingOut,
        }
    }
}
