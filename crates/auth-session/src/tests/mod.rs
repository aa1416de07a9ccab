//! Integration tests for the auth and guest-session lifecycle.
//!
//! - `harness.rs`    - MockBackend, StaticFingerprint and TestContext
//! - `refresh.rs`    - Token expiry handling and single-flight refresh
//! - `session.rs`    - Startup, login/register/logout, profile, teardown
//! - `guest.rs`      - Fingerprint, guest sessions, access tracking, conversion
//! - `conversion.rs` - Escalation through the client and guest hand-over on login


#[allow(unused_imports)]
pub use harness::{MockBackend, StaticFingerprint, TestContext};
