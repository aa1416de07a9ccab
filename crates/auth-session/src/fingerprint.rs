//! Environment fingerprinting for anonymous sessions.
//!
//! The fingerprint is a soft signal: stable for the same environment,
//! collisions between different machines are acceptable.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex characters kept from the digest.
const FINGERPRINT_LEN: usize = 16;

/// Source of the guest fingerprint.
pub trait FingerprintProvider: Send + Sync {
    /// Must return the same value for the same environment.
    fn fingerprint(&self) -> String;
}

/// Signals that distinguish one client environment from another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSignals {
    pub user_agent: String,
    pub locale: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub color_depth: u8,
    pub timezone_offset_minutes: i32,
    pub persistent_storage: bool,
    pub session_storage: bool,
}

impl EnvironmentSignals {
    /// Collect signals from the running process.
    ///
    /// Terminal geometry stands in for screen size (`COLUMNS`/`LINES`) and
    /// `COLORTERM` for colour depth.
    pub fn detect(user_agent: &str) -> Self {
        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let dimension = |name: &str| env(name).and_then(|v| v.trim().parse().ok()).unwrap_or(0);

        let locale = env("LC_ALL")
            .or_else(|| env("LANG"))
            .map(|raw| normalize_locale(&raw))
            .unwrap_or_else(|| "und".to_string());

        let color_depth = match env("COLORTERM").as_deref() {
            Some("truecolor") | Some("24bit") => 24,
            Some(_) => 8,
            None => 4,
        };

        let timezone_offset_minutes = chrono::Local::now().offset().local_minus_utc() / 60;

        Self {
            user_agent: user_agent.to_string(),
            locale,
            screen_width: dimension("COLUMNS"),
            screen_height: dimension("LINES"),
            color_depth,
            timezone_offset_minutes,
            persistent_storage: dirs::home_dir().is_some(),
            session_storage: true,
        }
    }

    /// Stable textual form fed to the hash.
    fn canonical(&self) -> String {
        format!(
            "{}|{}|{}x{}x{}|{}|{}|{}",
            self.user_agent,
            self.locale,
            self.screen_width,
            self.screen_height,
            self.color_depth,
            self.timezone_offset_minutes,
            u8::from(self.persistent_storage),
            u8::from(self.session_storage),
        )
    }
}

/// `en_US.UTF-8` -> `en-US`
fn normalize_locale(raw: &str) -> String {
    let base = raw.split(['.', '@']).next().unwrap_or(raw);
    base.replace('_', "-")
}

/// SHA-256 over [`EnvironmentSignals`], truncated to 16 hex characters.
#[derive(Debug, Clone)]
pub struct SignalFingerprint {
    signals: EnvironmentSignals,
}

impl SignalFingerprint {
    pub fn new(signals: EnvironmentSignals) -> Self {
        Self { signals }
    }

    pub fn detect(user_agent: &str) -> Self {
        Self::new(EnvironmentSignals::detect(user_agent))
    }

    pub fn signals(&self) -> &EnvironmentSignals {
        &self.signals
    }
}

impl FingerprintProvider for SignalFingerprint {
    fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.signals.canonical().as_bytes());
        hex::encode(&digest[..FINGERPRINT_LEN / 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals() -> EnvironmentSignals {
        EnvironmentSignals {
            user_agent: "campus-client/0.1.0".into(),
            locale: "en-US".into(),
            screen_width: 1920,
            screen_height: 1080,
            color_depth: 24,
            timezone_offset_minutes: -300,
            persistent_storage: true,
            session_storage: true,
        }
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let first = SignalFingerprint::new(signals()).fingerprint();
        let second = SignalFingerprint::new(signals()).fingerprint();
        assert_eq!(first, second);
        assert_eq!(first.len(), FINGERPRINT_LEN);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_is_lowercase_digest_prefix() {
        let full = hex::encode(Sha256::digest(signals().canonical().as_bytes()));
        let fingerprint = SignalFingerprint::new(signals()).fingerprint();
        assert_eq!(fingerprint, full[..FINGERPRINT_LEN]);
        assert_eq!(fingerprint, fingerprint.to_ascii_lowercase());
    }

    #[test]
    fn test_fingerprint_changes_with_environment() {
        let base = SignalFingerprint::new(signals()).fingerprint();

        let mut moved = signals();
        moved.timezone_offset_minutes = 60;
        assert_ne!(base, SignalFingerprint::new(moved).fingerprint());

        let mut other_agent = signals();
        other_agent.user_agent = "campus-client/0.2.0".into();
        assert_ne!(base, SignalFingerprint::new(other_agent).fingerprint());
    }

    #[test]
    fn test_normalize_locale() {
        assert_eq!(normalize_locale("en_US.UTF-8"), "en-US");
        assert_eq!(normalize_locale("de_DE@euro"), "de-DE");
        assert_eq!(normalize_locale("C"), "C");
    }

    #[test]
    fn test_detect_uses_user_agent() {
        let detected = EnvironmentSignals::detect("campus-test/1.0");
        assert_eq!(detected.user_agent, "campus-test/1.0");
        assert!(detected.session_storage);
    }
}
