//! Storage key constants.

/// Storage keys used by the client
pub struct StorageKeys;

impl StorageKeys {
    /// Short-lived bearer token
    pub const ACCESS_TOKEN: &'static str = "access_token";

    /// Long-lived token exchanged for a new pair
    pub const REFRESH_TOKEN: &'static str = "refresh_token";

    /// Anonymous tracking session
    pub const GUEST_SESSION_TOKEN: &'static str = "guest_session_token";

    /// Cached environment fingerprint
    pub const BROWSER_FINGERPRINT: &'static str = "browser_fingerprint";
}
