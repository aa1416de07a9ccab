//! High-level API for the client's credentials.

use crate::{MemoryStorage, StorageBackend, StorageKeys, StorageResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Typed access to the stored tokens.
///
/// Reads never fail: a backend error is logged and reported as an absent
/// value. The access and refresh tokens are only written or removed as a pair.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Create a new credential store with the given storage backend
    pub fn new(storage: Box<dyn StorageBackend>) -> Self {
        Self {
            storage: Arc::from(storage),
        }
    }

    /// Credential store that forgets everything when dropped.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::new()))
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key, error = %e, "Credential read failed, treating as absent");
                None
            }
        }
    }

    // ==========================================
    // Token pair
    // ==========================================

    pub fn access_token(&self) -> Option<String> {
        self.read(StorageKeys::ACCESS_TOKEN)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(StorageKeys::REFRESH_TOKEN)
    }

    /// Whether both halves of the token pair are stored.
    pub fn has_token_pair(&self) -> bool {
        self.access_token().is_some() && self.refresh_token().is_some()
    }

    /// Store a freshly issued token pair, replacing any previous one.
    ///
    /// If the refresh token cannot be written the previous access token is
    /// restored (or removed), so a lone access token is never left behind.
    pub fn set_token_pair(&self, access_token: &str, refresh_token: &str) -> StorageResult<()> {
        let previous_access = self.storage.get(StorageKeys::ACCESS_TOKEN).ok().flatten();

        self.storage.set(StorageKeys::ACCESS_TOKEN, access_token)?;
        if let Err(e) = self.storage.set(StorageKeys::REFRESH_TOKEN, refresh_token) {
            warn!(error = %e, "Failed to store refresh token, rolling back access token");
            let rollback = match previous_access {
                Some(previous) => self.storage.set(StorageKeys::ACCESS_TOKEN, &previous),
                None => self.storage.delete(StorageKeys::ACCESS_TOKEN).map(|_| ()),
            };
            if let Err(rollback_err) = rollback {
                warn!(error = %rollback_err, "Access token rollback failed");
            }
            return Err(e);
        }

        debug!("Stored token pair");
        Ok(())
    }

    /// Remove both tokens. Both deletes are attempted even if the first fails.
    pub fn clear_token_pair(&self) -> StorageResult<()> {
        let access = self.storage.delete(StorageKeys::ACCESS_TOKEN);
        let refresh = self.storage.delete(StorageKeys::REFRESH_TOKEN);
        access?;
        refresh?;
        debug!("Cleared token pair");
        Ok(())
    }

    // ==========================================
    // Guest session
    // ==========================================

    pub fn guest_session_token(&self) -> Option<String> {
        self.read(StorageKeys::GUEST_SESSION_TOKEN)
    }

    pub fn set_guest_session_token(&self, token: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::GUEST_SESSION_TOKEN, token)
    }

    pub fn clear_guest_session_token(&self) -> StorageResult<()> {
        self.storage.delete(StorageKeys::GUEST_SESSION_TOKEN)?;
        Ok(())
    }

    // ==========================================
    // Fingerprint
    // ==========================================

    pub fn fingerprint(&self) -> Option<String> {
        self.read(StorageKeys::BROWSER_FINGERPRINT)
    }

    pub fn set_fingerprint(&self, fingerprint: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::BROWSER_FINGERPRINT, fingerprint)
    }
}
