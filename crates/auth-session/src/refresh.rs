//! Single-flight refresh-token exchange.
//!
//! Every caller that needs a refresh goes through [`RefreshCoordinator`].
//! A caller whose request left before an exchange completed, whether it
//! queued behind that exchange or was rejected after it, takes the recorded
//! outcome instead of starting its own exchange. The server rotates refresh
//! tokens on use, so a second exchange with the same token would invalidate
//! the first.

use crate::models::{RefreshRequest, TokenPair};
use crate::transport::{ApiRequest, HttpTransport};
use credential_storage::CredentialStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const REFRESH_PATH: &str = "auth/refresh";

/// Result of one pass through the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RefreshRound {
    pub refreshed: bool,
    /// This caller performed the exchange (rather than sharing another's).
    pub led: bool,
}

#[derive(Debug, Default)]
struct LastRound {
    generation: u64,
    refreshed: bool,
}

pub struct RefreshCoordinator {
    transport: Arc<dyn HttpTransport>,
    store: CredentialStore,
    /// Number of completed exchanges. Read before queueing on `gate`.
    completed: AtomicU64,
    gate: Mutex<LastRound>,
}

impl RefreshCoordinator {
    pub fn new(transport: Arc<dyn HttpTransport>, store: CredentialStore) -> Self {
        Self {
            transport,
            store,
            completed: AtomicU64::new(0),
            gate: Mutex::new(LastRound::default()),
        }
    }

    /// Exchange the stored refresh token for a new pair.
    ///
    /// Returns `false` without any network call when no refresh token is
    /// stored. On any failure both tokens are cleared.
    pub async fn refresh(&self) -> bool {
        let seen = self.completed_exchanges();
        let current = self.store.access_token();
        self.refresh_after(seen, current.as_deref()).await.refreshed
    }

    /// Number of exchanges completed so far.
    pub fn completed_exchanges(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Refresh on behalf of a request that was rejected as expired.
    ///
    /// `seen` is [`completed_exchanges`](Self::completed_exchanges) as read
    /// before the request went out and `sent_token` the bearer it carried.
    /// If an exchange finished since then, or the stored access token is no
    /// longer the one sent, the rejection is stale and no new exchange runs.
    pub(crate) async fn refresh_after(&self, seen: u64, sent_token: Option<&str>) -> RefreshRound {
        let mut last = self.gate.lock().await;

        if last.generation > seen {
            debug!(refreshed = last.refreshed, "Sharing result of earlier token refresh");
            return RefreshRound {
                refreshed: last.refreshed,
                led: false,
            };
        }

        let current = self.store.access_token();
        if current.as_deref() != sent_token {
            debug!("Access token replaced since the request was sent");
            return RefreshRound {
                refreshed: current.is_some(),
                led: false,
            };
        }

        let refreshed = self.exchange().await;
        last.generation += 1;
        last.refreshed = refreshed;
        self.completed.store(last.generation, Ordering::Release);

        RefreshRound {
            refreshed,
            led: true,
        }
    }

    async fn exchange(&self) -> bool {
        let Some(refresh_token) = self.store.refresh_token() else {
            debug!("No refresh token stored, skipping refresh");
            self.discard_tokens();
            return false;
        };

        let request = match ApiRequest::post(REFRESH_PATH).json(&RefreshRequest {
            refresh_token: &refresh_token,
        }) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Failed to encode refresh request");
                self.discard_tokens();
                return false;
            }
        };

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Token refresh failed: no response");
                self.discard_tokens();
                return false;
            }
        };

        if !response.is_success() {
            warn!(status = response.status, "Token refresh rejected");
            self.discard_tokens();
            return false;
        }

        let tokens: TokenPair = match serde_json::from_str(&response.body) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Malformed token refresh response");
                self.discard_tokens();
                return false;
            }
        };

        if let Err(e) = self
            .store
            .set_token_pair(&tokens.access_token, &tokens.refresh_token)
        {
            warn!(error = %e, "Failed to store refreshed tokens");
            self.discard_tokens();
            return false;
        }

        info!("Access token refreshed");
        true
    }

    fn discard_tokens(&self) {
        if let Err(e) = self.store.clear_token_pair() {
            warn!(error = %e, "Failed to clear tokens after refresh failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{RawResponse, TransportError};
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use std::collections::VecDeque;

    /// Replays canned refresh responses and records how often it was called.
    struct Canned {
        responses: SyncMutex<VecDeque<Result<RawResponse, TransportError>>>,
        calls: AtomicU64,
    }

    impl Canned {
        fn new(responses: Vec<Result<RawResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: SyncMutex::new(responses.into()),
                calls: AtomicU64::new(0),
            })
        }
    }

    #[async_trait]
    impl HttpTransport for Canned {
        async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
            assert_eq!(request.path, REFRESH_PATH);
            assert!(request.bearer.is_none());
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(RawResponse::new(500, "")))
        }
    }

    fn store_with_pair() -> CredentialStore {
        let store = CredentialStore::in_memory();
        store.set_token_pair("old-access", "old-refresh").unwrap();
        store
    }

    #[tokio::test]
    async fn test_no_refresh_token_means_no_network_call() {
        let transport = Canned::new(vec![]);
        let coordinator = RefreshCoordinator::new(transport.clone(), CredentialStore::in_memory());

        assert!(!coordinator.refresh().await);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_overwrites_both_tokens() {
        let transport = Canned::new(vec![Ok(RawResponse::new(
            200,
            r#"{"access_token":"new-access","refresh_token":"new-refresh"}"#,
        ))]);
        let store = store_with_pair();
        let coordinator = RefreshCoordinator::new(transport, store.clone());

        assert!(coordinator.refresh().await);
        assert_eq!(store.access_token().as_deref(), Some("new-access"));
        assert_eq!(store.refresh_token().as_deref(), Some("new-refresh"));
        assert_eq!(coordinator.completed_exchanges(), 1);
    }

    #[tokio::test]
    async fn test_rejection_clears_both_tokens() {
        let transport = Canned::new(vec![Ok(RawResponse::new(401, r#"{"detail":"expired"}"#))]);
        let store = store_with_pair();
        let coordinator = RefreshCoordinator::new(transport, store.clone());

        assert!(!coordinator.refresh().await);
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
    }

    #[tokio::test]
    async fn test_malformed_body_clears_both_tokens() {
        let transport = Canned::new(vec![Ok(RawResponse::new(200, r#"{"access_token":"only"}"#))]);
        let store = store_with_pair();
        let coordinator = RefreshCoordinator::new(transport, store.clone());

        assert!(!coordinator.refresh().await);
        assert!(!store.has_token_pair());
        assert!(store.access_token().is_none());
    }

    #[tokio::test]
    async fn test_network_failure_clears_both_tokens() {
        let transport = Canned::new(vec![Err(TransportError::Connect("refused".into()))]);
        let store = store_with_pair();
        let coordinator = RefreshCoordinator::new(transport, store.clone());

        assert!(!coordinator.refresh().await);
        assert!(store.refresh_token().is_none());
    }

    #[tokio::test]
    async fn test_stale_rejection_shares_finished_exchange() {
        let transport = Canned::new(vec![Ok(RawResponse::new(
            200,
            r#"{"access_token":"a2","refresh_token":"r2"}"#,
        ))]);
        let store = store_with_pair();
        let coordinator = RefreshCoordinator::new(transport.clone(), store.clone());

        let first = coordinator.refresh_after(0, Some("old-access")).await;
        let late = coordinator.refresh_after(0, Some("old-access")).await;

        assert_eq!(first, RefreshRound { refreshed: true, led: true });
        assert_eq!(late, RefreshRound { refreshed: true, led: false });
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.refresh_token().as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn test_replaced_access_token_skips_exchange() {
        let transport = Canned::new(vec![]);
        let store = store_with_pair();
        let coordinator = RefreshCoordinator::new(transport.clone(), store.clone());
        store.set_token_pair("login-access", "login-refresh").unwrap();

        let round = coordinator.refresh_after(0, Some("old-access")).await;

        assert_eq!(round, RefreshRound { refreshed: true, led: false });
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.access_token().as_deref(), Some("login-access"));
    }

    #[tokio::test]
    async fn test_sequential_refreshes_each_exchange() {
        let transport = Canned::new(vec![
            Ok(RawResponse::new(200, r#"{"access_token":"a2","refresh_token":"r2"}"#)),
            Ok(RawResponse::new(200, r#"{"access_token":"a3","refresh_token":"r3"}"#)),
        ]);
        let store = store_with_pair();
        let coordinator = RefreshCoordinator::new(transport.clone(), store.clone());

        assert!(coordinator.refresh().await);
        assert!(coordinator.refresh().await);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.refresh_token().as_deref(), Some("r3"));
    }
}
