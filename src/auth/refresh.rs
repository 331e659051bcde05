use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::models::AuthTokens;

use super::{Session, SessionStore};

/// The refresh half of the auth endpoint contract: exchange a refresh
/// token for a new token pair. Implemented by the API client; mocked
/// in tests. Safe to call at most once per refresh cycle.
#[async_trait]
pub trait RefreshBackend: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, ApiError>;
}

/// What a failed request should do after the coordinator has had a
/// look at its authorization failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// New credentials are in place; replay the request once.
    Retry,
    /// The session could not be recovered; surface the original error.
    GiveUp,
}

/// Serializes token refreshes across concurrently failing requests.
///
/// Any number of requests may hit an authorization failure while the
/// session is stale; exactly one refresh call goes out per cycle. The
/// mechanics: a failing request snapshots the store generation, then
/// queues on the refresh guard. The task that gets the guard first
/// performs the refresh (or forces logout); every task behind it sees
/// the generation move and resolves off the settled outcome instead of
/// refreshing again.
pub struct RefreshCoordinator {
    store: SessionStore,
    guard: Mutex<()>,
}

impl RefreshCoordinator {
    pub fn new(store: SessionStore) -> Self {
        Self {
            store,
            guard: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Called by a request that just failed with an authorization
    /// error. Returns when the refresh cycle this failure belongs to
    /// has settled, one way or the other.
    pub async fn recover(&self, backend: &dyn RefreshBackend) -> Recovery {
        let observed = self.store.generation();
        let _guard = self.guard.lock().await;

        // Another task settled this cycle while we waited: replay if
        // it left us with credentials, otherwise fail with the
        // original error.
        if self.store.generation() != observed {
            return if self.store.is_authenticated() {
                Recovery::Retry
            } else {
                Recovery::GiveUp
            };
        }

        let session = self.store.current();
        let Some(refresh_token) = session.refresh_token().map(str::to_owned) else {
            debug!("authorization failure on an anonymous session, nothing to refresh");
            return Recovery::GiveUp;
        };

        if !session.is_refreshable() {
            warn!("access token issued too long ago to refresh, forcing logout");
            self.store.clear();
            return Recovery::GiveUp;
        }

        debug!("starting token refresh");
        let pre_refresh = self.store.generation();
        let outcome = backend.refresh(&refresh_token).await;

        // The session was replaced or cleared (say, an independent
        // logout) while the refresh call was in flight. The settlement
        // of an abandoned refresh must be a no-op: do not write the
        // stale result over the newer state.
        if self.store.generation() != pre_refresh {
            debug!("session changed during refresh, discarding result");
            return Recovery::GiveUp;
        }

        match outcome {
            Ok(tokens) => {
                match Session::authenticated(tokens.access_token, tokens.refresh_token) {
                    Ok(next) => {
                        self.store.replace(next);
                        debug!("token refresh succeeded");
                        Recovery::Retry
                    }
                    Err(error) => {
                        warn!(%error, "refresh returned an undecodable access token, forcing logout");
                        self.store.clear();
                        Recovery::GiveUp
                    }
                }
            }
            Err(error) => {
                warn!(%error, "token refresh failed, forcing logout");
                self.store.clear();
                Recovery::GiveUp
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;

    use super::super::session::test_jwt;
    use super::*;

    /// Mock refresh endpoint: counts calls, optionally fails, and
    /// holds each call long enough for concurrent failures to pile up
    /// behind the guard.
    struct MockBackend {
        calls: AtomicUsize,
        fail: AtomicBool,
        delay_ms: u64,
    }

    impl MockBackend {
        fn new(delay_ms: u64) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                delay_ms,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RefreshBackend for MockBackend {
        async fn refresh(&self, _refresh_token: &str) -> Result<AuthTokens, ApiError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            if self.fail.load(Ordering::SeqCst) {
                Err(ApiError::Unauthorized)
            } else {
                Ok(AuthTokens {
                    access_token: test_jwt(Utc::now().timestamp(), "User", &format!("new-{}", n)),
                    refresh_token: format!("refresh-{}", n + 1),
                })
            }
        }
    }

    fn store_with_fresh_session() -> SessionStore {
        let store = SessionStore::new();
        let session =
            Session::authenticated(test_jwt(Utc::now().timestamp(), "User", "seed"), "refresh-0".into())
                .unwrap();
        store.replace(session);
        store
    }

    #[tokio::test]
    async fn test_single_refresh_for_concurrent_failures() {
        let coordinator = Arc::new(RefreshCoordinator::new(store_with_fresh_session()));
        let backend = Arc::new(MockBackend::new(50));

        let (a, b, c) = tokio::join!(
            coordinator.recover(backend.as_ref()),
            coordinator.recover(backend.as_ref()),
            coordinator.recover(backend.as_ref()),
        );

        assert_eq!(backend.calls(), 1);
        assert_eq!(a, Recovery::Retry);
        assert_eq!(b, Recovery::Retry);
        assert_eq!(c, Recovery::Retry);
        assert_eq!(
            coordinator.store().current().refresh_token(),
            Some("refresh-1")
        );
    }

    #[tokio::test]
    async fn test_stale_session_short_circuits_refresh() {
        let store = SessionStore::new();
        let old = (Utc::now() - chrono::Duration::hours(25)).timestamp();
        store.replace(Session::authenticated(test_jwt(old, "User", "a"), "r".into()).unwrap());

        let coordinator = RefreshCoordinator::new(store);
        let backend = MockBackend::new(0);
        let mut logout = coordinator.store().logout_watcher();

        assert_eq!(coordinator.recover(&backend).await, Recovery::GiveUp);
        assert_eq!(backend.calls(), 0);
        assert!(!coordinator.store().is_authenticated());
        assert!(*logout.borrow_and_update());
    }

    #[tokio::test]
    async fn test_anonymous_session_gives_up_without_logout() {
        let coordinator = RefreshCoordinator::new(SessionStore::new());
        let backend = MockBackend::new(0);
        let logout = coordinator.store().logout_watcher();

        assert_eq!(coordinator.recover(&backend).await, Recovery::GiveUp);
        assert_eq!(backend.calls(), 0);
        // No session to clear: no forced-logout signal either.
        assert!(!*logout.borrow());
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_session_for_all_waiters() {
        let coordinator = Arc::new(RefreshCoordinator::new(store_with_fresh_session()));
        let backend = Arc::new(MockBackend::new(50));
        backend.fail.store(true, Ordering::SeqCst);

        let (a, b, c) = tokio::join!(
            coordinator.recover(backend.as_ref()),
            coordinator.recover(backend.as_ref()),
            coordinator.recover(backend.as_ref()),
        );

        assert_eq!(backend.calls(), 1);
        assert_eq!(a, Recovery::GiveUp);
        assert_eq!(b, Recovery::GiveUp);
        assert_eq!(c, Recovery::GiveUp);
        assert!(!coordinator.store().is_authenticated());
        assert!(*coordinator.store().logout_watcher().borrow());
    }

    #[tokio::test]
    async fn test_independent_logout_during_refresh_is_not_overwritten() {
        let coordinator = Arc::new(RefreshCoordinator::new(store_with_fresh_session()));
        let backend = Arc::new(MockBackend::new(100));
        let store = coordinator.store().clone();

        // User logs out while the refresh call is still in flight; the
        // refresh settles against a cleared session and must not
        // resurrect it.
        let (outcome, _) = tokio::join!(coordinator.recover(backend.as_ref()), async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            store.clear();
        });

        assert_eq!(backend.calls(), 1);
        assert_eq!(outcome, Recovery::GiveUp);
        assert!(!coordinator.store().is_authenticated());
        assert!(*coordinator.store().logout_watcher().borrow());
    }

    #[tokio::test]
    async fn test_new_cycle_possible_after_settled_cycle() {
        let coordinator = RefreshCoordinator::new(store_with_fresh_session());
        let backend = MockBackend::new(0);

        // Failure cycle first.
        backend.fail.store(true, Ordering::SeqCst);
        assert_eq!(coordinator.recover(&backend).await, Recovery::GiveUp);
        assert_eq!(backend.calls(), 1);

        // Fresh login, and the next failure starts a brand-new cycle.
        let session =
            Session::authenticated(test_jwt(Utc::now().timestamp(), "User", "again"), "refresh-9".into())
                .unwrap();
        coordinator.store().replace(session);
        backend.fail.store(false, Ordering::SeqCst);

        assert_eq!(coordinator.recover(&backend).await, Recovery::Retry);
        assert_eq!(backend.calls(), 2);
    }
}
