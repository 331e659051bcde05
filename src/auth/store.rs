use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::debug;

use super::Session;

/// Session file name in the cache directory
const SESSION_FILE: &str = "session.json";

/// Process-wide owner of the current [`Session`].
///
/// The store is the only writer of session state. Writes are whole
/// replacements (`replace`/`clear`), never partial merges, so a slow
/// login racing a refresh can't interleave half a session. Every write
/// bumps a generation counter, which the refresh coordinator uses to
/// detect that another task already settled a refresh cycle.
///
/// Clones share the same underlying state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    session: RwLock<Session>,
    generation: AtomicU64,
    logout_tx: watch::Sender<bool>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (logout_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                session: RwLock::new(Session::anonymous()),
                generation: AtomicU64::new(0),
                logout_tx,
            }),
        }
    }

    /// Snapshot of the current session.
    pub fn current(&self) -> Session {
        self.inner
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current().is_authenticated()
    }

    /// Replace the session wholesale (login, registration, refresh
    /// success). Resets any pending forced-logout signal.
    pub fn replace(&self, session: Session) {
        {
            let mut guard = self
                .inner
                .session
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            *guard = session;
        }
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.logout_tx.send_replace(false);
        debug!("session replaced");
    }

    /// Clear the session and signal a forced logout (logout, stale
    /// session, refresh failure). Watchers are expected to redirect to
    /// the authentication entry point.
    pub fn clear(&self) {
        {
            let mut guard = self
                .inner
                .session
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            *guard = Session::anonymous();
        }
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.logout_tx.send_replace(true);
        debug!("session cleared, logout signaled");
    }

    /// Monotonic counter bumped on every `replace`/`clear`.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Receiver for the forced-logout signal. `true` means the session
    /// was cleared and the user should be sent to the login screen.
    pub fn logout_watcher(&self) -> watch::Receiver<bool> {
        self.inner.logout_tx.subscribe()
    }

    /// Save the current session to `dir/session.json`.
    pub fn save_to(&self, dir: &Path) -> Result<()> {
        let session = self.current();
        let path = session_path(dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&session)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write session file {}", path.display()))?;
        Ok(())
    }

    /// Restore a previously saved session from `dir/session.json`.
    ///
    /// Returns true if a usable session was restored. Sessions past
    /// the refresh-age limit are ignored; there is no point restoring
    /// tokens the server is guaranteed to reject.
    pub fn restore_from(&self, dir: &Path) -> Result<bool> {
        let path = session_path(dir);
        if !path.exists() {
            return Ok(false);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read session file {}", path.display()))?;
        let session: Session =
            serde_json::from_str(&contents).context("Failed to parse session file")?;

        if session.is_refreshable() {
            self.replace(session);
            Ok(true)
        } else {
            debug!("persisted session too old, ignoring");
            Ok(false)
        }
    }

    /// Remove the persisted session file, if any.
    pub fn remove_persisted(&self, dir: &Path) -> Result<()> {
        let path = session_path(dir);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn session_path(dir: &Path) -> PathBuf {
    dir.join(SESSION_FILE)
}

#[cfg(test)]
mod tests {
    use super::super::session::test_jwt;
    use super::*;
    use chrono::{Duration, Utc};

    fn fresh_session(jti: &str) -> Session {
        Session::authenticated(test_jwt(Utc::now().timestamp(), "User", jti), "r".into()).unwrap()
    }

    #[test]
    fn test_replace_and_clear_bump_generation() {
        let store = SessionStore::new();
        assert_eq!(store.generation(), 0);

        store.replace(fresh_session("a"));
        assert_eq!(store.generation(), 1);
        assert!(store.is_authenticated());

        store.clear();
        assert_eq!(store.generation(), 2);
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_clear_signals_logout_and_replace_resets_it() {
        let store = SessionStore::new();
        let rx = store.logout_watcher();
        assert!(!*rx.borrow());

        store.clear();
        assert!(*rx.borrow());

        store.replace(fresh_session("a"));
        assert!(!*rx.borrow());
    }

    #[test]
    fn test_clones_share_state() {
        let store = SessionStore::new();
        let other = store.clone();
        store.replace(fresh_session("a"));
        assert!(other.is_authenticated());
        assert_eq!(other.generation(), 1);
    }

    #[test]
    fn test_persist_roundtrip() {
        let dir = std::env::temp_dir().join(format!("pawbase-test-{}", std::process::id()));
        let store = SessionStore::new();
        store.replace(fresh_session("a"));
        store.save_to(&dir).unwrap();

        let restored = SessionStore::new();
        assert!(restored.restore_from(&dir).unwrap());
        assert_eq!(
            restored.current().access_token(),
            store.current().access_token()
        );

        store.remove_persisted(&dir).unwrap();
        assert!(!SessionStore::new().restore_from(&dir).unwrap());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_restore_ignores_stale_session() {
        let dir = std::env::temp_dir().join(format!("pawbase-stale-{}", std::process::id()));
        let old = (Utc::now() - Duration::hours(30)).timestamp();
        let session = Session::authenticated(test_jwt(old, "User", "a"), "r".into()).unwrap();

        let store = SessionStore::new();
        store.replace(session);
        store.save_to(&dir).unwrap();

        let restored = SessionStore::new();
        assert!(!restored.restore_from(&dir).unwrap());
        assert!(!restored.is_authenticated());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
