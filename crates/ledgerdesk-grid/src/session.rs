//! Session-invalid handling: clear the token and redirect to login once.
//!
//! # Design
//! - Several requests can fail with an invalid session at the same moment; the latch records
//!   the rejected token so only the first failure clears the store and navigates.
//! - A different token in the store re-arms the latch on its own, so hosts that save new
//!   credentials without calling [`SessionGuard::rearm`] still get the next redirect.
//! - A late rejection of an older token never clears a newer one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::auth::TokenStore;

/// Externally supplied navigation capability.
pub trait Navigator: Send + Sync {
    /// Move the user to `path`.
    fn navigate_to(&self, path: &str);
}

/// Coordinates token removal and the login redirect.
pub struct SessionGuard {
    store: Arc<dyn TokenStore>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    /// Token whose rejection caused the last redirect.
    tripped_by: Mutex<Option<String>>,
}

impl SessionGuard {
    /// Build a guard over the shared token store.
    #[must_use]
    pub fn new(
        store: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            store,
            navigator,
            login_path: login_path.into(),
            tripped_by: Mutex::new(None),
        }
    }

    /// Handle an invalid-session response for a request sent with `rejected`.
    /// Returns `true` for the call that performed the redirect and `false` for
    /// repeats and for rejections of a token that has since been replaced.
    pub fn invalidate(&self, status: u16, rejected: &str) -> bool {
        {
            let mut tripped_by = self.latch();
            let current = match self.store.auth_token() {
                Ok(current) => current,
                Err(err) => {
                    tracing::warn!(error = %err, "token store unreadable during invalidation");
                    None
                }
            };
            if current.as_deref().is_some_and(|token| token != rejected) {
                tracing::debug!(status, "rejection of a replaced token ignored");
                return false;
            }
            if tripped_by.as_deref() == Some(rejected)
                || (current.is_none() && tripped_by.is_some())
            {
                tracing::debug!(status, "session already invalidated");
                return false;
            }
            *tripped_by = Some(rejected.to_string());
            if let Err(err) = self.store.clear() {
                tracing::warn!(error = %err, "failed to clear stored credentials");
            }
        }
        tracing::info!(
            status,
            login_path = %self.login_path,
            "session invalidated; redirecting to login"
        );
        self.navigator.navigate_to(&self.login_path);
        true
    }

    /// Allow the next invalid-session response to redirect again.
    pub fn rearm(&self) {
        *self.latch() = None;
    }

    /// Whether a redirect has happened since the last re-arm.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.latch().is_some()
    }

    /// Path the guard redirects to.
    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Shared token store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    fn latch(&self) -> MutexGuard<'_, Option<String>> {
        self.tripped_by.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("login_path", &self.login_path)
            .field("tripped", &self.is_tripped())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;
    use std::thread;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Navigator for Recorder {
        fn navigate_to(&self, path: &str) {
            self.0
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(path.to_string());
        }
    }

    impl Recorder {
        fn visits(&self) -> Vec<String> {
            self.0
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone()
        }
    }

    #[test]
    fn invalidate_clears_token_and_navigates_once() {
        let store = Arc::new(MemoryTokenStore::with_token("stale"));
        let navigator = Arc::new(Recorder::default());
        let guard = SessionGuard::new(store.clone(), navigator.clone(), "/login");

        assert!(guard.invalidate(401, "stale"));
        assert!(!guard.invalidate(401, "stale"));
        assert_eq!(store.auth_token().expect("read"), None);
        assert_eq!(navigator.visits(), vec!["/login".to_string()]);
    }

    #[test]
    fn concurrent_invalidations_redirect_once() {
        let store = Arc::new(MemoryTokenStore::with_token("stale"));
        let navigator = Arc::new(Recorder::default());
        let guard = Arc::new(SessionGuard::new(store, navigator.clone(), "/login"));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let guard = Arc::clone(&guard);
                thread::spawn(move || guard.invalidate(401, "stale"))
            })
            .collect();
        let redirects = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .filter(|redirected| *redirected)
            .count();

        assert_eq!(redirects, 1);
        assert_eq!(navigator.visits().len(), 1);
    }

    #[test]
    fn rearm_allows_a_later_redirect() {
        let navigator = Arc::new(Recorder::default());
        let guard = SessionGuard::new(
            Arc::new(MemoryTokenStore::new()),
            navigator.clone(),
            "/login",
        );
        assert!(guard.invalidate(401, "first"));
        guard.rearm();
        assert!(!guard.is_tripped());
        assert!(guard.invalidate(419, "first"));
        assert_eq!(navigator.visits().len(), 2);
    }

    #[test]
    fn saving_a_new_token_rearms_without_explicit_call() {
        let store = Arc::new(MemoryTokenStore::with_token("first"));
        let navigator = Arc::new(Recorder::default());
        let guard = SessionGuard::new(store.clone(), navigator.clone(), "/login");

        assert!(guard.invalidate(401, "first"));
        store
            .save(&crate::auth::Credentials::new("second", None))
            .expect("save");
        assert!(guard.invalidate(401, "second"));
        assert_eq!(store.auth_token().expect("read"), None);
        assert_eq!(navigator.visits().len(), 2);
    }

    #[test]
    fn late_rejection_of_old_token_keeps_new_one() {
        let store = Arc::new(MemoryTokenStore::with_token("first"));
        let navigator = Arc::new(Recorder::default());
        let guard = SessionGuard::new(store.clone(), navigator.clone(), "/login");

        assert!(guard.invalidate(401, "first"));
        store
            .save(&crate::auth::Credentials::new("second", None))
            .expect("save");
        assert!(!guard.invalidate(401, "first"));
        assert_eq!(store.auth_token().expect("read"), Some("second".to_string()));
        assert_eq!(navigator.visits().len(), 1);
    }
}
