//! Shared session state for concurrent workers.
//!
//! Workers clone sessions from one canonical cookie snapshot instead of
//! each logging in on its own. When a worker detects expiry it reports the
//! generation it was holding; only the first report per generation triggers
//! a re-login, every later one reuses the fresh snapshot.

use std::sync::atomic::{AtomicUsize, Ordering};

use abx_core::accounts::{Account, Credentials};
use abx_core::AppConfig;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cookies::CookieRecord;
use crate::error::AuthError;
use crate::lifecycle::SessionManager;
use crate::session::Session;

struct PoolState {
    generation: u64,
    snapshot: Vec<CookieRecord>,
}

pub struct SessionPool {
    account: Account,
    credentials: Credentials,
    config: AppConfig,
    manager: SessionManager,
    state: Mutex<PoolState>,
    processed: AtomicUsize,
}

impl SessionPool {
    /// Authenticates once (restoring a persisted session when possible)
    /// and seeds the pool with that snapshot.
    ///
    /// # Errors
    ///
    /// Any [`AuthError`] from the initial authentication.
    pub async fn connect(
        account: Account,
        credentials: Credentials,
        config: AppConfig,
    ) -> Result<Self, AuthError> {
        let manager = SessionManager::new(config.clone());
        let session = manager.ensure_authenticated(&account, &credentials).await?;
        Ok(Self {
            account,
            credentials,
            config,
            manager,
            state: Mutex::new(PoolState {
                generation: 1,
                snapshot: session.snapshot(),
            }),
            processed: AtomicUsize::new(0),
        })
    }

    /// Builds a worker session from the current snapshot and returns it
    /// with the generation it was built from.
    ///
    /// # Errors
    ///
    /// [`AuthError::Http`] when the client cannot be constructed.
    pub async fn checkout(&self) -> Result<(Session, u64), AuthError> {
        let state = self.state.lock().await;
        let session = self.build_from(&state.snapshot)?;
        Ok((session, state.generation))
    }

    /// Replaces an expired session. Single-flight per generation: the lock
    /// holder whose observed generation is still current re-logs in; every
    /// caller that raced it gets the already-refreshed snapshot.
    ///
    /// # Errors
    ///
    /// Any [`AuthError`] from the re-login.
    pub async fn refresh(&self, observed_generation: u64) -> Result<(Session, u64), AuthError> {
        let mut state = self.state.lock().await;
        if state.generation > observed_generation {
            debug!(
                account = %self.account.id,
                generation = state.generation,
                "reusing snapshot refreshed by another worker"
            );
            let session = self.build_from(&state.snapshot)?;
            return Ok((session, state.generation));
        }

        info!(account = %self.account.id, "session expired, re-authenticating");
        let session = self
            .manager
            .force_login(&self.account, &self.credentials)
            .await?;
        state.snapshot = session.snapshot();
        state.generation += 1;
        Ok((session, state.generation))
    }

    /// Counts a processed item; returns true every `relogin_every` items
    /// so callers can refresh proactively before the server drops them.
    pub fn note_processed(&self, relogin_every: usize) -> bool {
        let count = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        relogin_every > 0 && count % relogin_every == 0
    }

    #[must_use]
    pub fn account(&self) -> &Account {
        &self.account
    }

    fn build_from(&self, snapshot: &[CookieRecord]) -> Result<Session, AuthError> {
        Session::build(
            &self.account.base_url,
            snapshot.to_vec(),
            &self.config.user_agent,
            self.config.http_timeout_secs,
        )
    }
}
