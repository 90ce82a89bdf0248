//! Session reuse across process runs.
//!
//! A run first tries the persisted cookie snapshot for the account; only
//! when the probe rejects it does a fresh handshake happen. The snapshot
//! on disk always reflects the last session that verified.

use std::path::PathBuf;

use abx_core::accounts::{Account, Credentials};
use abx_core::{layout, AppConfig};
use tracing::{info, warn};

use crate::cookies;
use crate::error::AuthError;
use crate::login;
use crate::session::Session;

pub struct SessionManager {
    config: AppConfig,
}

impl SessionManager {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    fn cookie_path(&self, account: &Account) -> PathBuf {
        layout::cookie_file(&self.config, &account.id)
    }

    /// Returns a verified session, restoring the persisted one when it
    /// still holds and logging in from scratch otherwise.
    ///
    /// # Errors
    ///
    /// Any [`AuthError`]; the caller skips this account and moves on.
    pub async fn ensure_authenticated(
        &self,
        account: &Account,
        credentials: &Credentials,
    ) -> Result<Session, AuthError> {
        let path = self.cookie_path(account);
        match cookies::load_records(&path) {
            Ok(Some(records)) if !records.is_empty() => {
                let session = Session::build(
                    &account.base_url,
                    records,
                    &self.config.user_agent,
                    self.config.http_timeout_secs,
                )?;
                if login::probe_restored_session(&session).await? {
                    info!(account = %account.id, "restored persisted session");
                    return Ok(session);
                }
                info!(account = %account.id, "persisted session rejected, logging in");
            }
            Ok(_) => {}
            Err(err) => {
                warn!(account = %account.id, error = %err, "ignoring unreadable cookie file");
            }
        }
        self.force_login(account, credentials).await
    }

    /// Runs the handshake unconditionally and persists the fresh snapshot.
    /// Used on startup with `login --account` and whenever expiry is
    /// detected mid-run.
    ///
    /// # Errors
    ///
    /// Any [`AuthError`].
    pub async fn force_login(
        &self,
        account: &Account,
        credentials: &Credentials,
    ) -> Result<Session, AuthError> {
        let session = login::login(account, credentials, &self.config).await?;
        let path = self.cookie_path(account);
        cookies::save_records(&path, &session.snapshot())?;
        info!(account = %account.id, path = %path.display(), "session persisted");
        Ok(session)
    }
}
