//! The `login` subcommand: unconditional fresh handshakes.

use abx_core::AppConfig;
use abx_session::SessionManager;
use tracing::{error, info};

use crate::select;

pub(crate) async fn run(config: &AppConfig, filter: &[String]) -> anyhow::Result<()> {
    let selected = select::selected_accounts(filter)?;
    let manager = SessionManager::new(config.clone());

    let mut failed = 0;
    for (account, credentials) in &selected {
        match manager.force_login(account, credentials).await {
            Ok(_) => info!(account = %account.id, "login complete"),
            Err(err) => {
                error!(account = %account.id, error = %err, "login failed");
                failed += 1;
            }
        }
    }
    select::finish(selected.len(), failed)
}
