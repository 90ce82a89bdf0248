//! The `discover` subcommand: persist the catalog and lister entity lists.

use abx_core::accounts::Account;
use abx_core::{entity, layout, AppConfig, EntityKind};
use abx_export::{fetch_catalog_entities, fetch_lister_entities};
use abx_session::{Session, SessionManager};
use tracing::{error, info};

use crate::select;
use crate::Target;

pub(crate) async fn run(config: &AppConfig, filter: &[String], target: Target) -> anyhow::Result<()> {
    let selected = select::selected_accounts(filter)?;
    let manager = SessionManager::new(config.clone());

    let mut failed = 0;
    for (account, credentials) in &selected {
        let session = match manager.ensure_authenticated(account, credentials).await {
            Ok(session) => session,
            Err(err) => {
                error!(account = %account.id, error = %err, "authentication failed");
                failed += 1;
                continue;
            }
        };
        if let Err(err) = discover_account(config, account, &session, target).await {
            error!(account = %account.id, error = %err, "discovery failed");
            failed += 1;
        }
    }
    select::finish(selected.len(), failed)
}

async fn discover_account(
    config: &AppConfig,
    account: &Account,
    session: &Session,
    target: Target,
) -> anyhow::Result<()> {
    if matches!(target, Target::Catalog | Target::All) {
        let entities = fetch_catalog_entities(session).await?;
        let path = layout::entities_file(config, &account.id, EntityKind::Catalog);
        entity::save_entities(&path, &entities)?;
        info!(
            account = %account.id,
            count = entities.len(),
            path = %path.display(),
            "catalog factories saved"
        );
    }
    if matches!(target, Target::Lister | Target::All) {
        let entities = fetch_lister_entities(session).await?;
        let path = layout::entities_file(config, &account.id, EntityKind::Lister);
        entity::save_entities(&path, &entities)?;
        info!(
            account = %account.id,
            count = entities.len(),
            path = %path.display(),
            "lister collections saved"
        );
    }
    Ok(())
}
