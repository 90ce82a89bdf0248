//! The `items` subcommand: enumerate item ids per lister collection.

use std::collections::HashMap;

use abx_core::{entity, layout, AppConfig, EntityKind};
use abx_export::{enumerate_entities, fetch_lister_entities, EnumerateOutcome};
use abx_session::SessionManager;
use tracing::{error, info, warn};

use crate::select;

pub(crate) async fn run(
    config: &AppConfig,
    filter: &[String],
    limit: Option<usize>,
    verbose: bool,
) -> anyhow::Result<()> {
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

        // Prefer the discovered list on disk; fall back to a live fetch.
        let entities_path = layout::entities_file(config, &account.id, EntityKind::Lister);
        let mut entities = if entities_path.is_file() {
            match entity::load_entities(&entities_path) {
                Ok(entities) => entities,
                Err(err) => {
                    error!(account = %account.id, error = %err, "unreadable collection list");
                    failed += 1;
                    continue;
                }
            }
        } else {
            match fetch_lister_entities(&session).await {
                Ok(entities) => entities,
                Err(err) => {
                    error!(account = %account.id, error = %err, "collection discovery failed");
                    failed += 1;
                    continue;
                }
            }
        };
        if let Some(limit) = limit {
            entities.truncate(limit);
        }
        if entities.is_empty() {
            warn!(account = %account.id, "no lister collections to enumerate");
            continue;
        }

        let items_dir = layout::items_dir(config, &account.id, EntityKind::Lister);
        let mut outcomes =
            enumerate_entities(&session, &entities, &items_dir, config.enumerate_workers).await;

        // One retry pass over everything that failed the first time.
        let retry: Vec<_> = outcomes
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.entity.clone())
            .collect();
        if !retry.is_empty() {
            info!(account = %account.id, pending = retry.len(), "retrying failed enumerations");
            let second =
                enumerate_entities(&session, &retry, &items_dir, config.enumerate_workers).await;
            let recovered: HashMap<String, EnumerateOutcome> = second
                .into_iter()
                .map(|o| (o.entity.id.clone(), o))
                .collect();
            for outcome in &mut outcomes {
                if outcome.result.is_err() {
                    if let Some(second) = recovered.get(&outcome.entity.id) {
                        if let Ok(ok) = &second.result {
                            outcome.result = Ok(ok.clone());
                        }
                    }
                }
            }
        }

        let counts: HashMap<&str, usize> = outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|(count, _)| (o.entity.id.as_str(), *count)))
            .collect();
        for entity in &mut entities {
            if let Some(count) = counts.get(entity.id.as_str()) {
                entity.item_count = Some(*count);
            }
        }
        if let Err(err) = entity::save_entities(&entities_path, &entities) {
            warn!(account = %account.id, error = %err, "could not update collection counts");
        }

        if verbose {
            for outcome in &outcomes {
                if let Ok((count, path)) = &outcome.result {
                    println!(
                        "{} {} ({}): {count} items -> {}",
                        account.id,
                        outcome.entity.name,
                        outcome.entity.id,
                        path.display()
                    );
                }
            }
        }

        let unresolved = outcomes.iter().filter(|o| o.result.is_err()).count();
        info!(
            account = %account.id,
            collections = entities.len(),
            failed = unresolved,
            "enumeration finished"
        );
        if unresolved == outcomes.len() {
            failed += 1;
        }
    }
    select::finish(selected.len(), failed)
}
