//! The `fetch` subcommand: per-item description fragments.

use std::path::PathBuf;
use std::sync::Arc;

use abx_core::{layout, AppConfig};
use abx_export::{collect_items_from_json_dir, run_fetch, FetchOptions};
use abx_session::SessionPool;
use tracing::{error, info, warn};

use crate::select;

pub(crate) async fn run(
    config: &AppConfig,
    filter: &[String],
    input_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    let selected = select::selected_accounts(filter)?;

    let mut failed = 0;
    for (account, credentials) in &selected {
        let json_dir = input_dir
            .clone()
            .unwrap_or_else(|| layout::json_dir(config, &account.id));
        let items = collect_items_from_json_dir(&json_dir);
        if items.is_empty() {
            warn!(account = %account.id, dir = %json_dir.display(), "no items to fetch");
            continue;
        }
        let html_dir = output_dir
            .clone()
            .unwrap_or_else(|| layout::html_dir(config, &account.id));

        let pool =
            match SessionPool::connect(account.clone(), credentials.clone(), config.clone()).await {
                Ok(pool) => Arc::new(pool),
                Err(err) => {
                    error!(account = %account.id, error = %err, "authentication failed");
                    failed += 1;
                    continue;
                }
            };
        let options = FetchOptions {
            workers: workers.unwrap_or(config.fetch_workers),
            queue_depth: config.fetch_queue_depth,
            max_attempts: config.fetch_max_attempts,
            relogin_every: config.fetch_relogin_every,
            ..FetchOptions::default()
        };

        match run_fetch(pool, items, &html_dir, options).await {
            Ok(report) => info!(
                account = %account.id,
                saved = report.saved,
                skipped = report.skipped,
                reconciled = report.reconciled,
                failed = report.failed.len(),
                "fetch run finished"
            ),
            Err(err) => {
                error!(account = %account.id, error = %err, "fetch run aborted");
                failed += 1;
            }
        }
    }
    select::finish(selected.len(), failed)
}
