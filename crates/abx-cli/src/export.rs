//! The `export` subcommand: one CSV per enumerated entity.

use std::path::PathBuf;

use abx_core::{layout, AppConfig};
use abx_export::{
    discover_tasks, resolve_export_config, run_export, ExportKind, ExportOptions, ExportOverrides,
};
use abx_session::SessionPool;
use clap::{Args, ValueEnum};
use tracing::{error, info, warn};

use crate::select;

#[derive(Debug, Args)]
pub(crate) struct ExportArgs {
    #[arg(long = "account")]
    accounts: Vec<String>,
    #[arg(long, value_enum, default_value_t = Kind::Product)]
    kind: Kind,
    /// Restrict to these entity ids; repeatable.
    #[arg(long = "entity-id")]
    entity_ids: Vec<String>,
    /// Restrict to entities whose name contains this; repeatable.
    #[arg(long = "entity-name")]
    entity_names: Vec<String>,
    /// Export at most N entities per account.
    #[arg(long)]
    limit: Option<usize>,
    /// Override the per-account CSV directory.
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Leave entities with an existing CSV untouched.
    #[arg(long, conflicts_with = "refresh_existing")]
    skip_existing: bool,
    /// Delete existing CSVs and their derived artifacts, then re-export.
    #[arg(long)]
    refresh_existing: bool,
    /// List what would be exported without touching the network.
    #[arg(long)]
    dry_run: bool,
    /// Force a re-login before every short-count retry.
    #[arg(long)]
    relogin_between_retries: bool,
    #[arg(long)]
    definition_id: Option<String>,
    #[arg(long)]
    export_format_id: Option<String>,
    #[arg(long)]
    expprod: Option<String>,
    #[arg(long)]
    export_encoding: Option<String>,
    #[arg(long)]
    save_export_encoding: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Product,
    Lister,
}

pub(crate) async fn run(config: &AppConfig, args: ExportArgs) -> anyhow::Result<()> {
    let selected = select::selected_accounts(&args.accounts)?;
    let kind = match args.kind {
        Kind::Product => ExportKind::Product,
        Kind::Lister => ExportKind::Lister,
    };
    let overrides = ExportOverrides {
        definition_id: args.definition_id.clone(),
        export_format_id: args.export_format_id.clone(),
        export_encoding: args.export_encoding.clone(),
        save_export_encoding: args.save_export_encoding.clone(),
        expprod: args.expprod.clone(),
    };
    let options = ExportOptions {
        skip_existing: args.skip_existing,
        refresh_existing: args.refresh_existing,
        relogin_between_retries: args.relogin_between_retries,
    };

    let mut failed = 0;
    for (account, credentials) in &selected {
        let items_dir = layout::items_dir(config, &account.id, kind.entity_kind());
        let tasks = discover_tasks(&items_dir, &args.entity_ids, &args.entity_names, args.limit);
        if tasks.is_empty() {
            warn!(account = %account.id, dir = %items_dir.display(), "no matching envelopes");
            continue;
        }
        let output_dir = args
            .output_dir
            .clone()
            .unwrap_or_else(|| layout::csv_dir(config, &account.id, kind.entity_kind()));

        if args.dry_run {
            for task in &tasks {
                println!(
                    "{}: {} ({}, {} items) -> {}",
                    account.id,
                    task.entity_name,
                    task.entity_id,
                    task.expected_count(),
                    output_dir.join(task.default_filename()).display()
                );
            }
            continue;
        }

        let pool =
            match SessionPool::connect(account.clone(), credentials.clone(), config.clone()).await {
                Ok(pool) => pool,
                Err(err) => {
                    error!(account = %account.id, error = %err, "authentication failed");
                    failed += 1;
                    continue;
                }
            };
        let export_config = {
            let session = match pool.checkout().await {
                Ok((session, _)) => session,
                Err(err) => {
                    error!(account = %account.id, error = %err, "session checkout failed");
                    failed += 1;
                    continue;
                }
            };
            match resolve_export_config(&session, kind, &overrides).await {
                Ok(export_config) => export_config,
                Err(err) => {
                    error!(account = %account.id, error = %err, "definition resolution failed");
                    failed += 1;
                    continue;
                }
            }
        };

        match run_export(&pool, kind, &tasks, &output_dir, &export_config, config, options).await {
            Ok(report) => {
                info!(
                    account = %account.id,
                    succeeded = report.succeeded,
                    skipped = report.skipped,
                    failed = report.failed.len(),
                    "export run finished"
                );
                if report.succeeded == 0 && report.skipped == 0 && !report.failed.is_empty() {
                    failed += 1;
                }
            }
            Err(err) => {
                error!(account = %account.id, error = %err, "export run aborted");
                failed += 1;
            }
        }
    }
    select::finish(selected.len(), failed)
}
