//! On-disk layout: where entity lists, item-id envelopes, CSV exports and
//! derived artifacts live for each account.
//!
//! Catalog and lister pipelines write to parallel, suffix-separated trees so
//! one run can never clobber the other's output.

use std::path::PathBuf;

use crate::app_config::AppConfig;
use crate::entity::EntityKind;

fn kind_tag(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Catalog => "P",
        EntityKind::Lister => "L",
    }
}

/// The discovered entity list for one account and taxonomy, e.g.
/// `Fabriks/JV_F_P/factories.json`.
#[must_use]
pub fn entities_file(config: &AppConfig, account_id: &str, kind: EntityKind) -> PathBuf {
    let file = match kind {
        EntityKind::Catalog => "factories.json",
        EntityKind::Lister => "collections.json",
    };
    config
        .entities_dir
        .join(format!("{account_id}_F_{}", kind_tag(kind)))
        .join(file)
}

/// The directory holding per-entity item-id envelopes, e.g. `itemsF/JV_I_P`.
#[must_use]
pub fn items_dir(config: &AppConfig, account_id: &str, kind: EntityKind) -> PathBuf {
    config
        .items_dir
        .join(format!("{account_id}_I_{}", kind_tag(kind)))
}

/// The directory CSV exports land in, e.g. `CSVDATA/JV_P`.
#[must_use]
pub fn csv_dir(config: &AppConfig, account_id: &str, kind: EntityKind) -> PathBuf {
    config
        .csv_dir
        .join(format!("{account_id}_{}", kind_tag(kind)))
}

/// Per-account directory of JSON records derived from exported CSVs.
#[must_use]
pub fn json_dir(config: &AppConfig, account_id: &str) -> PathBuf {
    config.json_dir.join(account_id)
}

/// Per-account directory of fetched description pages.
#[must_use]
pub fn html_dir(config: &AppConfig, account_id: &str) -> PathBuf {
    config.html_dir.join(account_id)
}

/// The persisted cookie snapshot for one account, e.g.
/// `sessions/jv_cookies.json`.
#[must_use]
pub fn cookie_file(config: &AppConfig, account_id: &str) -> PathBuf {
    config
        .session_dir
        .join(format!("{}_cookies.json", account_id.to_lowercase()))
}
