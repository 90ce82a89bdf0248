//! Bulk extraction against the merchant back office: entity discovery,
//! item-id enumeration, CSV export and per-item HTML fragment fetching.

pub mod csv_count;
pub mod definition;
pub mod discover;
pub mod driver;
pub mod enumerate;
pub mod error;
pub mod fetch;
pub mod payload;

pub use definition::{resolve_export_config, ExportConfig, ExportOverrides};
pub use discover::{fetch_catalog_entities, fetch_lister_entities};
pub use driver::{
    discover_tasks, download_csv, run_export, ExportKind, ExportOptions, ExportReport, ExportTask,
};
pub use enumerate::{enumerate_entities, fetch_item_ids, lister_page_query, EnumerateOutcome};
pub use error::ExportError;
pub use fetch::{collect_items_from_json_dir, run_fetch, FetchItem, FetchOptions, FetchReport};
