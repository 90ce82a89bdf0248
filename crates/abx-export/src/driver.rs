//! The CSV export driver.
//!
//! An export is a replay of the browser's two-step flow: prime the result
//! list with the entity filter, POST the row selection, then POST the
//! export request and stream the CSV to disk. The row count of the file is
//! verified against the enumeration envelope; short files get one
//! immediate retry, and everything still failing is retried once more in
//! an aggregated pass with a fresh session at the end of the run.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use abx_core::entity::ItemIdList;
use abx_core::filename::csv_filename;
use abx_core::{layout, AppConfig};
use abx_session::{markup, Session, SessionPool};
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE, ORIGIN, REFERER};
use tracing::{debug, error, info, warn};

use crate::csv_count;
use crate::definition::{ExportConfig, EXPORT_ENDPOINT};
use crate::error::ExportError;
use crate::payload;

const PRODUCT_PAGE: &str = "/afterbuy/shop/produkte.aspx";
const LISTER_PAGE: &str = "/afterbuy/ebayliste2.aspx";
const PREVIEW_LEN: usize = 200;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_CSV: &str = "text/csv, text/plain, application/octet-stream, */*;q=0.8";

/// The two export flavors. They differ in priming URL, selection payload
/// shape and preferred export definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Product,
    Lister,
}

impl ExportKind {
    #[must_use]
    pub fn preferred_definition_label(self) -> &'static str {
        match self {
            ExportKind::Product => "ProdukteExport",
            ExportKind::Lister => "Lister",
        }
    }

    #[must_use]
    pub fn entity_kind(self) -> abx_core::EntityKind {
        match self {
            ExportKind::Product => abx_core::EntityKind::Catalog,
            ExportKind::Lister => abx_core::EntityKind::Lister,
        }
    }

    fn page_path(self) -> &'static str {
        match self {
            ExportKind::Product => PRODUCT_PAGE,
            ExportKind::Lister => LISTER_PAGE,
        }
    }

    /// The filter URL the browser lands on before selecting rows. The
    /// query string mirrors the page's search form with every field in
    /// its neutral state except the entity filter.
    fn filter_path(self, entity_id: &str) -> String {
        match self {
            ExportKind::Product => format!(
                "{PRODUCT_PAGE}?Su_Suchbegriff=&PRFilter=&Su_Suchbegriff_lg=0&PRFilter1=&\
                 Artikelnummer_Search=&level__Search=&Attributwert_Search=&EAN_Search=&\
                 Su_Listenlaenge=500&Su_Listenlaenge_Ges=15000&MyFreifeld=0&Suche_BestandOP=&\
                 Suche_Bestand_Wert=0&MyFreifeldValue=&Suche_ABestandOP=&Suche_ABestand_Wert=0&\
                 Katalog_Filter={entity_id}&Katalog_Filter_Kat2=0&Katalog_Filter_Kat3=0&\
                 Katalog_Filter_Kat4=0&Katalog_Filter_Kat5=0&StandardProductIDValue_Search=&\
                 versandgruppe=&versandgruppe_art=0&vorlage=&vorlageart=0&\
                 Product_Search_Stocklocation_1=&Product_Search_Stocklocation_1_Value=&\
                 Product_Search_Stocklocation_2=&Product_Search_Stocklocation_2_Value=&\
                 Product_Search_Stocklocation_3=&Product_Search_Stocklocation_3_Value=&\
                 Product_Search_Stocklocation_4=&Product_Search_Stocklocation_4_Value=&\
                 productSearchSupplier1=0&productSearchSupplier2=0&productSearchSupplier3=0&\
                 productSearchSupplier4=0&ProductSearchSku=&LastSaleFrom=&ProductSearchMpn=&\
                 LastSaleTo=&ProductSearchFeatureId0=0&ProductSearchFeatureValue0=&\
                 ProductSearchFeatureId1=0&ProductSearchFeatureValue1=&ProductSearchFeatureId2=0&\
                 ProductSearchFeatureValue2=&ProductSearchFeatureId3=0&ProductSearchFeatureValue3=&\
                 ProductSearchFeatureId4=0&ProductSearchFeatureValue4=&productSearchUserTag1=0&\
                 productSearchUserTag2=0&productSearchUserTag3=0&productSearchUserTag4=0&\
                 SuchZusatzfeld1=&SuchZusatzfeld2=&SuchZusatzfeld3=&SuchZusatzfeld4=&\
                 SuchZusatzfeld5=&SuchZusatzfeld6=&spoid=0&art=SetAuswahl&ShowAdditionalFields=1"
            ),
            ExportKind::Lister => format!(
                "{LISTER_PAGE}?art=SetAuswahl&lAWSuchwort=&lAWFilter=0&lAWFilter2=0&\
                 I_Stammartikel=&siteIDsuche=-1&lAWartikelnummer=&lAWKollektion={entity_id}&\
                 lAWKollektion1=-1&lAWKollektion2=-1&lAWKollektion3=-1&lAWKollektion4=-1&\
                 lAWKollektion5=-1&lAWean=&Vorlage=&Vorlageart=0&lAWebaykat=&lAWshopcat1=-1&\
                 lAWshopcat2=-1&lawmaxart=500&maxgesamt=15000&BlockingReason=&DispatchTimeMax=-1&\
                 listerId=&ebayLister_DynamicPriceRules=-100&lAWSellerPaymentProfile=0&\
                 lAWSellerReturnPolicyProfile=0&lAWSellerShippingProfile=0"
            ),
        }
    }

    fn selection_payload(self, item_ids: &[String]) -> Vec<(String, String)> {
        match self {
            ExportKind::Product => payload::product_selection_payload(item_ids),
            ExportKind::Lister => payload::lister_selection_payload(item_ids),
        }
    }

    fn export_payload(self, item_ids: &[String], config: &ExportConfig) -> Vec<(String, String)> {
        match self {
            ExportKind::Product => payload::product_export_payload(item_ids, config),
            ExportKind::Lister => payload::lister_export_payload(item_ids, config),
        }
    }
}

/// One unit of export work: an entity with its enumerated item ids.
#[derive(Debug, Clone)]
pub struct ExportTask {
    pub entity_id: String,
    pub entity_name: String,
    pub item_ids: Vec<String>,
    pub source_path: PathBuf,
}

impl ExportTask {
    /// Loads a task from an enumeration envelope file.
    ///
    /// # Errors
    ///
    /// [`ExportError::InvalidEnvelope`] for unreadable or empty envelopes.
    pub fn load(path: &Path) -> Result<Self, ExportError> {
        let envelope = ItemIdList::load(path).map_err(|err| ExportError::InvalidEnvelope {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            entity_id: envelope.entity_id,
            entity_name: envelope.entity_name,
            item_ids: envelope.item_ids,
            source_path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn expected_count(&self) -> usize {
        self.item_ids.len()
    }

    #[must_use]
    pub fn default_filename(&self) -> String {
        csv_filename(&self.entity_name, &self.entity_id)
    }
}

/// Scans an envelope directory into export tasks, applying the CLI's
/// id/name filters and limit. Unreadable envelopes are logged and skipped.
#[must_use]
pub fn discover_tasks(
    items_dir: &Path,
    id_filter: &[String],
    name_filters: &[String],
    limit: Option<usize>,
) -> Vec<ExportTask> {
    let Ok(entries) = std::fs::read_dir(items_dir) else {
        warn!(dir = %items_dir.display(), "envelope directory not found");
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let name_patterns: Vec<String> = name_filters.iter().map(|n| n.to_lowercase()).collect();
    let mut tasks = Vec::new();
    for path in paths {
        let task = match ExportTask::load(&path) {
            Ok(task) => task,
            Err(err) => {
                error!(path = %path.display(), error = %err, "skipping unreadable envelope");
                continue;
            }
        };
        if !id_filter.is_empty() && !id_filter.iter().any(|id| *id == task.entity_id) {
            continue;
        }
        if !name_patterns.is_empty() {
            let name = task.entity_name.to_lowercase();
            if !name_patterns.iter().any(|p| name.contains(p)) {
                continue;
            }
        }
        tasks.push(task);
        if limit.is_some_and(|limit| tasks.len() >= limit) {
            break;
        }
    }
    tasks
}

/// GETs the pages the browser would load before selecting rows, returning
/// `(page_url, referer_url)` for the subsequent POSTs.
async fn prime(
    session: &Session,
    kind: ExportKind,
    entity_id: &str,
) -> Result<(String, String), ExportError> {
    let page_url = session.url(kind.page_path());
    let referer_url = session.url(&kind.filter_path(entity_id));

    // The lister list wants the bare page loaded before the filter URL.
    if kind == ExportKind::Lister {
        let page = session.get_page(&page_url, None).await?;
        check_page(&page_url, page.status.as_u16(), &page.body)?;
    }
    let page = session.get_page(&referer_url, Some(&page_url)).await?;
    check_page(&referer_url, page.status.as_u16(), &page.body)?;
    Ok((page_url, referer_url))
}

fn check_page(url: &str, status: u16, body: &str) -> Result<(), ExportError> {
    if !(200..300).contains(&status) {
        return Err(ExportError::UnexpectedStatus {
            status,
            url: url.to_string(),
        });
    }
    if markup::contains_login_form(body) {
        return Err(ExportError::SessionExpired {
            url: url.to_string(),
        });
    }
    Ok(())
}

/// Runs one select-then-export pair and streams the CSV to
/// `output_dir/<default_filename>` through a temp file, renaming only
/// after the stream completes. The export POST itself is retried once
/// when it fails at the HTTP level.
///
/// # Errors
///
/// - [`ExportError::SessionExpired`] on a sign-in body at any step.
/// - [`ExportError::UnexpectedHtmlResponse`] when the export answers with
///   an HTML document instead of CSV.
/// - [`ExportError::EmptyExport`] for a fully empty body.
/// - [`ExportError::UnexpectedStatus`] / [`ExportError::Http`] /
///   [`ExportError::Io`] for transport and filesystem failures.
pub async fn download_csv(
    session: &Session,
    kind: ExportKind,
    task: &ExportTask,
    output_dir: &Path,
    config: &ExportConfig,
    export_timeout_secs: u64,
) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(output_dir)?;
    let (page_url, referer_url) = prime(session, kind, &task.entity_id).await?;
    let export_url = session.url(EXPORT_ENDPOINT);
    let origin = session.base_url().to_string();

    let selection = kind.selection_payload(&task.item_ids);
    let export_form = kind.export_payload(&task.item_ids, config);

    let mut attempt = 0;
    let response = loop {
        // Selection marks the rows server-side; the export references them.
        let page = session
            .client()
            .post(&page_url)
            .form(&selection)
            .header(REFERER, &referer_url)
            .header(ORIGIN, &origin)
            .header(ACCEPT, ACCEPT_HTML)
            .send()
            .await?;
        let status = page.status().as_u16();
        let body = page.text().await?;
        check_page(&page_url, status, &body)?;
        debug!(entity_id = %task.entity_id, attempt, "selection accepted");

        let export = session
            .client()
            .post(&export_url)
            .form(&export_form)
            .header(REFERER, &page_url)
            .header(ORIGIN, &origin)
            .header(ACCEPT, ACCEPT_CSV)
            .timeout(Duration::from_secs(export_timeout_secs))
            .send()
            .await?;
        if export.status().is_success() {
            break export;
        }
        if attempt == 1 {
            return Err(ExportError::UnexpectedStatus {
                status: export.status().as_u16(),
                url: export_url,
            });
        }
        debug!(entity_id = %task.entity_id, status = export.status().as_u16(), "export failed, retrying pair");
        attempt += 1;
    };

    let is_html = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_lowercase)
        .is_some_and(|ct| ct.contains("text/html") && !ct.contains("csv"));

    let mut stream = response.bytes_stream();
    let mut first_chunk = None;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if !chunk.is_empty() {
            first_chunk = Some(chunk);
            break;
        }
    }
    let Some(first_chunk) = first_chunk else {
        return Err(ExportError::EmptyExport {
            entity_id: task.entity_id.clone(),
        });
    };
    if is_html {
        let preview: String = String::from_utf8_lossy(&first_chunk)
            .chars()
            .take(PREVIEW_LEN)
            .collect();
        return Err(ExportError::UnexpectedHtmlResponse { preview });
    }

    let target = output_dir.join(task.default_filename());
    let mut tmp = tempfile::Builder::new()
        .prefix(".partial_")
        .suffix(".tmp")
        .tempfile_in(output_dir)?;
    tmp.write_all(&first_chunk)?;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        tmp.write_all(&chunk)?;
    }
    tmp.flush()?;
    tmp.persist(&target).map_err(|err| err.error)?;
    Ok(target)
}

/// Behavior switches for an export run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// Leave entities with an existing CSV untouched.
    pub skip_existing: bool,
    /// Delete an existing CSV and its derived artifacts, then re-export.
    pub refresh_existing: bool,
    /// Force a re-login before the immediate short-count retry.
    pub relogin_between_retries: bool,
}

/// What happened across one export run.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: Vec<(String, String)>,
}

/// Exports every task sequentially, verifying row counts, with the retry
/// ladder described at module level. Per-entity failures never abort the
/// run; only losing the session entirely does.
///
/// # Errors
///
/// Auth errors from the pool when no working session can be obtained.
pub async fn run_export(
    pool: &SessionPool,
    kind: ExportKind,
    tasks: &[ExportTask],
    output_dir: &Path,
    config: &ExportConfig,
    app: &AppConfig,
    options: ExportOptions,
) -> Result<ExportReport, ExportError> {
    let account_id = pool.account().id.clone();
    let (mut session, mut generation) = pool.checkout().await?;
    let mut report = ExportReport::default();
    let mut failed: Vec<(usize, String)> = Vec::new();
    let total = tasks.len();

    for (index, task) in tasks.iter().enumerate() {
        let target = output_dir.join(task.default_filename());
        if target.is_file() {
            if options.skip_existing {
                info!(
                    account = %account_id,
                    entity_id = %task.entity_id,
                    path = %target.display(),
                    "skipping existing export"
                );
                report.skipped += 1;
                continue;
            }
            if options.refresh_existing {
                cleanup_existing_outputs(app, &account_id, &target);
            }
        }

        info!(
            account = %account_id,
            progress = format!("{}/{}", index + 1, total),
            entity = %task.entity_name,
            entity_id = %task.entity_id,
            items = task.expected_count(),
            "exporting"
        );

        match export_once(&session, kind, task, output_dir, config, app).await {
            Ok(rows) => {
                debug!(entity_id = %task.entity_id, rows, "export verified");
                report.succeeded += 1;
            }
            Err(err) if err.is_retriable() => {
                warn!(
                    account = %account_id,
                    entity_id = %task.entity_id,
                    error = %err,
                    "export attempt failed, retrying immediately"
                );
                if options.relogin_between_retries || err.is_session_expiry() {
                    (session, generation) = pool.refresh(generation).await?;
                }
                match export_once(&session, kind, task, output_dir, config, app).await {
                    Ok(rows) => {
                        debug!(entity_id = %task.entity_id, rows, "retry verified");
                        report.succeeded += 1;
                    }
                    Err(err) => failed.push((index, err.to_string())),
                }
            }
            Err(err) => failed.push((index, err.to_string())),
        }
    }

    // Aggregated final pass over everything that failed, with a session
    // known to be fresh.
    if !failed.is_empty() {
        info!(
            account = %account_id,
            pending = failed.len(),
            "final retry pass for failed exports"
        );
        (session, _) = pool.refresh(generation).await?;
        for (index, reason) in failed {
            let task = &tasks[index];
            match export_once(&session, kind, task, output_dir, config, app).await {
                Ok(_) => report.succeeded += 1,
                Err(err) => {
                    error!(
                        account = %account_id,
                        entity_id = %task.entity_id,
                        first = %reason,
                        last = %err,
                        "export failed permanently"
                    );
                    report.failed.push((task.entity_id.clone(), err.to_string()));
                }
            }
        }
    }
    Ok(report)
}

/// One download plus row-count verification.
async fn export_once(
    session: &Session,
    kind: ExportKind,
    task: &ExportTask,
    output_dir: &Path,
    config: &ExportConfig,
    app: &AppConfig,
) -> Result<usize, ExportError> {
    let path = download_csv(session, kind, task, output_dir, config, app.export_timeout_secs).await?;
    let rows = csv_count::count_data_rows_in_file(&path)?;
    if rows < task.expected_count() {
        return Err(ExportError::ShortRowCount {
            entity_id: task.entity_id.clone(),
            rows,
            expected: task.expected_count(),
        });
    }
    Ok(rows)
}

/// Removes a stale CSV together with the downstream artifacts derived
/// from it: the cleaned JSON under the JSON root and the per-item HTML
/// fragments that JSON references by EAN. Cleanup failures are logged,
/// never fatal.
pub fn cleanup_existing_outputs(app: &AppConfig, account_id: &str, csv_path: &Path) {
    let stem = csv_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ready_json = layout::json_dir(app, account_id).join(format!("{stem}.json"));
    let html_dir = layout::html_dir(app, account_id);

    let mut removed_html = 0usize;
    if let Ok(raw) = std::fs::read_to_string(&ready_json) {
        if let Ok(serde_json::Value::Array(entries)) = serde_json::from_str(&raw) {
            for entry in entries {
                let Some(object) = entry.as_object() else {
                    continue;
                };
                let ean = object
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case("ean"))
                    .and_then(|(_, v)| normalize_ean(v));
                let Some(ean) = ean else { continue };
                let html_path = html_dir.join(format!("{ean}.html"));
                if html_path.is_file() && std::fs::remove_file(&html_path).is_ok() {
                    removed_html += 1;
                }
            }
        }
    }
    if removed_html > 0 {
        info!(account = %account_id, removed = removed_html, stem = %stem, "removed derived HTML fragments");
    }
    for path in [ready_json.as_path(), csv_path] {
        if path.is_file() {
            if let Err(err) = std::fs::remove_file(path) {
                warn!(path = %path.display(), error = %err, "could not remove stale artifact");
            }
        }
    }
}

fn normalize_ean(value: &serde_json::Value) -> Option<String> {
    let raw = match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    if digits.len() >= 13 {
        Some(digits[digits.len() - 13..].to_string())
    } else {
        Some(digits)
    }
}
