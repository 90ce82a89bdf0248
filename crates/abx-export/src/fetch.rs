//! Per-item HTML fragment download.
//!
//! Every item id from the cleaned JSON set gets its listing preview page
//! fetched, trimmed down to the description fragment and written as
//! `<key>.html`. Work flows through a bounded channel into a fixed worker
//! set sharing one session pool, so a single re-login covers all workers
//! when the server drops the session mid-run.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use abx_session::{markup, Session, SessionPool};
use regex::Regex;
use reqwest::header::REFERER;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::ExportError;

const PREVIEW_ENDPOINT: &str = "/afterbuy/ebayListerVorschau.aspx";
const LISTER_PAGE: &str = "/afterbuy/ebayliste2.aspx";

/// Opening tag of the description container. Everything before it is page
/// chrome and gets dropped.
static DESCRIPTION_DIV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<div\s+id=["']EBdescription["'][^>]*>"#).expect("valid regex")
});

/// One item to fetch: the listing id to request and the key the fragment
/// file is named after (the EAN when the JSON has one, else the id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchItem {
    pub item_id: String,
    pub key: String,
}

/// Tuning knobs for a fetch run, taken from the application config.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub workers: usize,
    pub queue_depth: usize,
    pub max_attempts: usize,
    pub relogin_every: usize,
    /// Responses below this size are treated as truncated error pages.
    pub min_page_bytes: usize,
    /// Trimmed fragments below this size are rejected as well.
    pub min_fragment_bytes: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            workers: 8,
            queue_depth: 32,
            max_attempts: 3,
            relogin_every: 200,
            min_page_bytes: 256,
            min_fragment_bytes: 16,
        }
    }
}

/// What happened across one fetch run.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub saved: usize,
    pub skipped: usize,
    pub reconciled: usize,
    pub failed: Vec<(String, String)>,
}

/// Walks the cleaned JSON directory and collects the items to fetch.
///
/// Every `.json` file is expected to hold an array of objects; the item id
/// comes from an `id`/`itemid`/`item_id` key and the file key from an
/// `ean` key when it looks like one. Duplicate keys are collapsed.
#[must_use]
pub fn collect_items_from_json_dir(json_dir: &Path) -> Vec<FetchItem> {
    let Ok(entries) = std::fs::read_dir(json_dir) else {
        warn!(dir = %json_dir.display(), "JSON directory not found");
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut items = Vec::new();
    let mut seen = HashSet::new();
    for path in paths {
        let Ok(raw) = std::fs::read_to_string(&path) else {
            warn!(path = %path.display(), "unreadable JSON file");
            continue;
        };
        let Ok(serde_json::Value::Array(records)) = serde_json::from_str(&raw) else {
            warn!(path = %path.display(), "JSON file is not an array of records");
            continue;
        };
        for record in records {
            let Some(object) = record.as_object() else {
                continue;
            };
            let Some(item_id) = extract_item_id(object) else {
                continue;
            };
            let key = extract_ean(object).unwrap_or_else(|| item_id.clone());
            if seen.insert(key.clone()) {
                items.push(FetchItem { item_id, key });
            }
        }
    }
    items
}

fn extract_item_id(object: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    for (key, value) in object {
        if !matches!(key.to_lowercase().as_str(), "id" | "itemid" | "item_id") {
            continue;
        }
        let digits = digits_of(value);
        if !digits.is_empty() {
            return Some(digits);
        }
    }
    None
}

fn extract_ean(object: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    for (key, value) in object {
        if !key.eq_ignore_ascii_case("ean") {
            continue;
        }
        let digits = digits_of(value);
        if (8..=18).contains(&digits.len()) {
            return Some(digits);
        }
    }
    None
}

fn digits_of(value: &serde_json::Value) -> String {
    let raw = match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return String::new(),
    };
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Cuts the page down to everything after the description container's
/// opening tag. Pages without the container are kept whole.
#[must_use]
pub fn trim_to_description(body: &str) -> &str {
    match DESCRIPTION_DIV_RE.find(body) {
        Some(found) => &body[found.end()..],
        None => body,
    }
}

/// Fetches one item's preview page and returns the trimmed fragment.
///
/// # Errors
///
/// - [`ExportError::UnexpectedStatus`] on non-2xx.
/// - [`ExportError::SessionExpired`] when the page is the sign-in form.
/// - [`ExportError::TruncatedPage`] when the body, or the fragment left
///   after trimming, is implausibly small.
pub async fn fetch_fragment(
    session: &Session,
    item: &FetchItem,
    options: FetchOptions,
) -> Result<String, ExportError> {
    let url = session.url(&format!("{PREVIEW_ENDPOINT}?itemid={}", item.item_id));
    let referer = session.url(&format!(
        "{LISTER_PAGE}?art=edit&id={}&rsposition=0&rssuchbegriff=",
        item.item_id
    ));
    let response = session.client().get(&url).header(REFERER, &referer).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ExportError::UnexpectedStatus {
            status: status.as_u16(),
            url,
        });
    }
    let body = response.text().await?;
    if markup::contains_login_form(&body) {
        return Err(ExportError::SessionExpired { url });
    }
    if body.len() < options.min_page_bytes {
        return Err(ExportError::TruncatedPage {
            item_id: item.item_id.clone(),
            bytes: body.len(),
        });
    }
    let fragment = trim_to_description(&body);
    if fragment.len() < options.min_fragment_bytes {
        return Err(ExportError::TruncatedPage {
            item_id: item.item_id.clone(),
            bytes: fragment.len(),
        });
    }
    Ok(fragment.to_string())
}

/// Downloads every item's fragment into `html_dir`.
///
/// Items whose fragment file already exists are skipped. After the worker
/// pass a reconciliation sweep re-fetches items whose file is still
/// missing, once, with a fresh session.
///
/// # Errors
///
/// Auth errors from the pool when no working session can be obtained, and
/// I/O errors creating the output directory.
pub async fn run_fetch(
    pool: Arc<SessionPool>,
    items: Vec<FetchItem>,
    html_dir: &Path,
    options: FetchOptions,
) -> Result<FetchReport, ExportError> {
    std::fs::create_dir_all(html_dir)?;
    let account_id = pool.account().id.clone();

    let mut report = FetchReport::default();
    let mut pending = Vec::new();
    for item in items {
        if html_dir.join(format!("{}.html", item.key)).is_file() {
            report.skipped += 1;
        } else {
            pending.push(item);
        }
    }
    info!(
        account = %account_id,
        pending = pending.len(),
        skipped = report.skipped,
        "starting fragment fetch"
    );
    if pending.is_empty() {
        return Ok(report);
    }

    let (tx, rx) = mpsc::channel::<FetchItem>(options.queue_depth.max(1));
    let rx = Arc::new(Mutex::new(rx));
    let mut handles = Vec::new();
    for worker in 0..options.workers.max(1) {
        let pool = Arc::clone(&pool);
        let rx = Arc::clone(&rx);
        let html_dir = html_dir.to_path_buf();
        handles.push(tokio::spawn(async move {
            worker_loop(worker, pool, rx, html_dir, options).await
        }));
    }

    for item in pending.clone() {
        // Send only fails when every worker already died.
        if tx.send(item).await.is_err() {
            break;
        }
    }
    drop(tx);

    let mut failures: HashMap<String, String> = HashMap::new();
    for handle in handles {
        match handle.await {
            Ok(outcome) => {
                report.saved += outcome.saved;
                failures.extend(outcome.failed);
            }
            Err(err) => error!(error = %err, "fetch worker panicked"),
        }
    }

    // Reconciliation: one sequential retry for anything still missing.
    let missing: Vec<FetchItem> = pending
        .into_iter()
        .filter(|item| !html_dir.join(format!("{}.html", item.key)).is_file())
        .collect();
    if !missing.is_empty() {
        info!(account = %account_id, missing = missing.len(), "reconciling missing fragments");
        let (session, _) = pool.checkout().await?;
        for item in missing {
            match fetch_fragment(&session, &item, options).await {
                Ok(fragment) => {
                    let path = html_dir.join(format!("{}.html", item.key));
                    if let Err(err) = std::fs::write(&path, fragment) {
                        failures.insert(item.key, err.to_string());
                        continue;
                    }
                    failures.remove(&item.key);
                    report.saved += 1;
                    report.reconciled += 1;
                }
                Err(err) => {
                    failures.insert(item.key.clone(), err.to_string());
                }
            }
        }
    }

    report.failed = failures.into_iter().collect();
    report.failed.sort();
    for (key, reason) in &report.failed {
        error!(account = %account_id, item = %key, error = %reason, "fragment failed permanently");
    }
    Ok(report)
}

struct WorkerOutcome {
    saved: usize,
    failed: Vec<(String, String)>,
}

async fn worker_loop(
    worker: usize,
    pool: Arc<SessionPool>,
    rx: Arc<Mutex<mpsc::Receiver<FetchItem>>>,
    html_dir: PathBuf,
    options: FetchOptions,
) -> WorkerOutcome {
    let mut outcome = WorkerOutcome {
        saved: 0,
        failed: Vec::new(),
    };
    let Ok((mut session, mut generation)) = pool.checkout().await else {
        error!(worker, "worker could not obtain a session");
        return outcome;
    };

    loop {
        let item = { rx.lock().await.recv().await };
        let Some(item) = item else { break };

        let mut last_error = None;
        for attempt in 1..=options.max_attempts.max(1) {
            match fetch_fragment(&session, &item, options).await {
                Ok(fragment) => {
                    let path = html_dir.join(format!("{}.html", item.key));
                    match std::fs::write(&path, fragment) {
                        Ok(()) => {
                            debug!(worker, item = %item.key, attempt, "fragment saved");
                            outcome.saved += 1;
                            last_error = None;
                        }
                        Err(err) => last_error = Some(err.to_string()),
                    }
                    break;
                }
                Err(err) if err.is_retriable() && attempt < options.max_attempts.max(1) => {
                    warn!(worker, item = %item.key, attempt, error = %err, "fetch attempt failed");
                    // A truncated page or transport error can be silent
                    // expiry; the session is suspect either way, so every
                    // retry gets a fresh one. The generation guard keeps
                    // the re-login shared across workers.
                    match pool.refresh(generation).await {
                        Ok((fresh, gen)) => (session, generation) = (fresh, gen),
                        Err(auth) => {
                            last_error = Some(auth.to_string());
                            break;
                        }
                    }
                    last_error = Some(err.to_string());
                }
                Err(err) => {
                    last_error = Some(err.to_string());
                    break;
                }
            }
        }
        if let Some(reason) = last_error {
            outcome.failed.push((item.key.clone(), reason));
        }

        // Sessions age out server-side; rotate proactively.
        if pool.note_processed(options.relogin_every) {
            if let Ok((fresh, gen)) = pool.refresh(generation).await {
                (session, generation) = (fresh, gen);
            }
        }
    }
    outcome
}
