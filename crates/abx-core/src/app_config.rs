use std::path::PathBuf;

/// Resolved runtime configuration shared by every subcommand.
///
/// All values come from `ABX_*` environment variables with sensible
/// defaults; see [`crate::config::load_app_config`].
#[derive(Clone)]
pub struct AppConfig {
    pub log_level: String,
    /// Directory holding `<account>_cookies.json` files.
    pub session_dir: PathBuf,
    /// Root for discovered entity lists (`<ID>_F_P/factories.json`, ...).
    pub entities_dir: PathBuf,
    /// Root for per-entity item-id envelopes.
    pub items_dir: PathBuf,
    /// Root for downloaded CSV exports.
    pub csv_dir: PathBuf,
    /// Root for normalized per-entity JSON (downstream artifact, cleaned on refresh).
    pub json_dir: PathBuf,
    /// Root for trimmed per-item HTML fragments.
    pub html_dir: PathBuf,
    pub user_agent: String,
    /// Timeout for ordinary GET/POST page requests.
    pub http_timeout_secs: u64,
    /// Timeout for the streaming export POST, which can take minutes server-side.
    pub export_timeout_secs: u64,
    /// Concurrent entity enumerations per account.
    pub enumerate_workers: usize,
    /// Worker count for the per-item page fetch pool.
    pub fetch_workers: usize,
    /// Backpressure ceiling for queued fetch items.
    pub fetch_queue_depth: usize,
    /// Attempts per item before it is recorded as failed.
    pub fetch_max_attempts: usize,
    /// Proactive re-login interval, in processed items.
    pub fetch_relogin_every: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("log_level", &self.log_level)
            .field("session_dir", &self.session_dir)
            .field("entities_dir", &self.entities_dir)
            .field("items_dir", &self.items_dir)
            .field("csv_dir", &self.csv_dir)
            .field("json_dir", &self.json_dir)
            .field("html_dir", &self.html_dir)
            .field("user_agent", &self.user_agent)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("export_timeout_secs", &self.export_timeout_secs)
            .field("enumerate_workers", &self.enumerate_workers)
            .field("fetch_workers", &self.fetch_workers)
            .field("fetch_queue_depth", &self.fetch_queue_depth)
            .field("fetch_max_attempts", &self.fetch_max_attempts)
            .field("fetch_relogin_every", &self.fetch_relogin_every)
            .finish()
    }
}
