use std::path::PathBuf;

use crate::app_config::AppConfig;
use crate::error::ConfigError;

/// Browser user agent replayed on every request. The back office serves a
/// degraded (and differently structured) page to unknown agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value fails to parse.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the
/// process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files. Useful for
/// testing or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if a value fails to parse.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual
/// environment so it can be tested with a pure `HashMap` lookup.
pub(crate) fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let log_level = or_default("ABX_LOG_LEVEL", "info");
    let session_dir = PathBuf::from(or_default("ABX_SESSION_DIR", "./sessions"));
    let entities_dir = PathBuf::from(or_default("ABX_ENTITIES_DIR", "./Fabriks"));
    let items_dir = PathBuf::from(or_default("ABX_ITEMS_DIR", "./itemsF"));
    let csv_dir = PathBuf::from(or_default("ABX_CSV_DIR", "./CSVDATA"));
    let json_dir = PathBuf::from(or_default("ABX_JSON_DIR", "./readyJSON"));
    let html_dir = PathBuf::from(or_default("ABX_HTML_DIR", "./readyhtml"));

    let user_agent = or_default("ABX_USER_AGENT", DEFAULT_USER_AGENT);
    let http_timeout_secs = parse_u64("ABX_HTTP_TIMEOUT_SECS", "30")?;
    let export_timeout_secs = parse_u64("ABX_EXPORT_TIMEOUT_SECS", "180")?;
    let enumerate_workers = parse_usize("ABX_ENUMERATE_WORKERS", "5")?;
    let fetch_workers = parse_usize("ABX_FETCH_WORKERS", "8")?;
    let fetch_queue_depth = parse_usize("ABX_FETCH_QUEUE_DEPTH", "32")?;
    let fetch_max_attempts = parse_usize("ABX_FETCH_MAX_ATTEMPTS", "3")?;
    let fetch_relogin_every = parse_usize("ABX_FETCH_RELOGIN_EVERY", "200")?;

    Ok(AppConfig {
        log_level,
        session_dir,
        entities_dir,
        items_dir,
        csv_dir,
        json_dir,
        html_dir,
        user_agent,
        http_timeout_secs,
        export_timeout_secs,
        enumerate_workers,
        fetch_workers,
        fetch_queue_depth,
        fetch_max_attempts,
        fetch_relogin_every,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
