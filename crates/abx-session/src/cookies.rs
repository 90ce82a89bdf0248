//! A cookie store that keeps every cookie visible.
//!
//! The stock `reqwest` jar cannot be enumerated, which rules out persisting
//! a session or re-scoping a cookie to a wider domain. This store records
//! each `Set-Cookie` header on every response, including intermediate
//! redirect hops where the identity provider issues its tokens, and exposes
//! snapshots for persistence and worker clones.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderValue;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// One cookie as persisted to disk, field for field the on-disk contract
/// of `sessions/<id>_cookies.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    /// Unix timestamp; `None` for session cookies.
    pub expires: Option<i64>,
}

impl CookieRecord {
    fn is_expired(&self, now: i64) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    /// RFC 6265 domain matching. A leading dot marks a wildcard record that
    /// also covers subdomains.
    fn domain_matches(&self, host: &str) -> bool {
        if let Some(base) = self.domain.strip_prefix('.') {
            host == base || host.ends_with(&self.domain)
        } else {
            host == self.domain
        }
    }

    fn path_matches(&self, request_path: &str) -> bool {
        if self.path == "/" {
            return true;
        }
        request_path == self.path
            || (request_path.starts_with(&self.path)
                && (self.path.ends_with('/')
                    || request_path.as_bytes().get(self.path.len()) == Some(&b'/')))
    }
}

/// Thread-safe cookie store shared between a `reqwest::Client` and the
/// session lifecycle code via `Arc`.
#[derive(Debug, Default)]
pub struct RecordingJar {
    records: Mutex<Vec<CookieRecord>>,
}

impl RecordingJar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_records(records: Vec<CookieRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    /// A point-in-time copy of every stored cookie.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CookieRecord> {
        self.records.lock().expect("cookie jar poisoned").clone()
    }

    /// The value of the first unexpired cookie with this name, regardless
    /// of scope.
    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<String> {
        let now = Utc::now().timestamp();
        self.records
            .lock()
            .expect("cookie jar poisoned")
            .iter()
            .find(|r| r.name == name && !r.is_expired(now))
            .map(|r| r.value.clone())
    }

    /// Inserts or replaces a cookie with an explicit scope. Used to widen
    /// an identity token from its issuing host to the parent domain.
    pub fn insert_scoped(&self, record: CookieRecord) {
        let mut records = self.records.lock().expect("cookie jar poisoned");
        upsert(&mut records, record);
    }

    fn store_header(&self, header: &HeaderValue, url: &Url) {
        let Ok(raw) = header.to_str() else {
            return;
        };
        let Some(host) = url.host_str() else {
            return;
        };
        let Some(record) = parse_set_cookie(raw, host) else {
            return;
        };
        let mut records = self.records.lock().expect("cookie jar poisoned");
        if record.is_expired(Utc::now().timestamp()) {
            records.retain(|r| {
                !(r.name == record.name && r.domain == record.domain && r.path == record.path)
            });
        } else {
            upsert(&mut records, record);
        }
    }
}

fn upsert(records: &mut Vec<CookieRecord>, record: CookieRecord) {
    if let Some(existing) = records
        .iter_mut()
        .find(|r| r.name == record.name && r.domain == record.domain && r.path == record.path)
    {
        *existing = record;
    } else {
        records.push(record);
    }
}

/// Parses one `Set-Cookie` header value. Unparseable attribute values are
/// ignored rather than rejecting the whole cookie.
fn parse_set_cookie(raw: &str, request_host: &str) -> Option<CookieRecord> {
    let mut parts = raw.split(';');
    let pair = parts.next()?.trim();
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut record = CookieRecord {
        name: name.to_string(),
        value: value.trim().to_string(),
        domain: request_host.to_string(),
        path: "/".to_string(),
        secure: false,
        expires: None,
    };
    let mut max_age: Option<i64> = None;

    for attr in parts {
        let attr = attr.trim();
        let (key, val) = match attr.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (attr, ""),
        };
        if key.eq_ignore_ascii_case("domain") {
            let val = val.trim_start_matches('.');
            if !val.is_empty() {
                // A Domain attribute always produces a wildcard record.
                record.domain = format!(".{val}");
            }
        } else if key.eq_ignore_ascii_case("path") {
            if val.starts_with('/') {
                record.path = val.to_string();
            }
        } else if key.eq_ignore_ascii_case("secure") {
            record.secure = true;
        } else if key.eq_ignore_ascii_case("max-age") {
            max_age = val.parse::<i64>().ok();
        } else if key.eq_ignore_ascii_case("expires") {
            record.expires = parse_cookie_date(val);
        }
    }

    // Max-Age wins over Expires when both are present.
    if let Some(seconds) = max_age {
        record.expires = Some(Utc::now().timestamp() + seconds.max(0));
        if seconds <= 0 {
            record.expires = Some(0);
        }
    }
    Some(record)
}

fn parse_cookie_date(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).timestamp())
}

impl reqwest::cookie::CookieStore for RecordingJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for header in cookie_headers {
            self.store_header(header, url);
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let host = url.host_str()?;
        let https = url.scheme() == "https";
        let path = url.path();
        let now = Utc::now().timestamp();

        let records = self.records.lock().expect("cookie jar poisoned");
        let header = records
            .iter()
            .filter(|r| !r.is_expired(now))
            .filter(|r| !r.secure || https)
            .filter(|r| r.domain_matches(host) && r.path_matches(path))
            .map(|r| format!("{}={}", r.name, r.value))
            .collect::<Vec<_>>()
            .join("; ");
        if header.is_empty() {
            None
        } else {
            HeaderValue::from_str(&header).ok()
        }
    }
}

/// Reads a persisted cookie snapshot. A missing file is `Ok(None)`; a
/// present but malformed file is an error so a corrupt snapshot is noticed
/// instead of silently triggering a fresh login.
///
/// # Errors
///
/// [`AuthError::CookieFile`] on unreadable or malformed files.
pub fn load_records(path: &Path) -> Result<Option<Vec<CookieRecord>>, AuthError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(AuthError::CookieFile {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })
        }
    };
    let records: Vec<CookieRecord> =
        serde_json::from_str(&raw).map_err(|err| AuthError::CookieFile {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    Ok(Some(records))
}

/// Writes a cookie snapshot as pretty JSON, creating parent directories.
///
/// # Errors
///
/// [`AuthError::Io`] on filesystem failure.
pub fn save_records(path: &Path, records: &[CookieRecord]) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_string_pretty(records).map_err(|err| AuthError::CookieFile {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    std::fs::write(path, body)?;
    Ok(())
}

#[cfg(test)]
#[path = "cookies_test.rs"]
mod tests;
