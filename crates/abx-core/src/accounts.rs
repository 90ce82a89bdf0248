//! The fixed merchant account registry and credential loading.
//!
//! Each account lives on its own farm subdomain of the hosted back office.
//! Credentials are `<ID>_LOGIN` / `<ID>_PASSWORD` environment pairs (usually
//! supplied via a local `.env` file); pairs with a missing password are
//! skipped rather than treated as an error so one broken entry does not take
//! out the other account.

use crate::error::ConfigError;

/// Processing order for multi-account runs.
pub const ACCOUNT_ORDER: [&str; 2] = ["JV", "XL"];

const ACCOUNT_DOMAINS: [(&str, &str); 2] = [
    ("JV", "farm01.afterbuy.de"),
    ("XL", "farm04.afterbuy.de"),
];

/// One merchant account: a short identifier and the origin all of its
/// endpoints hang off. `base_url` carries the scheme so tests can point an
/// account at a local mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub base_url: String,
}

impl Account {
    /// Resolves a known account id (case-insensitive) to its production origin.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownAccount`] for ids outside the registry.
    pub fn from_registry(id: &str) -> Result<Self, ConfigError> {
        let key = id.to_uppercase();
        ACCOUNT_DOMAINS
            .iter()
            .find(|(known, _)| *known == key)
            .map(|(known, domain)| Self {
                id: (*known).to_string(),
                base_url: format!("https://{domain}"),
            })
            .ok_or_else(|| ConfigError::UnknownAccount(id.to_string()))
    }

    /// The host portion of `base_url` without scheme or port, e.g.
    /// `farm01.afterbuy.de`.
    #[must_use]
    pub fn host(&self) -> &str {
        let stripped = self
            .base_url
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        let stripped = stripped.split('/').next().unwrap_or(stripped);
        stripped.split(':').next().unwrap_or(stripped)
    }
}

/// A login/password pair for one account.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// Extracts `(account_id, Credentials)` pairs from an env-var lookup.
///
/// Only ids present in the registry are considered; a `*_LOGIN` without a
/// matching `*_PASSWORD` is skipped.
pub fn extract_credentials<F>(lookup: F) -> Vec<(Account, Credentials)>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let mut out = Vec::new();
    for id in ACCOUNT_ORDER {
        let Ok(login) = lookup(&format!("{id}_LOGIN")) else {
            continue;
        };
        let Ok(password) = lookup(&format!("{id}_PASSWORD")) else {
            continue;
        };
        if login.trim().is_empty() || password.is_empty() {
            continue;
        }
        // from_registry cannot fail for ids taken from ACCOUNT_ORDER.
        if let Ok(account) = Account::from_registry(id) {
            out.push((
                account,
                Credentials {
                    login: login.trim().to_string(),
                    password,
                },
            ));
        }
    }
    out
}

/// Loads credentials for every registered account from the process
/// environment.
///
/// # Errors
///
/// Returns [`ConfigError::NoAccounts`] when not a single complete pair exists.
pub fn load_credentials_from_env() -> Result<Vec<(Account, Credentials)>, ConfigError> {
    let found = extract_credentials(|key| std::env::var(key));
    if found.is_empty() {
        return Err(ConfigError::NoAccounts);
    }
    Ok(found)
}

/// Looks up credentials for one specific account id.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownAccount`] for unregistered ids and
/// [`ConfigError::NoAccounts`] when the env pair is absent.
pub fn credentials_for(id: &str) -> Result<(Account, Credentials), ConfigError> {
    let account = Account::from_registry(id)?;
    extract_credentials(|key| std::env::var(key))
        .into_iter()
        .find(|(a, _)| a.id == account.id)
        .ok_or(ConfigError::NoAccounts)
}

#[cfg(test)]
#[path = "accounts_test.rs"]
mod tests;
