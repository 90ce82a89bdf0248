use thiserror::Error;

/// Errors raised while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("no usable account credentials found (expected <ID>_LOGIN/<ID>_PASSWORD pairs)")]
    NoAccounts,

    #[error("unknown account '{0}'")]
    UnknownAccount(String),
}
