use std::path::PathBuf;

use thiserror::Error;

/// Failures of the login handshake or session validation. All of these are
/// fatal for the affected account; callers move on to the next one.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("login form could not be located on the sign-in page")]
    FormNotFound,

    #[error("unexpected status {status} after submitting credentials")]
    LoginRejected { status: u16 },

    #[error("FedAuth cookie not issued by the identity provider")]
    FedAuthMissing,

    #[error("authentication could not be confirmed against the protected page")]
    VerificationFailed,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cookie file {path} is unreadable or malformed: {reason}")]
    CookieFile { path: PathBuf, reason: String },
}
