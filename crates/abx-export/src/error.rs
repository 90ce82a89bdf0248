use std::path::PathBuf;

use abx_session::AuthError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("session expired: received the sign-in page from {url}")]
    SessionExpired { url: String },

    #[error("expected CSV but received an HTML document: {preview}")]
    UnexpectedHtmlResponse { preview: String },

    #[error("server returned an empty export for entity {entity_id}")]
    EmptyExport { entity_id: String },

    #[error("result page from {url} is missing the {field} field")]
    HiddenFieldMissing { field: String, url: String },

    #[error("pagination for entity {entity_id} exceeded {max_pages} pages")]
    PaginationLimit { entity_id: String, max_pages: usize },

    #[error("no usable export definition found on the export settings page")]
    DefinitionNotFound,

    #[error("export for entity {entity_id} produced {rows} rows, expected {expected}")]
    ShortRowCount {
        entity_id: String,
        rows: usize,
        expected: usize,
    },

    #[error("detail page for item {item_id} is truncated ({bytes} bytes)")]
    TruncatedPage { item_id: String, bytes: usize },

    #[error("invalid item-id envelope {path}: {reason}")]
    InvalidEnvelope { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),
}

impl ExportError {
    /// Whether the failure means the session is gone and a forced re-login
    /// is the right response. An HTML body where CSV was expected counts:
    /// the server serves the sign-in page with status 200.
    #[must_use]
    pub fn is_session_expiry(&self) -> bool {
        matches!(
            self,
            ExportError::SessionExpired { .. } | ExportError::UnexpectedHtmlResponse { .. }
        )
    }

    /// Whether a retry with the same or a fresh session can plausibly
    /// succeed. Envelope and definition problems cannot be retried away.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        self.is_session_expiry()
            || matches!(
                self,
                ExportError::Http(_)
                    | ExportError::UnexpectedStatus { .. }
                    | ExportError::EmptyExport { .. }
                    | ExportError::ShortRowCount { .. }
                    | ExportError::TruncatedPage { .. }
            )
    }
}
