use std::sync::Arc;
use std::time::Duration;

use reqwest::header::REFERER;
use reqwest::{Client, StatusCode, Url};

use crate::cookies::{CookieRecord, RecordingJar};
use crate::error::AuthError;

/// An authenticated HTTP session against one account's origin.
///
/// The client shares a [`RecordingJar`] through `Arc`, so the session can
/// be snapshotted for persistence or rebuilt for worker tasks at any time.
/// A `Session` either passed the full login handshake or was restored from
/// a snapshot that later validates; there is no half-authenticated state.
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
    jar: Arc<RecordingJar>,
    base_url: String,
}

/// A fetched page after all redirects: the final URL, the final status and
/// the decoded body.
#[derive(Debug)]
pub struct PageResponse {
    pub url: Url,
    pub status: StatusCode,
    pub body: String,
}

impl Session {
    /// Builds a session seeded with the given cookie records.
    ///
    /// # Errors
    ///
    /// [`AuthError::Http`] when the underlying client cannot be constructed.
    pub fn build(
        base_url: &str,
        records: Vec<CookieRecord>,
        user_agent: &str,
        timeout_secs: u64,
    ) -> Result<Self, AuthError> {
        let jar = Arc::new(RecordingJar::from_records(records));
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .cookie_provider(Arc::clone(&jar))
            .build()?;
        Ok(Self {
            client,
            jar,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    #[must_use]
    pub fn jar(&self) -> &RecordingJar {
        &self.jar
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins a path (or absolute URL) onto this session's origin.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Current cookie state, suitable for persistence or a worker clone.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CookieRecord> {
        self.jar.snapshot()
    }

    /// GETs a page, following redirects, and decodes the body.
    ///
    /// # Errors
    ///
    /// [`AuthError::Http`] on network failure.
    pub async fn get_page(
        &self,
        url: &str,
        referer: Option<&str>,
    ) -> Result<PageResponse, AuthError> {
        let mut request = self.client.get(url);
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }
        let response = request.send().await?;
        let url = response.url().clone();
        let status = response.status();
        let body = response.text().await?;
        Ok(PageResponse { url, status, body })
    }

    /// POSTs a form-urlencoded payload and decodes the final page.
    ///
    /// # Errors
    ///
    /// [`AuthError::Http`] on network failure.
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
        referer: Option<&str>,
    ) -> Result<PageResponse, AuthError> {
        let mut request = self.client.post(url).form(form);
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }
        let response = request.send().await?;
        let url = response.url().clone();
        let status = response.status();
        let body = response.text().await?;
        Ok(PageResponse { url, status, body })
    }
}
