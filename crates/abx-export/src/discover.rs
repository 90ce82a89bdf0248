//! Discovery of the product groupings an account actually has.
//!
//! Catalog factories come from the XHR endpoint the product search page
//! uses to populate its filter dropdown; lister collections come from the
//! collection select on the lister list itself.

use abx_core::entity::Entity;
use abx_session::{markup, Session};
use reqwest::header::{HeaderValue, ACCEPT, REFERER};

use crate::error::ExportError;

const CATALOG_ENDPOINT: &str = "/afterbuy/Interfaces/Catalogs.aspx";
const CATALOG_REFERER: &str = "/afterbuy/shop/produkte.aspx?newsearch=1&DT=1";
const LISTER_PAGE: &str = "/afterbuy/ebayliste2.aspx";
const LISTER_SELECT_NAME: &str = "lAWKollektion";

/// Parses the catalog dropdown fragment. Only strictly positive numeric
/// values are factories; the bracketed item count is stripped from names.
#[must_use]
pub fn parse_catalog_options(html: &str) -> Vec<Entity> {
    markup::select_options(html, "katList")
        .into_iter()
        .filter(|option| option.value.trim().parse::<i64>().is_ok_and(|id| id > 0))
        .map(|option| {
            let name = option
                .label
                .split_once('[')
                .map_or(option.label.as_str(), |(before, _)| before)
                .trim()
                .to_string();
            Entity {
                id: option.value.trim().to_string(),
                name,
                item_count: None,
            }
        })
        .collect()
}

/// Parses the lister collection select, skipping the placeholder entries.
#[must_use]
pub fn parse_lister_options(html: &str) -> Vec<Entity> {
    markup::select_options(html, LISTER_SELECT_NAME)
        .into_iter()
        .filter(|option| option.value != "0" && option.value != "-1")
        .map(|option| Entity {
            id: option.value,
            name: option.label,
            item_count: None,
        })
        .collect()
}

/// Fetches the catalog factory list for this session's account.
///
/// # Errors
///
/// [`ExportError::SessionExpired`] when the fragment is the sign-in page,
/// [`ExportError::UnexpectedStatus`] on non-2xx, [`ExportError::Http`] on
/// network failure.
pub async fn fetch_catalog_entities(session: &Session) -> Result<Vec<Entity>, ExportError> {
    let url = session.url(CATALOG_ENDPOINT);
    let response = session
        .client()
        .get(&url)
        .query(&[
            ("selectedName", "Katalog_Filter"),
            ("selectBoxId", "katList"),
            ("cssClasses", "ab-form-control input-sm form-control"),
        ])
        .header(REFERER, session.url(CATALOG_REFERER))
        .header(ACCEPT, HeaderValue::from_static("text/html, */*; q=0.01"))
        .header("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"))
        .send()
        .await?;
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
    Ok(parse_catalog_options(&body))
}

/// Fetches the lister collection list for this session's account.
///
/// # Errors
///
/// Same failure modes as [`fetch_catalog_entities`].
pub async fn fetch_lister_entities(session: &Session) -> Result<Vec<Entity>, ExportError> {
    let url = session.url(LISTER_PAGE);
    let response = session
        .client()
        .get(&url)
        .query(&[("newsearch", "1"), ("DT", "1")])
        .header(REFERER, &url)
        .send()
        .await?;
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
    Ok(parse_lister_options(&body))
}
