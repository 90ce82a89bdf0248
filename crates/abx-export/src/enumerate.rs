//! Offset-paginated enumeration of item ids per entity.
//!
//! Each result page of the lister list embeds the full id batch for the
//! page in a hidden input. Paging advances a row-offset parameter by the
//! configured page size until a short or empty page arrives.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use abx_core::entity::{Entity, ItemIdList};
use abx_core::filename::sanitize_name;
use abx_session::{markup, Session};
use futures::stream::{self, StreamExt};
use reqwest::header::REFERER;
use tracing::{debug, error, info};

use crate::error::ExportError;

pub const LISTER_ENDPOINT: &str = "/afterbuy/ebayliste2.aspx";
pub const HIDDEN_INPUT_NAME: &str = "allmyupdtids";
const OFFSET_PARAM: &str = "rsposition";
const DEFAULT_PAGE_SIZE: usize = 500;

/// Hard cap on pages per entity. Prevents infinite loops when the server
/// ignores the offset parameter and keeps serving the first page.
const MAX_PAGES: usize = 200;

/// One paginated listing query: endpoint, fixed filter parameters and the
/// names of the moving parts.
#[derive(Debug, Clone)]
pub struct PageQuery {
    pub endpoint: String,
    pub base_params: Vec<(String, String)>,
    pub id_param: String,
    pub entity_id: String,
    pub page_size_keys: Vec<String>,
    pub offset_param: String,
    pub hidden_input: String,
    pub referer_path: Option<String>,
}

/// The fixed filter set the lister list expects. Everything is neutral
/// except the collection filter, which [`lister_page_query`] fills in.
fn lister_base_params() -> Vec<(String, String)> {
    [
        ("art", "SetAuswahl"),
        ("lAWSuchwort", ""),
        ("lAWFilter", "0"),
        ("lAWFilter2", "0"),
        ("I_Stammartikel", ""),
        ("siteIDsuche", "-1"),
        ("lAWartikelnummer", ""),
        ("lAWKollektion", ""),
        ("lAWKollektion1", "-1"),
        ("lAWKollektion2", "-1"),
        ("lAWKollektion3", "-1"),
        ("lAWKollektion4", "-1"),
        ("lAWKollektion5", "-1"),
        ("lAWean", ""),
        ("Vorlage", ""),
        ("Vorlageart", "0"),
        ("lAWebaykat", ""),
        ("lAWshopcat1", "-1"),
        ("lAWshopcat2", "-1"),
        ("lawmaxart", "500"),
        ("maxgesamt", "15000"),
        ("BlockingReason", ""),
        ("DispatchTimeMax", "-1"),
        ("listerId", ""),
        ("ebayLister_DynamicPriceRules", "-100"),
        ("lAWSellerPaymentProfile", "0"),
        ("lAWSellerReturnPolicyProfile", "0"),
        ("lAWSellerShippingProfile", "0"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// The query for one lister collection.
#[must_use]
pub fn lister_page_query(entity_id: &str) -> PageQuery {
    PageQuery {
        endpoint: LISTER_ENDPOINT.to_string(),
        base_params: lister_base_params(),
        id_param: "lAWKollektion".to_string(),
        entity_id: entity_id.to_string(),
        page_size_keys: vec!["lawmaxart".to_string(), "maxgesamt".to_string()],
        offset_param: OFFSET_PARAM.to_string(),
        hidden_input: HIDDEN_INPUT_NAME.to_string(),
        referer_path: Some(format!("{LISTER_ENDPOINT}?art=SetAuswahl")),
    }
}

fn page_size_of(query: &PageQuery) -> usize {
    for key in &query.page_size_keys {
        let Some((_, value)) = query.base_params.iter().find(|(k, _)| k == key) else {
            continue;
        };
        if let Ok(candidate) = value.parse::<usize>() {
            if candidate > 0 {
                return candidate;
            }
        }
    }
    DEFAULT_PAGE_SIZE
}

/// Collects every item id of one entity, paging until exhaustion.
///
/// Ids are deduplicated first-seen-wins, preserving server order. The loop
/// stops on an empty batch, a page that adds nothing new, or a page
/// shorter than the page size.
///
/// # Errors
///
/// - [`ExportError::UnexpectedStatus`] on non-2xx pages.
/// - [`ExportError::SessionExpired`] when a page is the sign-in form.
/// - [`ExportError::HiddenFieldMissing`] when the first page lacks the id
///   batch input entirely; a well-formed result page always carries it.
/// - [`ExportError::PaginationLimit`] after [`MAX_PAGES`] pages.
pub async fn fetch_item_ids(
    session: &Session,
    query: &PageQuery,
) -> Result<Vec<String>, ExportError> {
    let base_url = session.url(&query.endpoint);
    let referer = query
        .referer_path
        .as_ref()
        .map_or_else(|| base_url.clone(), |p| session.url(p));
    let page_size = page_size_of(query);

    let mut collected: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut offset = 0usize;

    for page in 0usize.. {
        if page >= MAX_PAGES {
            return Err(ExportError::PaginationLimit {
                entity_id: query.entity_id.clone(),
                max_pages: MAX_PAGES,
            });
        }

        let mut params = query.base_params.clone();
        if let Some(slot) = params.iter_mut().find(|(k, _)| *k == query.id_param) {
            slot.1 = query.entity_id.clone();
        } else {
            params.push((query.id_param.clone(), query.entity_id.clone()));
        }
        if offset > 0 {
            params.push((query.offset_param.clone(), offset.to_string()));
        }

        let response = session
            .client()
            .get(&base_url)
            .query(&params)
            .header(REFERER, &referer)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::UnexpectedStatus {
                status: status.as_u16(),
                url: base_url,
            });
        }
        let body = response.text().await?;
        if markup::contains_login_form(&body) {
            return Err(ExportError::SessionExpired { url: base_url });
        }

        let value = markup::hidden_input_value(&body, &query.hidden_input);
        let Some(value) = value else {
            if page == 0 {
                return Err(ExportError::HiddenFieldMissing {
                    field: query.hidden_input.clone(),
                    url: base_url,
                });
            }
            break;
        };
        let tokens: Vec<&str> = value.split(',').filter(|t| !t.is_empty()).collect();
        if tokens.is_empty() {
            break;
        }

        let mut added = 0usize;
        for token in &tokens {
            if seen.insert((*token).to_string()) {
                collected.push((*token).to_string());
                added += 1;
            }
        }
        debug!(
            entity_id = %query.entity_id,
            offset,
            added,
            total = collected.len(),
            "enumeration page processed"
        );

        if added == 0 || tokens.len() < page_size {
            break;
        }
        offset += page_size;
    }

    Ok(collected)
}

/// Per-entity outcome of an enumeration pass.
pub struct EnumerateOutcome {
    pub entity: Entity,
    pub result: Result<(usize, PathBuf), ExportError>,
}

/// Enumerates every entity concurrently (at most `workers` in flight) and
/// writes one [`ItemIdList`] envelope per entity into `output_dir`.
/// Failures are reported, never fatal for the pass.
pub async fn enumerate_entities(
    session: &Session,
    entities: &[Entity],
    output_dir: &Path,
    workers: usize,
) -> Vec<EnumerateOutcome> {
    let outcomes = stream::iter(entities.iter().cloned())
        .map(|entity| {
            let session = session.clone();
            let output_dir = output_dir.to_path_buf();
            async move {
                let result = enumerate_one(&session, &entity, &output_dir).await;
                EnumerateOutcome { entity, result }
            }
        })
        .buffer_unordered(workers.max(1))
        .collect::<Vec<_>>()
        .await;

    for outcome in &outcomes {
        match &outcome.result {
            Ok((count, path)) => info!(
                entity = %outcome.entity.name,
                entity_id = %outcome.entity.id,
                items = count,
                path = %path.display(),
                "item ids saved"
            ),
            Err(err) => error!(
                entity = %outcome.entity.name,
                entity_id = %outcome.entity.id,
                error = %err,
                "enumeration failed"
            ),
        }
    }
    outcomes
}

async fn enumerate_one(
    session: &Session,
    entity: &Entity,
    output_dir: &Path,
) -> Result<(usize, PathBuf), ExportError> {
    let query = lister_page_query(&entity.id);
    let item_ids = fetch_item_ids(session, &query).await?;
    let count = item_ids.len();

    let path = output_dir.join(format!("{}_{}.json", sanitize_name(&entity.name), entity.id));
    let envelope = ItemIdList::new(entity.id.clone(), entity.name.clone(), item_ids);
    envelope
        .save(&path)
        .map_err(|err| ExportError::InvalidEnvelope {
            path: path.clone(),
            reason: err.to_string(),
        })?;
    Ok((count, path))
}
