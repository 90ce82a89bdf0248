//! The interactive login handshake.
//!
//! The back office fronts its farms with a WS-Federation identity provider:
//! posting credentials yields a chain of auto-submitting hidden forms that
//! bounce the browser between the provider and the farm until the `FedAuth`
//! token lands. The token is issued for the farm host only, but some
//! endpoints sit on the bare parent domain, so the cookie is re-inserted
//! with widened scope after the handshake.

use abx_core::accounts::{Account, Credentials};
use abx_core::AppConfig;
use reqwest::Url;
use tracing::{debug, info};

use crate::cookies::CookieRecord;
use crate::error::AuthError;
use crate::markup;
use crate::session::{PageResponse, Session};

pub const LOGIN_PATH: &str = "/afterbuy/login.aspx";
pub const PROTECTED_PATH: &str = "/afterbuy/administration.aspx";

/// Maximum auto-submit hops after the credential POST. The real chain is
/// two or three hops; more than five means the provider is looping.
const MAX_HIDDEN_FORM_HOPS: usize = 5;

const FEDAUTH_COOKIE: &str = "FedAuth";

/// Runs the full handshake and returns a verified session.
///
/// Nothing touches the disk here; persistence of the resulting cookie
/// snapshot is the lifecycle layer's concern.
///
/// # Errors
///
/// Any [`AuthError`] variant; all are fatal for this account.
pub async fn login(
    account: &Account,
    credentials: &Credentials,
    config: &AppConfig,
) -> Result<Session, AuthError> {
    let session = Session::build(
        &account.base_url,
        Vec::new(),
        &config.user_agent,
        config.http_timeout_secs,
    )?;
    info!(account = %account.id, "starting login handshake");

    let login_page = session.get_page(&session.url(LOGIN_PATH), None).await?;
    let action = markup::login_form_action(&login_page.body).ok_or(AuthError::FormNotFound)?;
    let action = resolve(&login_page.url, &action);

    let payload = [
        ("LoginView".to_string(), "ABLogin".to_string()),
        ("Username".to_string(), credentials.login.clone()),
        ("Password".to_string(), credentials.password.clone()),
        ("StaySignedIn".to_string(), "true".to_string()),
        ("B1".to_string(), "Anmelden".to_string()),
    ];
    let response = session.post_form(&action, &payload, None).await?;
    let response = follow_hidden_forms(&session, response).await?;

    if response.status.as_u16() >= 400 {
        return Err(AuthError::LoginRejected {
            status: response.status.as_u16(),
        });
    }

    widen_fedauth_scope(&session, account)?;

    if !probe_is_authenticated(&session).await? {
        return Err(AuthError::VerificationFailed);
    }
    info!(account = %account.id, "login verified");
    Ok(session)
}

/// Submits auto-submit hidden forms until a page without one arrives.
///
/// # Errors
///
/// [`AuthError::Http`] on network failure during a hop.
pub async fn follow_hidden_forms(
    session: &Session,
    mut current: PageResponse,
) -> Result<PageResponse, AuthError> {
    for hop in 0..MAX_HIDDEN_FORM_HOPS {
        let Some(form) = markup::hidden_form(&current.body) else {
            break;
        };
        let action = resolve(&current.url, &form.action);
        debug!(hop, action = %action, "submitting federation hand-off form");
        current = session
            .post_form(&action, &form.fields, Some(current.url.as_str()))
            .await?;
    }
    Ok(current)
}

/// GETs the protected page and reports whether the session holds.
///
/// The body must be free of the sign-in marker; hand-off pages on the way
/// are followed first.
///
/// # Errors
///
/// [`AuthError::Http`] on network failure.
pub async fn probe_is_authenticated(session: &Session) -> Result<bool, AuthError> {
    let page = session.get_page(&session.url(PROTECTED_PATH), None).await?;
    let page = follow_hidden_forms(session, page).await?;
    Ok(page.status.is_success() && !markup::contains_login_form(&page.body))
}

/// Stricter variant used when restoring a persisted session: any of the
/// three markers (sign-in form, hand-off form, interstitial title) means
/// the snapshot is stale.
///
/// # Errors
///
/// [`AuthError::Http`] on network failure.
pub async fn probe_restored_session(session: &Session) -> Result<bool, AuthError> {
    let page = session.get_page(&session.url(PROTECTED_PATH), None).await?;
    Ok(page.status == reqwest::StatusCode::OK
        && !markup::contains_login_form(&page.body)
        && !markup::contains_hidden_form(&page.body)
        && !markup::contains_working_title(&page.body))
}

/// Re-inserts the `FedAuth` token for the exact farm host and for the
/// parent wildcard domain, preserving its secure flag and expiry.
fn widen_fedauth_scope(session: &Session, account: &Account) -> Result<(), AuthError> {
    let original = session
        .snapshot()
        .into_iter()
        .find(|r| r.name == FEDAUTH_COOKIE)
        .ok_or(AuthError::FedAuthMissing)?;

    let host = account.host().to_string();
    let mut scopes = vec![host.clone()];
    if host.parse::<std::net::IpAddr>().is_err() {
        if let Some((_, parent)) = host.split_once('.') {
            if parent.contains('.') {
                scopes.push(format!(".{parent}"));
            }
        }
    }
    for domain in scopes {
        session.jar().insert_scoped(CookieRecord {
            domain,
            ..original.clone()
        });
    }
    Ok(())
}

fn resolve(base: &Url, action: &str) -> String {
    base.join(action)
        .map_or_else(|_| action.to_string(), |url| url.to_string())
}

#[cfg(test)]
#[path = "login_test.rs"]
mod tests;
