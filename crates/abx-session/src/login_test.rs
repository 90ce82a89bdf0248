use abx_core::accounts::Account;

use super::widen_fedauth_scope;
use crate::cookies::CookieRecord;
use crate::error::AuthError;
use crate::session::Session;

fn farm_session() -> Session {
    Session::build("https://farm01.afterbuy.de", Vec::new(), "test-agent", 5)
        .expect("client builds")
}

#[test]
fn fedauth_token_is_widened_to_the_parent_domain() {
    let session = farm_session();
    session.jar().insert_scoped(CookieRecord {
        name: "FedAuth".to_string(),
        value: "tok".to_string(),
        domain: "farm01.afterbuy.de".to_string(),
        path: "/".to_string(),
        secure: true,
        expires: Some(4_000_000_000),
    });
    let account = Account::from_registry("JV").unwrap();

    widen_fedauth_scope(&session, &account).unwrap();

    let snapshot = session.snapshot();
    let domains: Vec<&str> = snapshot
        .iter()
        .filter(|r| r.name == "FedAuth")
        .map(|r| r.domain.as_str())
        .collect();
    assert!(domains.contains(&"farm01.afterbuy.de"));
    assert!(domains.contains(&".afterbuy.de"));

    let widened = snapshot
        .iter()
        .find(|r| r.domain == ".afterbuy.de")
        .unwrap();
    assert!(widened.secure, "secure flag must carry over");
    assert_eq!(widened.expires, Some(4_000_000_000));
}

#[test]
fn missing_fedauth_token_is_an_error() {
    let session = farm_session();
    let account = Account::from_registry("JV").unwrap();

    let err = widen_fedauth_scope(&session, &account).unwrap_err();
    assert!(matches!(err, AuthError::FedAuthMissing));
}
