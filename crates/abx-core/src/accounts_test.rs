use std::collections::HashMap;
use std::env::VarError;

use super::{extract_credentials, Account};
use crate::error::ConfigError;

fn lookup_from<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

#[test]
fn registry_resolves_known_accounts_case_insensitively() {
    let jv = Account::from_registry("jv").expect("JV is registered");
    assert_eq!(jv.id, "JV");
    assert_eq!(jv.base_url, "https://farm01.afterbuy.de");
    assert_eq!(jv.host(), "farm01.afterbuy.de");

    let xl = Account::from_registry("XL").expect("XL is registered");
    assert_eq!(xl.base_url, "https://farm04.afterbuy.de");
}

#[test]
fn registry_rejects_unknown_id() {
    let err = Account::from_registry("ZZ").expect_err("ZZ is not registered");
    assert!(matches!(err, ConfigError::UnknownAccount(id) if id == "ZZ"));
}

#[test]
fn extracts_complete_pairs_only() {
    let mut env = HashMap::new();
    env.insert("JV_LOGIN", "merchant-jv");
    env.insert("JV_PASSWORD", "secret1");
    env.insert("XL_LOGIN", "merchant-xl");
    // XL_PASSWORD deliberately absent.

    let found = extract_credentials(lookup_from(&env));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0.id, "JV");
    assert_eq!(found[0].1.login, "merchant-jv");
}

#[test]
fn blank_login_is_skipped() {
    let mut env = HashMap::new();
    env.insert("JV_LOGIN", "   ");
    env.insert("JV_PASSWORD", "secret");

    assert!(extract_credentials(lookup_from(&env)).is_empty());
}

#[test]
fn accounts_come_back_in_registry_order() {
    let mut env = HashMap::new();
    env.insert("XL_LOGIN", "x");
    env.insert("XL_PASSWORD", "x");
    env.insert("JV_LOGIN", "j");
    env.insert("JV_PASSWORD", "j");

    let found = extract_credentials(lookup_from(&env));
    let ids: Vec<&str> = found.iter().map(|(a, _)| a.id.as_str()).collect();
    assert_eq!(ids, ["JV", "XL"]);
}

#[test]
fn credentials_debug_redacts_password() {
    let creds = super::Credentials {
        login: "merchant".to_string(),
        password: "hunter2".to_string(),
    };
    let rendered = format!("{creds:?}");
    assert!(rendered.contains("merchant"));
    assert!(!rendered.contains("hunter2"));
}
