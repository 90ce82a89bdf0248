use std::collections::HashMap;
use std::env::VarError;
use std::path::Path;

use super::build_app_config;
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
fn defaults_apply_when_environment_is_empty() {
    let env = HashMap::new();
    let config = build_app_config(lookup_from(&env)).expect("empty env must produce defaults");

    assert_eq!(config.log_level, "info");
    assert_eq!(config.session_dir, Path::new("./sessions"));
    assert_eq!(config.items_dir, Path::new("./itemsF"));
    assert_eq!(config.http_timeout_secs, 30);
    assert_eq!(config.export_timeout_secs, 180);
    assert_eq!(config.fetch_workers, 8);
    assert_eq!(config.fetch_max_attempts, 3);
}

#[test]
fn overrides_are_honored() {
    let mut env = HashMap::new();
    env.insert("ABX_SESSION_DIR", "/tmp/abx-sessions");
    env.insert("ABX_FETCH_WORKERS", "4");
    env.insert("ABX_HTTP_TIMEOUT_SECS", "15");

    let config = build_app_config(lookup_from(&env)).expect("valid overrides must parse");

    assert_eq!(config.session_dir, Path::new("/tmp/abx-sessions"));
    assert_eq!(config.fetch_workers, 4);
    assert_eq!(config.http_timeout_secs, 15);
}

#[test]
fn invalid_numeric_value_is_rejected_with_var_name() {
    let mut env = HashMap::new();
    env.insert("ABX_FETCH_WORKERS", "many");

    let err = build_app_config(lookup_from(&env)).expect_err("non-numeric worker count");
    match err {
        ConfigError::InvalidEnvVar { var, .. } => assert_eq!(var, "ABX_FETCH_WORKERS"),
        other => panic!("expected InvalidEnvVar, got {other:?}"),
    }
}

#[test]
fn user_agent_default_is_a_browser_string() {
    let env = HashMap::new();
    let config = build_app_config(lookup_from(&env)).unwrap();
    assert!(config.user_agent.contains("Mozilla/5.0"));
}
