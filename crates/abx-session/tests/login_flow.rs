//! Integration tests for the login handshake, session restore and the
//! worker session pool.
//!
//! Uses `wiremock` to play the back office: a sign-in page, the federation
//! hand-off chain and the protected administration page.

use std::path::Path;

use abx_core::accounts::{Account, Credentials};
use abx_core::AppConfig;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use abx_session::{cookies, login, AuthError, CookieRecord, SessionManager, SessionPool};

fn test_account(server: &MockServer) -> Account {
    Account {
        id: "JV".to_string(),
        base_url: server.uri(),
    }
}

fn test_credentials() -> Credentials {
    Credentials {
        login: "merchant".to_string(),
        password: "geheim".to_string(),
    }
}

fn test_config(session_dir: &Path) -> AppConfig {
    AppConfig {
        log_level: "info".to_string(),
        session_dir: session_dir.to_path_buf(),
        entities_dir: session_dir.join("Fabriks"),
        items_dir: session_dir.join("itemsF"),
        csv_dir: session_dir.join("CSVDATA"),
        json_dir: session_dir.join("readyJSON"),
        html_dir: session_dir.join("readyhtml"),
        user_agent: "abx-test/0.1".to_string(),
        http_timeout_secs: 5,
        export_timeout_secs: 5,
        enumerate_workers: 2,
        fetch_workers: 2,
        fetch_queue_depth: 4,
        fetch_max_attempts: 2,
        fetch_relogin_every: 100,
    }
}

const LOGIN_PAGE: &str = r#"<html><body>
<form class="mt-3 form-signin" method="post" action="/afterbuy/login.aspx?ReturnUrl=%2f">
  <input name="Username" /><input name="Password" type="password" />
</form></body></html>"#;

fn handoff_page(server: &MockServer) -> String {
    format!(
        r#"<html><head><title>Working...</title></head><body>
<form method="POST" name="hiddenform" action="{}/afterbuy/">
  <input type="hidden" name="wa" value="wsignin1.0" />
  <input type="hidden" name="wresult" value="signed-token" />
</form></body></html>"#,
        server.uri()
    )
}

const ADMIN_PAGE: &str = "<html><head><title>Administration</title></head><body>ok</body></html>";

/// Mounts the complete happy-path handshake. `times` bounds how many full
/// logins the server will serve.
async fn mount_login_flow(server: &MockServer, times: u64) {
    Mock::given(method("GET"))
        .and(path("/afterbuy/login.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .up_to_n_times(times)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/afterbuy/login.aspx"))
        .and(body_string_contains("LoginView=ABLogin"))
        .and(body_string_contains("Username=merchant"))
        .respond_with(ResponseTemplate::new(200).set_body_string(handoff_page(server)))
        .up_to_n_times(times)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/afterbuy/"))
        .and(body_string_contains("wa=wsignin1.0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "FedAuth=abc123; Path=/")
                .set_body_string("<html><body>signed in</body></html>"),
        )
        .up_to_n_times(times)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/afterbuy/administration.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ADMIN_PAGE))
        .mount(server)
        .await;
}

// ---------------------------------------------------------------------------
// Handshake happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_completes_the_federation_handshake() {
    let server = MockServer::start().await;
    mount_login_flow(&server, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let session = login::login(
        &test_account(&server),
        &test_credentials(),
        &test_config(dir.path()),
    )
    .await
    .expect("handshake must succeed");

    let snapshot = session.snapshot();
    assert!(
        snapshot.iter().any(|r| r.name == "FedAuth" && r.value == "abc123"),
        "FedAuth must be captured from the hand-off hop: {snapshot:?}"
    );
}

// ---------------------------------------------------------------------------
// Handshake failure variants
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_sign_in_form_fails_fast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/afterbuy/login.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = login::login(
        &test_account(&server),
        &test_credentials(),
        &test_config(dir.path()),
    )
    .await
    .expect_err("no form must fail");
    assert!(matches!(err, AuthError::FormNotFound));
}

#[tokio::test]
async fn error_status_after_credentials_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/afterbuy/login.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/afterbuy/login.aspx"))
        .respond_with(ResponseTemplate::new(500).set_body_string("server error"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = login::login(
        &test_account(&server),
        &test_credentials(),
        &test_config(dir.path()),
    )
    .await
    .expect_err("500 must fail");
    assert!(matches!(err, AuthError::LoginRejected { status: 500 }));
}

#[tokio::test]
async fn missing_fedauth_cookie_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/afterbuy/login.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;
    // Credentials accepted but the provider never issues the token.
    Mock::given(method("POST"))
        .and(path("/afterbuy/login.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>welcome</html>"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = login::login(
        &test_account(&server),
        &test_credentials(),
        &test_config(dir.path()),
    )
    .await
    .expect_err("missing token must fail");
    assert!(matches!(err, AuthError::FedAuthMissing));
}

#[tokio::test]
async fn verification_showing_the_sign_in_page_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/afterbuy/login.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/afterbuy/login.aspx"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "FedAuth=abc123; Path=/")
                .set_body_string("<html>ok</html>"),
        )
        .mount(&server)
        .await;
    // The protected page bounces back to sign-in: the token is worthless.
    Mock::given(method("GET"))
        .and(path("/afterbuy/administration.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = login::login(
        &test_account(&server),
        &test_credentials(),
        &test_config(dir.path()),
    )
    .await
    .expect_err("bounced verification must fail");
    assert!(matches!(err, AuthError::VerificationFailed));
}

// ---------------------------------------------------------------------------
// Lifecycle: restore and fall back
// ---------------------------------------------------------------------------

#[tokio::test]
async fn persisted_session_is_restored_without_logging_in() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/afterbuy/administration.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ADMIN_PAGE))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    cookies::save_records(
        &dir.path().join("jv_cookies.json"),
        &[CookieRecord {
            name: "FedAuth".to_string(),
            value: "still-valid".to_string(),
            domain: "127.0.0.1".to_string(),
            path: "/".to_string(),
            secure: false,
            expires: None,
        }],
    )
    .unwrap();

    let manager = SessionManager::new(config);
    let session = manager
        .ensure_authenticated(&test_account(&server), &test_credentials())
        .await
        .expect("restore must succeed");

    assert!(session
        .snapshot()
        .iter()
        .any(|r| r.name == "FedAuth" && r.value == "still-valid"));
    // No sign-in page was ever requested.
    let requests = server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .all(|r| r.url.path() != "/afterbuy/login.aspx"));
}

#[tokio::test]
async fn stale_snapshot_falls_back_to_full_login_and_repersists() {
    let server = MockServer::start().await;
    mount_login_flow(&server, 1).await;
    // First probe (with the stale cookie) bounces to sign-in; the mount
    // above serves the clean page for the post-login verification.
    Mock::given(method("GET"))
        .and(path("/afterbuy/administration.aspx"))
        .and(wiremock::matchers::header("Cookie", "FedAuth=stale"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .with_priority(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cookie_path = dir.path().join("jv_cookies.json");
    cookies::save_records(
        &cookie_path,
        &[CookieRecord {
            name: "FedAuth".to_string(),
            value: "stale".to_string(),
            domain: "127.0.0.1".to_string(),
            path: "/".to_string(),
            secure: false,
            expires: None,
        }],
    )
    .unwrap();

    let manager = SessionManager::new(test_config(dir.path()));
    let session = manager
        .ensure_authenticated(&test_account(&server), &test_credentials())
        .await
        .expect("fallback login must succeed");

    assert!(session
        .snapshot()
        .iter()
        .any(|r| r.name == "FedAuth" && r.value == "abc123"));
    let persisted = cookies::load_records(&cookie_path).unwrap().unwrap();
    assert!(persisted
        .iter()
        .any(|r| r.name == "FedAuth" && r.value == "abc123"));
}

// ---------------------------------------------------------------------------
// Session pool: single-flight refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pool_refresh_logs_in_once_per_generation() {
    let server = MockServer::start().await;
    // The server serves at most two full handshakes: the initial connect
    // and exactly one refresh.
    mount_login_flow(&server, 2).await;

    let dir = tempfile::tempdir().unwrap();
    let pool = SessionPool::connect(
        test_account(&server),
        test_credentials(),
        test_config(dir.path()),
    )
    .await
    .expect("initial connect");

    let (_session, generation) = pool.checkout().await.unwrap();
    assert_eq!(generation, 1);

    let (_fresh, new_generation) = pool.refresh(generation).await.expect("first refresh");
    assert_eq!(new_generation, 2);

    // A worker that observed the old generation must not trigger another
    // handshake.
    let (_reused, reused_generation) = pool.refresh(generation).await.expect("second refresh");
    assert_eq!(reused_generation, 2);

    let logins = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/afterbuy/login.aspx" && r.method.as_str() == "POST")
        .count();
    assert_eq!(logins, 2, "connect plus exactly one refresh");
}
