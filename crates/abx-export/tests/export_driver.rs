//! Integration tests for the CSV export driver: the select-then-export
//! pair, response classification, atomic file handling and the row-count
//! retry ladder.

use std::path::Path;

use abx_core::accounts::{Account, Credentials};
use abx_core::AppConfig;
use abx_session::{Session, SessionPool};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use abx_export::definition::ExportConfig;
use abx_export::driver::{download_csv, run_export, ExportKind, ExportOptions, ExportTask};
use abx_export::error::ExportError;

const PRODUCT_PATH: &str = "/afterbuy/shop/produkte.aspx";
const EXPORT_PATH: &str = "/afterbuy/im-export.aspx";

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

fn test_config(root: &Path) -> AppConfig {
    AppConfig {
        log_level: "info".to_string(),
        session_dir: root.to_path_buf(),
        entities_dir: root.join("Fabriks"),
        items_dir: root.join("itemsF"),
        csv_dir: root.join("CSVDATA"),
        json_dir: root.join("readyJSON"),
        html_dir: root.join("readyhtml"),
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

fn export_config() -> ExportConfig {
    ExportConfig {
        definition_id: "72404".to_string(),
        export_format_id: "72404".to_string(),
        export_encoding: "1".to_string(),
        save_export_encoding: "1".to_string(),
        expprod: Some("3".to_string()),
    }
}

fn task(ids: usize) -> ExportTask {
    ExportTask {
        entity_id: "42".to_string(),
        entity_name: "Garten".to_string(),
        item_ids: (1..=ids).map(|n| n.to_string()).collect(),
        source_path: Path::new("Garten_42.json").to_path_buf(),
    }
}

fn session(server: &MockServer) -> Session {
    Session::build(&server.uri(), Vec::new(), "abx-test/0.1", 5).expect("client must build")
}

fn csv_body(rows: usize) -> String {
    let mut body = "id;name\n".to_string();
    for n in 1..=rows {
        body.push_str(&format!("{n};Artikel {n}\n"));
    }
    body
}

const LOGIN_PAGE: &str = r#"<html><body>
<form class="form-signin" method="post" action="/afterbuy/login.aspx">
  <input name="Username" /><input name="Password" type="password" />
</form></body></html>"#;

/// The handshake mocks the pool's initial connect walks through.
async fn mount_login_flow(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/afterbuy/login.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/afterbuy/login.aspx"))
        .and(body_string_contains("LoginView=ABLogin"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "FedAuth=abc123; Path=/")
                .set_body_string("<html><body>signed in</body></html>"),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/afterbuy/administration.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<title>Admin</title>ok"))
        .mount(server)
        .await;
}

/// Priming page and selection POST for the product flavor.
async fn mount_product_pages(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(PRODUCT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>liste</html>"))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(PRODUCT_PATH))
        .and(body_string_contains("art2=selectexportauswahl"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>markiert</html>"))
        .mount(server)
        .await;
}

async fn requests_to(server: &MockServer, target: &str, verb: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == target && r.method.as_str() == verb)
        .count()
}

// ---------------------------------------------------------------------------
// Download happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn download_streams_the_csv_through_a_temp_file() {
    let server = MockServer::start().await;
    mount_product_pages(&server).await;
    Mock::given(method("POST"))
        .and(path(EXPORT_PATH))
        .and(body_string_contains("art=export"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/csv; charset=utf-8")
                .set_body_string(csv_body(3)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let written = download_csv(
        &session(&server),
        ExportKind::Product,
        &task(3),
        dir.path(),
        &export_config(),
        5,
    )
    .await
    .expect("download must succeed");

    assert_eq!(
        written.file_name().and_then(|n| n.to_str()),
        Some("Garten_42.csv")
    );
    assert_eq!(std::fs::read_to_string(&written).unwrap(), csv_body(3));
    // No partial file survives the rename.
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with(".partial_"))
        .collect();
    assert!(leftovers.is_empty());
}

// ---------------------------------------------------------------------------
// Response classification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn html_body_instead_of_csv_counts_as_session_expiry() {
    let server = MockServer::start().await;
    mount_product_pages(&server).await;
    // Status 200: the server serves the sign-in page instead of the file.
    Mock::given(method("POST"))
        .and(path(EXPORT_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(LOGIN_PAGE, "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = download_csv(
        &session(&server),
        ExportKind::Product,
        &task(3),
        dir.path(),
        &export_config(),
        5,
    )
    .await
    .expect_err("HTML must be rejected");

    assert!(matches!(err, ExportError::UnexpectedHtmlResponse { .. }));
    assert!(err.is_session_expiry());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn failed_download_leaves_an_existing_file_untouched() {
    let server = MockServer::start().await;
    mount_product_pages(&server).await;
    // The refresh attempt dies after priming and selection.
    Mock::given(method("POST"))
        .and(path(EXPORT_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(LOGIN_PAGE, "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let previous = dir.path().join("Garten_42.csv");
    std::fs::write(&previous, csv_body(10)).unwrap();

    let err = download_csv(
        &session(&server),
        ExportKind::Product,
        &task(10),
        dir.path(),
        &export_config(),
        5,
    )
    .await
    .expect_err("HTML must be rejected");
    assert!(err.is_session_expiry());

    // The good file from the earlier run is byte-identical and alone.
    assert_eq!(std::fs::read_to_string(&previous).unwrap(), csv_body(10));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn empty_body_is_an_empty_export() {
    let server = MockServer::start().await;
    mount_product_pages(&server).await;
    Mock::given(method("POST"))
        .and(path(EXPORT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/csv")
                .set_body_string(""),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = download_csv(
        &session(&server),
        ExportKind::Product,
        &task(3),
        dir.path(),
        &export_config(),
        5,
    )
    .await
    .expect_err("empty body must be rejected");
    assert!(matches!(err, ExportError::EmptyExport { entity_id } if entity_id == "42"));
}

// ---------------------------------------------------------------------------
// Row-count verification and retry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn short_row_count_gets_one_immediate_retry() {
    let server = MockServer::start().await;
    mount_login_flow(&server).await;
    mount_product_pages(&server).await;
    // First export is short; the fallback serves the complete file.
    Mock::given(method("POST"))
        .and(path(EXPORT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/csv")
                .set_body_string(csv_body(7)),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(EXPORT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/csv")
                .set_body_string(csv_body(10)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let pool = SessionPool::connect(test_account(&server), test_credentials(), config.clone())
        .await
        .expect("initial connect");

    let out_dir = dir.path().join("csv");
    let tasks = vec![task(10)];
    let report = run_export(
        &pool,
        ExportKind::Product,
        &tasks,
        &out_dir,
        &export_config(),
        &config,
        ExportOptions::default(),
    )
    .await
    .expect("run must not abort");

    assert_eq!(report.succeeded, 1);
    assert!(report.failed.is_empty());
    assert_eq!(requests_to(&server, EXPORT_PATH, "POST").await, 2);
    // Each export attempt re-runs its selection.
    assert_eq!(requests_to(&server, PRODUCT_PATH, "POST").await, 2);
    assert_eq!(
        std::fs::read_to_string(out_dir.join("Garten_42.csv")).unwrap(),
        csv_body(10)
    );
}

#[tokio::test]
async fn existing_exports_are_skipped_when_asked() {
    let server = MockServer::start().await;
    mount_login_flow(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let out_dir = dir.path().join("csv");
    std::fs::create_dir_all(&out_dir).unwrap();
    std::fs::write(out_dir.join("Garten_42.csv"), csv_body(10)).unwrap();

    let pool = SessionPool::connect(test_account(&server), test_credentials(), config.clone())
        .await
        .expect("initial connect");

    let tasks = vec![task(10)];
    let report = run_export(
        &pool,
        ExportKind::Product,
        &tasks,
        &out_dir,
        &export_config(),
        &config,
        ExportOptions {
            skip_existing: true,
            ..ExportOptions::default()
        },
    )
    .await
    .expect("run must not abort");

    assert_eq!(report.skipped, 1);
    assert_eq!(report.succeeded, 0);
    assert_eq!(requests_to(&server, EXPORT_PATH, "POST").await, 0);
}
