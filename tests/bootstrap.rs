use builder_e2e::auth::{ensure_session, BootstrapOutcome};
use builder_e2e::core::{CookieData, SessionState, SessionStore};
use builder_e2e::testing::{init_tracing, ScriptedElement, ScriptedLauncher, ScriptedPage};
use builder_e2e::Config;
use std::path::Path;

fn config(state_path: &Path) -> Config {
    let state_path = state_path.display().to_string();
    Config::from_lookup(|key| match key {
        "BASE_URL" => Some("https://rc.pagefly.io".to_string()),
        "STORE" => Some("demo".to_string()),
        "STORAGE_STATE_PATH" => Some(state_path.clone()),
        "LOGIN_CEILING_MS" => Some("1000".to_string()),
        "SHELL_CEILING_MS" => Some("500".to_string()),
        _ => None,
    })
    .unwrap()
}

fn cookie(name: &str, domain: &str) -> CookieData {
    CookieData {
        name: name.to_string(),
        value: "v".to_string(),
        domain: domain.to_string(),
        path: "/".to_string(),
        expires: -1.0,
        http_only: true,
        secure: true,
        same_site: None,
    }
}

#[tokio::test]
async fn existing_session_file_skips_login() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("auth-state.json");
    std::fs::write(&path, r#"{"cookies":[],"origins":[]}"#).unwrap();
    // no BASE_URL or STORE: the file check comes first
    let state_path = path.display().to_string();
    let config = Config::from_lookup(|key| {
        (key == "STORAGE_STATE_PATH").then(|| state_path.clone())
    })
    .unwrap();
    let launcher = ScriptedLauncher::new(ScriptedPage::new("about:blank"));

    let outcome = ensure_session(&launcher, &config).await.unwrap();

    assert_eq!(outcome, BootstrapOutcome::Skipped { path: path.clone() });
    assert_eq!(launcher.launches(), 0);
    assert!(launcher.page().visits().is_empty());
}

#[tokio::test]
async fn login_writes_merged_session_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("auth-state.json");
    let page = ScriptedPage::new("about:blank");
    page.set_storage(SessionState {
        cookies: vec![cookie("_secure_admin_session_id", ".myshopify.com")],
        ..SessionState::default()
    })
    .on_goto("demo.myshopify.com/admin", |s| {
        s.set(".Polaris-Navigation__Text", ScriptedElement::visible());
    })
    .on_goto("rc.pagefly.io", |s| {
        s.set(r#"iframe[name="app-iframe"]"#, ScriptedElement::visible());
        s.storage_mut().cookies.push(cookie("pf_session", "rc.pagefly.io"));
    });
    let launcher = ScriptedLauncher::new(page.clone());

    let outcome = ensure_session(&launcher, &config(&path)).await.unwrap();

    assert_eq!(
        outcome,
        BootstrapOutcome::Created {
            path: path.clone(),
            cookies: 2
        }
    );
    assert_eq!(launcher.launches(), 1);
    assert_eq!(
        page.visits(),
        vec![
            "https://demo.myshopify.com/admin".to_string(),
            "https://rc.pagefly.io".to_string()
        ]
    );

    let saved = SessionStore::new(&path).load().await.unwrap();
    assert_eq!(saved.cookies.len(), 2);
    assert!(saved.captured_at.is_some());
    let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn missing_login_marker_fails_with_url_and_writes_nothing() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("auth-state.json");
    let launcher = ScriptedLauncher::new(ScriptedPage::new("about:blank"));

    let err = ensure_session(&launcher, &config(&path)).await.unwrap_err();

    assert!(err.is_timeout());
    assert!(err.to_string().contains("https://demo.myshopify.com/admin"));
    assert!(!path.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn launch_failure_is_reported() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("auth-state.json");
    let launcher = ScriptedLauncher::failing("chrome binary not found");

    let err = ensure_session(&launcher, &config(&path)).await.unwrap_err();

    assert!(err.to_string().contains("chrome binary not found"));
    assert!(!path.exists());
}
