use crate::auth::bridge::Bridge;
use crate::core::{BrowserLauncher, Config, ElementState, PageDriver, SessionState, SessionStore};
use crate::dom::FrameScope;
use crate::errors::{HarnessError, Result};
use crate::pages::WebUi;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// A session file was already present; nothing was launched.
    Skipped { path: PathBuf },
    Created { path: PathBuf, cookies: usize },
}

/// Make sure an authenticated session file exists, running the interactive
/// login only when it does not.
pub async fn ensure_session<L: BrowserLauncher>(
    launcher: &L,
    config: &Config,
) -> Result<BootstrapOutcome> {
    let store = SessionStore::new(&config.session.storage_state_path);
    if store.exists() {
        info!(
            "Session state found at {}, skipping login",
            store.path().display()
        );
        return Ok(BootstrapOutcome::Skipped {
            path: store.path().to_path_buf(),
        });
    }
    bootstrap(launcher, config, &store).await
}

/// Launch a browser, capture a fresh session and write it to `store`,
/// replacing whatever is there.
pub async fn bootstrap<L: BrowserLauncher>(
    launcher: &L,
    config: &Config,
    store: &SessionStore,
) -> Result<BootstrapOutcome> {
    // Both are needed before anything is launched.
    config.require_base_url()?;
    config.admin_url()?;

    let profile = config.default_profile();
    info!("Launching {} for interactive login", profile.name);
    let page = launcher.launch(&profile, None).await?;

    let state = capture_session(&page, config).await?;
    store.save(&state).await?;

    Ok(BootstrapOutcome::Created {
        path: store.path().to_path_buf(),
        cookies: state.cookies.len(),
    })
}

/// Wait for a human to log in to the admin, open the app once and return
/// the merged cookies and storage of both.
pub async fn capture_session<D: PageDriver>(page: &D, config: &Config) -> Result<SessionState> {
    let admin_url = config.admin_url()?;
    let base_url = config.require_base_url()?;
    let ui = WebUi::new(page, config);

    ui.open_website(&admin_url).await?;
    let ceiling = Duration::from_millis(config.session.login_ceiling_ms);
    info!(
        "Please log in manually in the browser window, waiting up to {}s",
        ceiling.as_secs()
    );
    wait_for_admin_login(page, config, ceiling).await?;
    info!("Admin login detected");
    let admin_state = page.storage_state().await?;

    ui.open_website(base_url).await?;
    wait_for_app_shell(page, config).await;
    let app_state = page.storage_state().await?;

    Ok(admin_state.merge(app_state))
}

async fn wait_for_admin_login<D: PageDriver>(
    page: &D,
    config: &Config,
    ceiling: Duration,
) -> Result<()> {
    let marker = FrameScope::top().locator(&config.session.login_marker).first();
    let waited = page.wait_for(&marker, ElementState::Visible, ceiling).await;
    let url = page.url().await.unwrap_or_default();

    match waited {
        Ok(()) if url.contains("/login") => Err(HarnessError::SessionState(format!(
            "post-login marker shown but still on a login page (current url: {})",
            url
        ))),
        Ok(()) => Ok(()),
        Err(e) => Err(HarnessError::Timeout(format!(
            "admin login not completed within {}s, marker {:?} never appeared (current url: {}): {}",
            ceiling.as_secs(),
            config.session.login_marker,
            url,
            e
        ))),
    }
}

/// Give the app a chance to set its own cookies. A shell that never renders
/// is logged; the admin session alone is still worth saving.
async fn wait_for_app_shell<D: PageDriver>(page: &D, config: &Config) {
    let bridge = Bridge::new(page, config);
    if let Err(e) = bridge.login().await {
        warn!("App login attempt failed during bootstrap: {}", e);
    }

    let ceiling = Duration::from_millis(config.session.shell_ceiling_ms);
    let iframe = FrameScope::top().locator(&bridge.app_iframe_selector()).first();
    match page.wait_for(&iframe, ElementState::Attached, ceiling).await {
        Ok(()) => info!("App shell rendered"),
        Err(e) => {
            let url = page.url().await.unwrap_or_default();
            warn!("App shell did not render (url: {}): {}", url, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedElement, ScriptedLauncher, ScriptedPage};

    #[tokio::test]
    async fn test_missing_store_fails_before_launch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        let config = Config::from_lookup(|key| match key {
            "BASE_URL" => Some("https://rc.pagefly.io".to_string()),
            "STORAGE_STATE_PATH" => Some(path.display().to_string()),
            _ => None,
        })
        .unwrap();
        let launcher = ScriptedLauncher::new(ScriptedPage::new("about:blank"));

        let err = ensure_session(&launcher, &config).await.unwrap_err();
        assert!(matches!(err, HarnessError::Configuration(_)));
        assert_eq!(launcher.launches(), 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_marker_on_login_page_is_rejected() {
        let page = ScriptedPage::new("about:blank");
        page.set_element(".Polaris-Navigation__Text", ScriptedElement::visible())
            .on_goto("/admin", |s| {
                s.url = "https://accounts.shopify.com/login".to_string()
            });
        let config = Config::from_lookup(|key| match key {
            "BASE_URL" => Some("https://rc.pagefly.io".to_string()),
            "STORE" => Some("demo".to_string()),
            _ => None,
        })
        .unwrap();

        let err = capture_session(&page, &config).await.unwrap_err();
        assert!(matches!(err, HarnessError::SessionState(_)));
        assert!(err.to_string().contains("accounts.shopify.com/login"));
    }
}
