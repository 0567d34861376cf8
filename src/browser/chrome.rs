use crate::browser::navigation::NavigationManager;
use crate::core::config::{BrowserProfile, Config};
use crate::core::session::{origin_of, CookieData, OriginStorage, SessionState};
use crate::core::{BrowserLauncher, ClickOptions, ElementState, LoadState, PageDriver};
use crate::dom::{script, FrameScope, Locator};
use crate::errors::{HarnessError, Result};
use crate::types::{ElementRect, Point};
use async_trait::async_trait;
use headless_chrome::browser::tab::ModifierKey;
use headless_chrome::protocol::cdp::Network::CookieParam;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Deserialize;
use serde_json::{json, Value};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Launches Chromium over CDP.
///
/// Site isolation is switched off so that the locator runtime can reach into
/// cross-origin iframes (the app frame, the editor modal, the sandbox) through
/// `contentDocument`.
#[derive(Debug, Clone)]
pub struct ChromeBrowser {
    force_headless: bool,
    action_timeout: Duration,
    navigation_timeout: Duration,
}

impl ChromeBrowser {
    pub fn new(config: &Config) -> Self {
        Self {
            force_headless: config.app.headless,
            action_timeout: config.action_timeout(),
            navigation_timeout: config.navigation_timeout(),
        }
    }

    fn launch_args(profile: &BrowserProfile) -> Vec<String> {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-web-security".to_string(),
            "--disable-features=IsolateOrigins,site-per-process".to_string(),
            "--disable-site-isolation-trials".to_string(),
            format!(
                "--window-size={},{}",
                profile.viewport.width, profile.viewport.height
            ),
        ];

        if let Some(ref ua) = profile.user_agent {
            args.push(format!("--user-agent={}", ua));
        }

        if profile.ignore_https_errors {
            args.push("--ignore-certificate-errors".to_string());
        }

        args.extend(profile.args.iter().cloned());
        args
    }

    fn headless_for(&self, profile: &BrowserProfile) -> bool {
        self.force_headless || profile.headless.unwrap_or(true)
    }
}

#[async_trait]
impl BrowserLauncher for ChromeBrowser {
    type Page = ChromePage;

    async fn launch(
        &self,
        profile: &BrowserProfile,
        state: Option<&SessionState>,
    ) -> Result<ChromePage> {
        let args = Self::launch_args(profile);
        let headless = self.headless_for(profile);
        info!(
            "Launching {} ({}x{}, headless: {})",
            profile.name, profile.viewport.width, profile.viewport.height, headless
        );

        let launch_options = LaunchOptions::default_builder()
            .headless(headless)
            .args(args.iter().map(OsStr::new).collect())
            .idle_browser_timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| HarnessError::LaunchFailed(e.to_string()))?;

        let browser =
            Browser::new(launch_options).map_err(|e| HarnessError::LaunchFailed(e.to_string()))?;

        let tab = browser
            .new_tab()
            .map_err(|e| HarnessError::LaunchFailed(e.to_string()))?;
        tab.set_default_timeout(self.navigation_timeout);

        let page = ChromePage {
            _browser: browser,
            tab,
            action_timeout: self.action_timeout,
            navigation_timeout: self.navigation_timeout,
        };

        if let Some(state) = state {
            page.apply_storage_state(state).await?;
        }

        Ok(page)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Probe {
    count: usize,
    visible: bool,
    enabled: bool,
}

/// A Chromium tab driven through `Runtime.evaluate` and input events.
pub struct ChromePage {
    // Dropping the handle kills the browser process.
    _browser: Browser,
    tab: Arc<Tab>,
    action_timeout: Duration,
    navigation_timeout: Duration,
}

impl ChromePage {
    pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    fn eval(&self, script: &str) -> Result<Value> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| HarnessError::JavaScriptFailed(e.to_string()))?;
        Ok(result.value.unwrap_or(Value::Null))
    }

    fn probe(&self, locator: &Locator) -> Result<Probe> {
        let value = self.eval(&script::probe(locator))?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    /// Polls until `check` accepts the probe or the timeout elapses.
    async fn poll_until<F>(
        &self,
        locator: &Locator,
        timeout: Duration,
        what: &str,
        check: F,
    ) -> Result<()>
    where
        F: Fn(&Probe) -> bool + Send + Sync,
    {
        let max_polls = (timeout.as_millis() / Self::POLL_INTERVAL.as_millis()).max(1);
        for _ in 0..max_polls {
            match self.probe(locator) {
                Ok(probe) if check(&probe) => return Ok(()),
                Ok(_) => {}
                Err(e) => debug!("Probe for {} failed, retrying: {}", locator, e),
            }
            tokio::time::sleep(Self::POLL_INTERVAL).await;
        }
        Err(HarnessError::Timeout(format!(
            "{}ms exceeded waiting for {} to be {}",
            timeout.as_millis(),
            locator,
            what
        )))
    }

    async fn actionable(&self, locator: &Locator) -> Result<()> {
        self.poll_until(locator, self.action_timeout, "visible and enabled", |p| {
            p.count > 0 && p.visible && p.enabled
        })
        .await
    }

    async fn attached(&self, locator: &Locator) -> Result<()> {
        self.poll_until(locator, self.action_timeout, "attached", |p| p.count > 0)
            .await
    }

    /// Maps a `{ success, error }` result from an action script.
    fn expect_success(value: Value, locator: &Locator) -> Result<()> {
        if value.get("success").and_then(Value::as_bool).unwrap_or(false) {
            return Ok(());
        }
        let error = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        if error.contains("not found") {
            Err(HarnessError::ElementNotFound(format!("{} ({})", locator, error)))
        } else {
            Err(HarnessError::JavaScriptFailed(format!("{}: {}", locator, error)))
        }
    }

    fn cookie_param(cookie: &CookieData) -> Result<CookieParam> {
        let mut param = json!({
            "name": cookie.name,
            "value": cookie.value,
            "domain": cookie.domain,
            "path": cookie.path,
            "httpOnly": cookie.http_only,
            "secure": cookie.secure,
        });
        if cookie.expires > 0.0 {
            param["expires"] = json!(cookie.expires);
        }
        if let Some(ref same_site) = cookie.same_site {
            param["sameSite"] = json!(same_site);
        }
        Ok(serde_json::from_value(param)?)
    }
}

fn split_chord(chord: &str) -> (Vec<ModifierKey>, &str) {
    let mut parts: Vec<&str> = chord.split('+').collect();
    let key = parts.pop().unwrap_or(chord);
    let modifiers = parts
        .iter()
        .filter_map(|m| match m.to_ascii_lowercase().as_str() {
            "control" | "ctrl" => Some(ModifierKey::Ctrl),
            "shift" => Some(ModifierKey::Shift),
            "alt" => Some(ModifierKey::Alt),
            "meta" | "command" => Some(ModifierKey::Meta),
            _ => None,
        })
        .collect();
    (modifiers, key)
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn goto(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        self.tab
            .navigate_to(url)
            .map_err(|e| HarnessError::NavigationFailed(format!("{}: {}", url, e)))?;
        self.tab.wait_until_navigated().map_err(|e| {
            HarnessError::Timeout(format!(
                "navigation to {} not finished within {}ms: {}",
                url,
                self.navigation_timeout.as_millis(),
                e
            ))
        })?;
        Ok(())
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<()> {
        NavigationManager::wait_for_load_state(self, state, timeout).await?;
        Ok(())
    }

    async fn url(&self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    async fn title(&self) -> Result<String> {
        let result = self.eval("document.title")?;
        Ok(result.as_str().unwrap_or("").to_string())
    }

    async fn count(&self, locator: &Locator) -> Result<usize> {
        let value = self.eval(&script::count(locator))?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn wait_for(
        &self,
        locator: &Locator,
        state: ElementState,
        timeout: Duration,
    ) -> Result<()> {
        let what = state.as_str();
        match state {
            ElementState::Attached => self.poll_until(locator, timeout, what, |p| p.count > 0).await,
            ElementState::Detached => {
                self.poll_until(locator, timeout, what, |p| p.count == 0).await
            }
            ElementState::Visible => {
                self.poll_until(locator, timeout, what, |p| p.count > 0 && p.visible)
                    .await
            }
            ElementState::Hidden => self.poll_until(locator, timeout, what, |p| !p.visible).await,
            ElementState::Enabled => {
                self.poll_until(locator, timeout, what, |p| p.visible && p.enabled)
                    .await
            }
        }
    }

    async fn has_frame(&self, frame: &FrameScope) -> Result<bool> {
        if frame.is_top() {
            return Ok(true);
        }
        let value = self.eval(&script::in_frame(frame, "true"))?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click(&self, locator: &Locator, options: ClickOptions) -> Result<()> {
        if options.force {
            self.attached(locator).await?;
        } else {
            self.actionable(locator).await?;
        }
        let value = self.eval(&script::click(
            locator,
            options.button.code(),
            options.click_count,
        ))?;
        Self::expect_success(value, locator)
    }

    async fn fill(&self, locator: &Locator, value: &str) -> Result<()> {
        self.actionable(locator).await?;
        let result = self.eval(&script::fill(locator, value))?;
        Self::expect_success(result, locator)
    }

    async fn type_text(&self, locator: &Locator, text: &str) -> Result<()> {
        self.actionable(locator).await?;
        Self::expect_success(self.eval(&script::focus(locator))?, locator)?;
        self.tab
            .type_str(text)
            .map_err(HarnessError::from_any_error)?;
        Ok(())
    }

    async fn press(&self, key: &str) -> Result<()> {
        let (modifiers, key) = split_chord(key);
        let result = if modifiers.is_empty() {
            self.tab.press_key(key).map(|_| ())
        } else {
            self.tab
                .press_key_with_modifiers(key, Some(modifiers.as_slice()))
                .map(|_| ())
        };
        result.map_err(HarnessError::from_any_error)
    }

    async fn hover(&self, locator: &Locator) -> Result<()> {
        self.actionable(locator).await?;
        Self::expect_success(self.eval(&script::hover(locator))?, locator)
    }

    async fn select_option(&self, locator: &Locator, value: &str) -> Result<()> {
        self.actionable(locator).await?;
        Self::expect_success(self.eval(&script::select_option(locator, value))?, locator)
    }

    async fn set_checked(&self, locator: &Locator, checked: bool) -> Result<()> {
        self.actionable(locator).await?;
        Self::expect_success(self.eval(&script::set_checked(locator, checked))?, locator)
    }

    async fn scroll_into_view(&self, locator: &Locator) -> Result<()> {
        self.attached(locator).await?;
        Self::expect_success(self.eval(&script::scroll_into_view(locator))?, locator)
    }

    async fn text_content(&self, locator: &Locator) -> Result<Option<String>> {
        self.attached(locator).await?;
        let value = self.eval(&script::text_content(locator))?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn input_value(&self, locator: &Locator) -> Result<String> {
        self.attached(locator).await?;
        let value = self.eval(&script::input_value(locator))?;
        Ok(value.as_str().unwrap_or("").to_string())
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        self.attached(locator).await?;
        let value = self.eval(&script::attribute(locator, name))?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool> {
        Ok(self.probe(locator)?.visible)
    }

    async fn is_enabled(&self, locator: &Locator) -> Result<bool> {
        let probe = self.probe(locator)?;
        Ok(probe.count > 0 && probe.enabled)
    }

    async fn bounding_box(&self, locator: &Locator) -> Result<Option<ElementRect>> {
        let value = self.eval(&script::bounding_box(locator))?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    async fn drag_to(
        &self,
        source: &Locator,
        target: &Locator,
        position: Option<Point>,
    ) -> Result<()> {
        self.actionable(source).await?;
        self.attached(target).await?;
        let value = self.eval(&script::drag_to(source, target, position))?;
        Self::expect_success(value, source)
    }

    async fn evaluate(&self, frame: &FrameScope, js: &str) -> Result<Value> {
        let value = self.eval(&script::in_frame(frame, js))?;
        if value.get("__missingFrame").is_some() {
            return Err(HarnessError::ElementNotFound(format!("frame {}", frame)));
        }
        Ok(value)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(HarnessError::from_any_error)
    }

    async fn storage_state(&self) -> Result<SessionState> {
        let cookies = self
            .tab
            .get_cookies()
            .map_err(HarnessError::from_any_error)?
            .into_iter()
            .filter_map(|cookie| {
                serde_json::to_value(cookie)
                    .and_then(serde_json::from_value::<CookieData>)
                    .ok()
            })
            .collect::<Vec<_>>();

        let origins: Vec<OriginStorage> =
            serde_json::from_value(self.eval(script::STORAGE_SNAPSHOT)?)?;

        debug!(
            "Captured {} cookies and storage for {} origins",
            cookies.len(),
            origins.len()
        );

        Ok(SessionState {
            cookies,
            origins,
            captured_at: Some(chrono::Utc::now()),
        })
    }

    async fn apply_storage_state(&self, state: &SessionState) -> Result<()> {
        let params = state
            .cookies
            .iter()
            .map(Self::cookie_param)
            .collect::<Result<Vec<_>>>()?;
        if !params.is_empty() {
            self.tab
                .set_cookies(params)
                .map_err(HarnessError::from_any_error)?;
        }

        // Web storage is origin-bound, so each origin has to be loaded once.
        for origin in &state.origins {
            if origin.local_storage.is_empty() && origin.session_storage.is_empty() {
                continue;
            }
            let Some(target) = origin_of(&origin.origin) else {
                debug!("Skipping storage for opaque origin {:?}", origin.origin);
                continue;
            };
            if let Err(e) = self.goto(&target).await {
                warn!("Could not open {} to restore storage: {}", origin.origin, e);
                continue;
            }
            let local = serde_json::to_string(&origin.local_storage)?;
            let session = serde_json::to_string(&origin.session_storage)?;
            let value = self.eval(&script::restore_storage(&local, &session))?;
            debug!("Restored storage for {}: {}", origin.origin, value);
        }

        info!(
            "Applied session state ({} cookies, {} origins)",
            state.cookies.len(),
            state.origins.len()
        );
        Ok(())
    }

    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn action_timeout(&self) -> Duration {
        self.action_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_args_follow_profile() {
        let args = ChromeBrowser::launch_args(&BrowserProfile::chromium());
        assert!(args.contains(&"--window-size=1440,1080".to_string()));
        assert!(args.contains(&"--ignore-certificate-errors".to_string()));
        assert!(args.iter().any(|a| a.starts_with("--user-agent=Mozilla/5.0")));
        assert!(args.contains(&"--disable-site-isolation-trials".to_string()));

        let large = ChromeBrowser::launch_args(&BrowserProfile::desktop_large());
        assert!(large.contains(&"--window-size=1920,1080".to_string()));
        assert!(!large.iter().any(|a| a.starts_with("--user-agent=")));
    }

    #[test]
    fn test_headless_env_wins_over_profile() {
        let config = Config::from_lookup(|key| (key == "HEADLESS").then(|| "true".to_string()))
            .unwrap();
        let browser = ChromeBrowser::new(&config);
        assert!(browser.headless_for(&BrowserProfile::chromium()));

        let config = Config::from_lookup(|_| None).unwrap();
        let browser = ChromeBrowser::new(&config);
        assert!(!browser.headless_for(&BrowserProfile::chromium()));
        assert!(browser.headless_for(&BrowserProfile::desktop_large()));
    }

    #[test]
    fn test_key_chords() {
        let (mods, key) = split_chord("Control+z");
        assert_eq!(key, "z");
        assert_eq!(mods.len(), 1);
        let (mods, key) = split_chord("Enter");
        assert!(mods.is_empty());
        assert_eq!(key, "Enter");
    }
}
