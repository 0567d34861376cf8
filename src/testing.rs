//! Scripted stand-ins for the browser, used by unit and integration tests.
//!
//! [`ScriptedPage`] answers locator queries from a table of elements keyed by
//! selector source (`input[name="store"]`, `button:has-text("Login")`, ...).
//! A locator matches the union of the entries named by the alternatives of
//! its last step; ancestor steps are not modelled, but every frame in its
//! scope must have been registered with [`ScriptedPage::add_frame`].

use crate::core::config::BrowserProfile;
use crate::core::session::SessionState;
use crate::core::{BrowserLauncher, ClickOptions, ElementState, LoadState, PageDriver};
use crate::dom::{FrameScope, Locator};
use crate::errors::{HarnessError, Result};
use crate::types::{ElementRect, Point};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness, honouring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedAction {
    Goto(String),
    Click { target: String, force: bool },
    Fill { target: String, value: String },
    TypeText { target: String, text: String },
    Press(String),
    Hover(String),
    Select { target: String, value: String },
    Check { target: String, checked: bool },
    Scroll(String),
    Drag {
        source: String,
        target: String,
        position: Option<Point>,
    },
    Evaluate { frame: String, script: String },
    Screenshot,
    ApplyState { cookies: usize },
    Pause(Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedElement {
    pub count: usize,
    pub visible: bool,
    pub enabled: bool,
    pub value: String,
    pub text: Option<String>,
    pub attributes: HashMap<String, String>,
    pub rect: Option<ElementRect>,
}

impl Default for ScriptedElement {
    fn default() -> Self {
        Self {
            count: 1,
            visible: true,
            enabled: true,
            value: String::new(),
            text: None,
            attributes: HashMap::new(),
            rect: Some(ElementRect {
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 40.0,
            }),
        }
    }
}

impl ScriptedElement {
    pub fn visible() -> Self {
        Self::default()
    }

    pub fn hidden() -> Self {
        Self {
            visible: false,
            rect: None,
            ..Self::default()
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn times(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }
}

type Hook = Arc<dyn Fn(&mut ScriptedState) + Send + Sync>;
type GotoFailure = Arc<dyn Fn(&str) -> HarnessError + Send + Sync>;

/// Mutable page model shared by a [`ScriptedPage`] and its clones.
#[derive(Default)]
pub struct ScriptedState {
    pub url: String,
    pub title: String,
    elements: HashMap<String, ScriptedElement>,
    frames: HashSet<String>,
    actions: Vec<RecordedAction>,
    evaluations: VecDeque<Value>,
    default_evaluation: Option<Value>,
    storage: SessionState,
    click_hooks: HashMap<String, Vec<Hook>>,
    goto_hooks: Vec<(String, Hook)>,
    goto_failure: Option<GotoFailure>,
}

impl ScriptedState {
    pub fn set(&mut self, selector: &str, element: ScriptedElement) {
        self.elements.insert(selector.to_string(), element);
    }

    pub fn remove(&mut self, selector: &str) {
        self.elements.remove(selector);
    }

    pub fn element_mut(&mut self, selector: &str) -> Option<&mut ScriptedElement> {
        self.elements.get_mut(selector)
    }

    pub fn add_frame(&mut self, frame_selector: &str) {
        self.frames.insert(frame_selector.to_string());
    }

    pub fn storage_mut(&mut self) -> &mut SessionState {
        &mut self.storage
    }

    fn frame_attached(&self, frame: &FrameScope) -> bool {
        frame
            .frames
            .iter()
            .all(|f| self.frames.contains(&f.to_string()))
    }

    /// Matching (key, element) pairs, expanded by count, after the text
    /// filter and index of the last step.
    fn resolve(&self, locator: &Locator) -> Vec<(String, ScriptedElement)> {
        if !self.frame_attached(&locator.frame) {
            return Vec::new();
        }
        let step = locator.target();
        let mut seen = HashSet::new();
        let mut matches = Vec::new();
        for source in step.selector.sources() {
            if !seen.insert(source.clone()) {
                continue;
            }
            if let Some(element) = self.elements.get(&source) {
                for _ in 0..element.count {
                    matches.push((source.clone(), element.clone()));
                }
            }
        }
        if let Some(ref needle) = step.has_text {
            let needle = needle.to_lowercase();
            matches.retain(|(_, e)| {
                e.text
                    .as_deref()
                    .map(|t| t.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            });
        }
        match step.index {
            Some(i) if i < matches.len() => vec![matches.swap_remove(i)],
            Some(_) => Vec::new(),
            None => matches,
        }
    }

    fn first(&self, locator: &Locator) -> Option<(String, ScriptedElement)> {
        self.resolve(locator).into_iter().next()
    }
}

/// In-memory [`PageDriver`]. Clones share state, so a test can keep a handle
/// while the code under test owns another.
#[derive(Clone)]
pub struct ScriptedPage {
    state: Arc<Mutex<ScriptedState>>,
    action_timeout: Duration,
}

impl ScriptedPage {
    pub fn new(url: &str) -> Self {
        let state = ScriptedState {
            url: url.to_string(),
            ..ScriptedState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            action_timeout: Duration::from_millis(15_000),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut ScriptedState) -> T) -> T {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn set_element(&self, selector: &str, element: ScriptedElement) -> &Self {
        self.with_state(|s| s.set(selector, element));
        self
    }

    pub fn remove_element(&self, selector: &str) -> &Self {
        self.with_state(|s| s.remove(selector));
        self
    }

    pub fn add_frame(&self, frame_selector: &str) -> &Self {
        self.with_state(|s| s.add_frame(frame_selector));
        self
    }

    pub fn set_title(&self, title: &str) -> &Self {
        self.with_state(|s| s.title = title.to_string());
        self
    }

    pub fn set_storage(&self, storage: SessionState) -> &Self {
        self.with_state(|s| s.storage = storage);
        self
    }

    pub fn queue_evaluation(&self, value: Value) -> &Self {
        self.with_state(|s| s.evaluations.push_back(value));
        self
    }

    pub fn set_default_evaluation(&self, value: Value) -> &Self {
        self.with_state(|s| s.default_evaluation = Some(value));
        self
    }

    /// Run `hook` after any click that resolves through `selector`.
    pub fn on_click<F>(&self, selector: &str, hook: F) -> &Self
    where
        F: Fn(&mut ScriptedState) + Send + Sync + 'static,
    {
        self.with_state(|s| {
            s.click_hooks
                .entry(selector.to_string())
                .or_default()
                .push(Arc::new(hook))
        });
        self
    }

    /// Run `hook` after navigating to a URL containing `url_part`.
    pub fn on_goto<F>(&self, url_part: &str, hook: F) -> &Self
    where
        F: Fn(&mut ScriptedState) + Send + Sync + 'static,
    {
        self.with_state(|s| s.goto_hooks.push((url_part.to_string(), Arc::new(hook))));
        self
    }

    /// Make every following `goto` fail with the error `failure` builds for
    /// the URL. A timeout still lands on the URL; any other error does not.
    pub fn fail_goto_with<F>(&self, failure: F) -> &Self
    where
        F: Fn(&str) -> HarnessError + Send + Sync + 'static,
    {
        self.with_state(|s| s.goto_failure = Some(Arc::new(failure)));
        self
    }

    pub fn actions(&self) -> Vec<RecordedAction> {
        self.with_state(|s| s.actions.clone())
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                RecordedAction::Fill { target, value } => Some((target, value)),
                _ => None,
            })
            .collect()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                RecordedAction::Click { target, .. } => Some(target),
                _ => None,
            })
            .collect()
    }

    pub fn visits(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                RecordedAction::Goto(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn element(&self, selector: &str) -> Option<ScriptedElement> {
        self.with_state(|s| s.elements.get(selector).cloned())
    }

    fn record(&self, action: RecordedAction) {
        self.with_state(|s| s.actions.push(action));
    }

    fn not_actionable(&self, locator: &Locator, what: &str) -> HarnessError {
        HarnessError::Timeout(format!(
            "{}ms exceeded waiting for {} to be {}",
            self.action_timeout.as_millis(),
            locator,
            what
        ))
    }

    /// First match if it is visible and enabled; mirrors the actionability
    /// wait of the real driver without the polling.
    fn actionable(&self, locator: &Locator) -> Result<(String, ScriptedElement)> {
        match self.with_state(|s| s.first(locator)) {
            Some((key, e)) if e.visible && e.enabled => Ok((key, e)),
            _ => Err(self.not_actionable(locator, "visible and enabled")),
        }
    }

    fn attached(&self, locator: &Locator) -> Result<(String, ScriptedElement)> {
        self.with_state(|s| s.first(locator))
            .ok_or_else(|| self.not_actionable(locator, "attached"))
    }

    fn fire_click_hooks(&self, key: &str) {
        self.with_state(|s| {
            let hooks = s.click_hooks.get(key).cloned().unwrap_or_default();
            for hook in hooks {
                hook(s);
            }
        });
    }
}

#[async_trait]
impl PageDriver for ScriptedPage {
    async fn goto(&self, url: &str) -> Result<()> {
        self.record(RecordedAction::Goto(url.to_string()));
        let failure = self.with_state(|s| s.goto_failure.as_ref().map(|f| f(url)));
        let failure = match failure {
            Some(e) if !e.is_timeout() => return Err(e),
            other => other,
        };
        self.with_state(|s| {
            s.url = url.to_string();
            let hooks: Vec<Hook> = s
                .goto_hooks
                .iter()
                .filter(|(part, _)| url.contains(part.as_str()))
                .map(|(_, hook)| hook.clone())
                .collect();
            for hook in hooks {
                hook(s);
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn wait_for_load_state(&self, _state: LoadState, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn url(&self) -> Result<String> {
        Ok(self.with_state(|s| s.url.clone()))
    }

    async fn title(&self) -> Result<String> {
        Ok(self.with_state(|s| s.title.clone()))
    }

    async fn count(&self, locator: &Locator) -> Result<usize> {
        Ok(self.with_state(|s| s.resolve(locator).len()))
    }

    async fn wait_for(
        &self,
        locator: &Locator,
        state: ElementState,
        timeout: Duration,
    ) -> Result<()> {
        let first = self.with_state(|s| s.first(locator));
        let satisfied = match state {
            ElementState::Attached => first.is_some(),
            ElementState::Detached => first.is_none(),
            ElementState::Visible => first.map(|(_, e)| e.visible).unwrap_or(false),
            ElementState::Hidden => !first.map(|(_, e)| e.visible).unwrap_or(false),
            ElementState::Enabled => first.map(|(_, e)| e.visible && e.enabled).unwrap_or(false),
        };
        if satisfied {
            Ok(())
        } else {
            Err(HarnessError::Timeout(format!(
                "{}ms exceeded waiting for {} to be {}",
                timeout.as_millis(),
                locator,
                state.as_str()
            )))
        }
    }

    async fn has_frame(&self, frame: &FrameScope) -> Result<bool> {
        Ok(self.with_state(|s| s.frame_attached(frame)))
    }

    async fn click(&self, locator: &Locator, options: ClickOptions) -> Result<()> {
        let (key, _) = if options.force {
            self.attached(locator)?
        } else {
            self.actionable(locator)?
        };
        self.record(RecordedAction::Click {
            target: locator.to_string(),
            force: options.force,
        });
        self.fire_click_hooks(&key);
        Ok(())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> Result<()> {
        let (key, _) = self.actionable(locator)?;
        self.with_state(|s| {
            if let Some(element) = s.elements.get_mut(&key) {
                element.value = value.to_string();
            }
        });
        self.record(RecordedAction::Fill {
            target: locator.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    async fn type_text(&self, locator: &Locator, text: &str) -> Result<()> {
        let (key, _) = self.actionable(locator)?;
        self.with_state(|s| {
            if let Some(element) = s.elements.get_mut(&key) {
                element.value.push_str(text);
            }
        });
        self.record(RecordedAction::TypeText {
            target: locator.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn press(&self, key: &str) -> Result<()> {
        self.record(RecordedAction::Press(key.to_string()));
        Ok(())
    }

    async fn hover(&self, locator: &Locator) -> Result<()> {
        self.actionable(locator)?;
        self.record(RecordedAction::Hover(locator.to_string()));
        Ok(())
    }

    async fn select_option(&self, locator: &Locator, value: &str) -> Result<()> {
        let (key, _) = self.actionable(locator)?;
        self.with_state(|s| {
            if let Some(element) = s.elements.get_mut(&key) {
                element.value = value.to_string();
            }
        });
        self.record(RecordedAction::Select {
            target: locator.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    async fn set_checked(&self, locator: &Locator, checked: bool) -> Result<()> {
        let (key, _) = self.actionable(locator)?;
        self.with_state(|s| {
            if let Some(element) = s.elements.get_mut(&key) {
                element.value = checked.to_string();
            }
        });
        self.record(RecordedAction::Check {
            target: locator.to_string(),
            checked,
        });
        Ok(())
    }

    async fn scroll_into_view(&self, locator: &Locator) -> Result<()> {
        self.attached(locator)?;
        self.record(RecordedAction::Scroll(locator.to_string()));
        Ok(())
    }

    async fn text_content(&self, locator: &Locator) -> Result<Option<String>> {
        let (_, element) = self.attached(locator)?;
        Ok(element.text)
    }

    async fn input_value(&self, locator: &Locator) -> Result<String> {
        let (_, element) = self.attached(locator)?;
        Ok(element.value)
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        let (_, element) = self.attached(locator)?;
        Ok(element.attributes.get(name).cloned())
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool> {
        Ok(self
            .with_state(|s| s.first(locator))
            .map(|(_, e)| e.visible)
            .unwrap_or(false))
    }

    async fn is_enabled(&self, locator: &Locator) -> Result<bool> {
        Ok(self
            .with_state(|s| s.first(locator))
            .map(|(_, e)| e.enabled)
            .unwrap_or(false))
    }

    async fn bounding_box(&self, locator: &Locator) -> Result<Option<ElementRect>> {
        Ok(self
            .with_state(|s| s.first(locator))
            .and_then(|(_, e)| e.rect))
    }

    async fn drag_to(
        &self,
        source: &Locator,
        target: &Locator,
        position: Option<Point>,
    ) -> Result<()> {
        self.actionable(source)?;
        self.attached(target)?;
        self.record(RecordedAction::Drag {
            source: source.to_string(),
            target: target.to_string(),
            position,
        });
        Ok(())
    }

    async fn evaluate(&self, frame: &FrameScope, script: &str) -> Result<Value> {
        self.record(RecordedAction::Evaluate {
            frame: frame.to_string(),
            script: script.to_string(),
        });
        Ok(self.with_state(|s| {
            s.evaluations
                .pop_front()
                .or_else(|| s.default_evaluation.clone())
                .unwrap_or(Value::Null)
        }))
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.record(RecordedAction::Screenshot);
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    async fn storage_state(&self) -> Result<SessionState> {
        let mut state = self.with_state(|s| s.storage.clone());
        state.captured_at = Some(chrono::Utc::now());
        Ok(state)
    }

    async fn apply_storage_state(&self, state: &SessionState) -> Result<()> {
        self.record(RecordedAction::ApplyState {
            cookies: state.cookies.len(),
        });
        self.with_state(|s| s.storage = state.clone());
        Ok(())
    }

    async fn pause(&self, duration: Duration) {
        self.record(RecordedAction::Pause(duration));
    }

    fn action_timeout(&self) -> Duration {
        self.action_timeout
    }
}

/// Hands out clones of one [`ScriptedPage`] and counts launches.
#[derive(Clone)]
pub struct ScriptedLauncher {
    page: ScriptedPage,
    launches: Arc<AtomicUsize>,
    profiles: Arc<Mutex<Vec<String>>>,
    fail_with: Option<String>,
}

impl ScriptedLauncher {
    pub fn new(page: ScriptedPage) -> Self {
        Self {
            page,
            launches: Arc::new(AtomicUsize::new(0)),
            profiles: Arc::new(Mutex::new(Vec::new())),
            fail_with: None,
        }
    }

    /// Every launch fails with `LaunchFailed(message)`.
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new(ScriptedPage::new("about:blank"))
        }
    }

    pub fn page(&self) -> &ScriptedPage {
        &self.page
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn profiles(&self) -> Vec<String> {
        match self.profiles.lock() {
            Ok(p) => p.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    type Page = ScriptedPage;

    async fn launch(
        &self,
        profile: &BrowserProfile,
        state: Option<&SessionState>,
    ) -> Result<ScriptedPage> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut profiles) = self.profiles.lock() {
            profiles.push(profile.name.clone());
        }
        if let Some(ref message) = self.fail_with {
            return Err(HarnessError::LaunchFailed(message.clone()));
        }
        if let Some(state) = state {
            self.page.apply_storage_state(state).await?;
        }
        Ok(self.page.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_union_of_alternatives_in_order() {
        let page = ScriptedPage::new("https://rc.pagefly.io");
        page.set_element(".page-row", ScriptedElement::visible().times(2).with_text("Landing"))
            .set_element("tbody tr", ScriptedElement::visible().with_text("About us"));

        let rows = FrameScope::top().locator("tbody tr, .page-row");
        assert_eq!(page.count(&rows).await.unwrap(), 3);
        assert_eq!(
            page.text_content(&rows.nth(0)).await.unwrap().as_deref(),
            Some("About us")
        );
        assert_eq!(page.count(&rows.filter_text("landing")).await.unwrap(), 2);
        assert_eq!(page.count(&rows.nth(5)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_frames_must_be_registered() {
        let page = ScriptedPage::new("https://rc.pagefly.io");
        page.set_element("table", ScriptedElement::visible());
        let frame = FrameScope::top().child(r#"iframe[name="app-iframe"]"#);

        assert_eq!(page.count(&frame.locator("table")).await.unwrap(), 0);
        assert!(!page.has_frame(&frame).await.unwrap());

        page.add_frame(r#"iframe[name="app-iframe"]"#);
        assert_eq!(page.count(&frame.locator("table")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_disabled_element_times_out_unless_forced() {
        let page = ScriptedPage::new("https://rc.pagefly.io/install");
        page.set_element(r#"button:has-text("Login")"#, ScriptedElement::visible().disabled());
        let login = FrameScope::top().locator(r#"button:has-text("Login")"#);

        let err = page.click(&login, ClickOptions::default()).await.unwrap_err();
        assert!(err.is_timeout());
        page.click(&login, ClickOptions::forced()).await.unwrap();
        assert_eq!(page.clicks().len(), 1);
    }

    #[tokio::test]
    async fn test_click_hooks_mutate_the_page() {
        let page = ScriptedPage::new("https://rc.pagefly.io");
        page.set_element("#next", ScriptedElement::visible())
            .on_click("#next", |s| {
                s.url = "https://rc.pagefly.io/pages".to_string();
                s.set(".page-list", ScriptedElement::visible());
            });

        page.click(&FrameScope::top().locator("#next"), ClickOptions::default())
            .await
            .unwrap();
        assert_eq!(page.url().await.unwrap(), "https://rc.pagefly.io/pages");
        assert!(page.element(".page-list").is_some());
    }

    #[tokio::test]
    async fn test_launcher_counts_and_restores_state() {
        let launcher = ScriptedLauncher::new(ScriptedPage::new("about:blank"));
        let page = launcher
            .launch(&BrowserProfile::chromium(), Some(&SessionState::default()))
            .await
            .unwrap();
        assert_eq!(launcher.launches(), 1);
        assert_eq!(launcher.profiles(), vec!["chromium".to_string()]);
        assert_eq!(page.actions(), vec![RecordedAction::ApplyState { cookies: 0 }]);

        let failing = ScriptedLauncher::failing("no chrome");
        assert!(failing
            .launch(&BrowserProfile::chromium(), None)
            .await
            .is_err());
    }
}
