use crate::core::config::BrowserProfile;
use crate::core::session::SessionState;
use crate::dom::{FrameScope, Locator};
use crate::errors::Result;
use crate::types::{ElementRect, Point};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Page lifecycle states a driver can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    DomContentLoaded,
    Load,
    /// `load` plus no new network resources for a quiet period.
    NetworkIdle,
}

/// Element conditions accepted by [`PageDriver::wait_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    Attached,
    Detached,
    Visible,
    Hidden,
    Enabled,
}

impl ElementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementState::Attached => "attached",
            ElementState::Detached => "detached",
            ElementState::Visible => "visible",
            ElementState::Hidden => "hidden",
            ElementState::Enabled => "enabled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseButton {
    #[default]
    Left,
    Middle,
    Right,
}

impl MouseButton {
    /// DOM `MouseEvent.button` code.
    pub fn code(&self) -> u8 {
        match self {
            MouseButton::Left => 0,
            MouseButton::Middle => 1,
            MouseButton::Right => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickOptions {
    /// Skip the visible/enabled actionability checks.
    pub force: bool,
    pub button: MouseButton,
    pub click_count: u32,
}

impl Default for ClickOptions {
    fn default() -> Self {
        Self {
            force: false,
            button: MouseButton::Left,
            click_count: 1,
        }
    }
}

impl ClickOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    pub fn double() -> Self {
        Self {
            click_count: 2,
            ..Self::default()
        }
    }

    pub fn right() -> Self {
        Self {
            button: MouseButton::Right,
            ..Self::default()
        }
    }
}

/// One live browser page. Element operations wait for the locator to be
/// actionable (attached, visible, enabled) up to the action timeout, then act
/// on the first match in document order.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for the `load` event.
    async fn goto(&self, url: &str) -> Result<()>;

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<()>;

    async fn url(&self) -> Result<String>;

    async fn title(&self) -> Result<String>;

    /// Number of elements currently matching; never waits.
    async fn count(&self, locator: &Locator) -> Result<usize>;

    async fn wait_for(&self, locator: &Locator, state: ElementState, timeout: Duration)
        -> Result<()>;

    /// Whether every frame of the chain is attached and reachable.
    async fn has_frame(&self, frame: &FrameScope) -> Result<bool>;

    async fn click(&self, locator: &Locator, options: ClickOptions) -> Result<()>;

    /// Replace the current value of an input, textarea or contenteditable.
    async fn fill(&self, locator: &Locator, value: &str) -> Result<()>;

    /// Focus the element and send key events for each character.
    async fn type_text(&self, locator: &Locator, text: &str) -> Result<()>;

    /// Press a key or chord such as `Enter` or `Control+z` on the focused element.
    async fn press(&self, key: &str) -> Result<()>;

    async fn hover(&self, locator: &Locator) -> Result<()>;

    async fn select_option(&self, locator: &Locator, value: &str) -> Result<()>;

    async fn set_checked(&self, locator: &Locator, checked: bool) -> Result<()>;

    async fn scroll_into_view(&self, locator: &Locator) -> Result<()>;

    async fn text_content(&self, locator: &Locator) -> Result<Option<String>>;

    async fn input_value(&self, locator: &Locator) -> Result<String>;

    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>>;

    /// Visibility of the first match; `false` when nothing matches.
    async fn is_visible(&self, locator: &Locator) -> Result<bool>;

    async fn is_enabled(&self, locator: &Locator) -> Result<bool>;

    /// Box in top-level page coordinates, `None` when nothing matches.
    async fn bounding_box(&self, locator: &Locator) -> Result<Option<ElementRect>>;

    /// Drag the source onto the target. `position` is relative to the
    /// target's top-left corner; the target's center otherwise.
    async fn drag_to(&self, source: &Locator, target: &Locator, position: Option<Point>)
        -> Result<()>;

    async fn evaluate(&self, frame: &FrameScope, script: &str) -> Result<Value>;

    async fn screenshot(&self) -> Result<Vec<u8>>;

    async fn storage_state(&self) -> Result<SessionState>;

    async fn apply_storage_state(&self, state: &SessionState) -> Result<()>;

    async fn pause(&self, duration: Duration);

    /// Budget used by element actions when waiting for actionability.
    fn action_timeout(&self) -> Duration;
}

/// Opens pages for a browser profile.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    type Page: PageDriver;

    /// Launch a page for `profile`, restoring `state` first when given.
    async fn launch(
        &self,
        profile: &BrowserProfile,
        state: Option<&SessionState>,
    ) -> Result<Self::Page>;
}
