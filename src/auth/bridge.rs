use crate::core::config::AppRoute;
use crate::core::{Config, PageDriver};
use crate::dom::{FrameScope, Locator};
use crate::errors::Result;
use crate::pages::WebUi;
use tracing::{debug, info, warn};

/// Store name typed into the login form when `STORE` is not set.
pub const FALLBACK_STORE_NAME: &str = "your_shopify_store_name";

/// Markers that only render once the page listing is reachable.
pub const LOGGED_IN_MARKERS: &str = r#"[data-testid="create-page-button"], .create-page-btn, button:has-text("Create page"), button:has-text("Create")"#;
pub const LOGIN_FORM_INPUTS: &str = r#"input[type="email"], input[name="email"], input[placeholder*="email"], input[placeholder*="store"], input[name="store"]"#;
pub const PASSWORD_INPUTS: &str = r#"input[type="password"], input[name="password"]"#;
pub const SUBMIT_BUTTONS: &str = r#"button[type="submit"], button:has-text("Login"), button:has-text("Sign in"), button:has-text("Submit")"#;
pub const INSTALL_LOGIN_BUTTON: &str = r#"button:has-text("Login")"#;
pub const INSTALL_SUBMIT_BUTTON: &str = r#"button:has-text("Submit")"#;
pub const ANY_TEXT_INPUT: &str = r#"input[type="text"], input[type="email"], input[type="password"], input:not([type])"#;
pub const BACKDROPS: &str = r#".Polaris-Backdrop, .backdrop, [class*="backdrop"]"#;
pub const ERROR_MESSAGES: &str = r#".error, .alert, [class*="error"], [class*="alert"]"#;

/// How the bridge resolved authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    AlreadyAuthenticated,
    FormSubmitted,
    /// The install page flow ran; `submitted` tells whether a login form
    /// showed up afterwards and was submitted.
    InstallHeuristic { submitted: bool },
    NoFormDetected,
}

/// Best guess of what an unlabeled input on the install page expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Password,
    Store,
    Unknown,
}

pub fn classify_input(
    input_type: Option<&str>,
    name: Option<&str>,
    placeholder: Option<&str>,
) -> FieldKind {
    let name = name.unwrap_or("");
    let placeholder = placeholder.unwrap_or("").to_lowercase();

    if input_type == Some("password") || name.contains("password") {
        FieldKind::Password
    } else if input_type == Some("email")
        || name.contains("email")
        || name.contains("store")
        || placeholder.contains("store")
        || placeholder.contains("email")
    {
        FieldKind::Store
    } else {
        FieldKind::Unknown
    }
}

/// Gets a fresh page from the app URL to the builder UI.
///
/// The bridge never fails on a missing element or a slow navigation: it logs
/// what it saw and leaves the verdict to the assertions that follow.
pub struct Bridge<'a, D: PageDriver> {
    ui: WebUi<'a, D>,
}

impl<'a, D: PageDriver> Bridge<'a, D> {
    pub fn new(page: &'a D, config: &'a Config) -> Self {
        Self {
            ui: WebUi::new(page, config),
        }
    }

    pub fn ui(&self) -> WebUi<'a, D> {
        self.ui
    }

    fn config(&self) -> &'a Config {
        self.ui.config()
    }

    fn top(&self, selector: &str) -> Locator {
        FrameScope::top().locator(selector)
    }

    fn store_name(&self) -> &'a str {
        self.config()
            .app
            .store
            .as_deref()
            .unwrap_or(FALLBACK_STORE_NAME)
    }

    /// Open `BASE_URL`, log in when needed and return the scope of the app
    /// frame (or the top-level page when the app renders inline).
    pub async fn open_app(&self) -> Result<FrameScope> {
        let url = self.config().route_url(AppRoute::Base)?;
        self.ui.open_website(&url).await?;

        let current = self.ui.current_url().await?;
        if current.contains("/install") {
            info!("On install page, attempting login");
            self.login().await?;
        } else if self.ui.is_present(&self.top(LOGIN_FORM_INPUTS)).await? {
            info!("Login form detected, attempting login");
            self.login().await?;
        } else {
            info!("No login required, continuing");
        }

        Ok(self.resolve_app_frame().await)
    }

    pub async fn login(&self) -> Result<LoginOutcome> {
        self.log_diagnostics("Checking login status").await;

        if self.ui.is_present(&self.top(LOGGED_IN_MARKERS)).await? {
            info!("Already logged in");
            return Ok(LoginOutcome::AlreadyAuthenticated);
        }

        if self.ui.is_present(&self.top(LOGIN_FORM_INPUTS)).await? {
            info!("Login required, submitting login form");
            self.submit_login_form().await;
            return Ok(LoginOutcome::FormSubmitted);
        }

        info!("No login form found");
        let outcome = if self.ui.current_url().await?.contains("/install") {
            let submitted = self.install_heuristic().await?;
            LoginOutcome::InstallHeuristic { submitted }
        } else {
            LoginOutcome::NoFormDetected
        };

        self.log_error_messages().await;
        Ok(outcome)
    }

    /// One fill of the store and password fields and one submit click.
    async fn submit_login_form(&self) {
        let result = async {
            self.ui
                .fill(&self.top(LOGIN_FORM_INPUTS).first(), self.store_name())
                .await?;
            debug!("Filled store name: {}", self.store_name());
            self.ui
                .fill(
                    &self.top(PASSWORD_INPUTS).first(),
                    &self.config().app.login_password,
                )
                .await?;
            self.ui.click(&self.top(SUBMIT_BUTTONS).first()).await
        }
        .await;

        if let Err(e) = result {
            warn!("Login form submission incomplete, continuing: {}", e);
            return;
        }

        self.ui.wait_for_page_loaded().await;
        self.ui.sleep(3_000).await;
        self.log_diagnostics("After login").await;
    }

    /// Install page: unlock a disabled Login button by filling whatever
    /// inputs are visible, click through, then submit a login form if one
    /// appears. Every step that finds nothing is skipped.
    async fn install_heuristic(&self) -> Result<bool> {
        let login_button = self.top(INSTALL_LOGIN_BUTTON).first();
        if !self.ui.is_present(&login_button).await? {
            info!("Install page has no Login button");
            return Ok(false);
        }

        let mut enabled = self.ui.is_enabled(&login_button).await?;
        debug!("Login button enabled: {}", enabled);

        if !enabled {
            self.fill_visible_inputs().await?;
            self.ui.sleep(1_000).await;
            enabled = self.ui.is_enabled(&login_button).await?;
            debug!("Login button enabled after filling fields: {}", enabled);
        }

        if enabled {
            let backdrop = self.top(BACKDROPS).first();
            if self.ui.is_present(&backdrop).await? {
                debug!("Dismissing backdrop");
                if let Err(e) = self.ui.force_click(&backdrop).await {
                    debug!("Backdrop click failed: {}", e);
                }
                self.ui.sleep(500).await;
            }

            if let Err(e) = self.ui.force_click(&login_button).await {
                debug!("Forced Login click failed, retrying normally: {}", e);
                if let Err(e) = self.ui.click(&login_button).await {
                    warn!("Login button click failed: {}", e);
                }
            }

            self.ui.sleep(1_000).await;
            let submit = self.top(INSTALL_SUBMIT_BUTTON).first();
            if self.ui.is_present(&submit).await? && self.ui.is_enabled(&submit).await? {
                debug!("Clicking Submit");
                if let Err(e) = self.ui.force_click(&submit).await {
                    debug!("Submit click failed: {}", e);
                }
                self.ui.sleep(2_000).await;
            }

            self.ui.wait_for_page_loaded().await;
            self.ui.sleep(2_000).await;
        } else {
            warn!("Login button still disabled, cannot proceed");
        }

        self.log_diagnostics("After clicking Login").await;

        if self.ui.is_present(&self.top(LOGIN_FORM_INPUTS)).await? {
            info!("Login form now available");
            self.submit_login_form().await;
            return Ok(true);
        }
        Ok(false)
    }

    async fn fill_visible_inputs(&self) -> Result<()> {
        let inputs = self.top(ANY_TEXT_INPUT);
        let count = self.ui.count(&inputs).await?;
        debug!("Found {} input fields", count);

        for i in 0..count {
            let input = inputs.nth(i);
            if !self.ui.is_visible(&input).await? {
                continue;
            }
            let input_type = self.ui.attribute(&input, "type").await.ok().flatten();
            let name = self.ui.attribute(&input, "name").await.ok().flatten();
            let placeholder = self.ui.attribute(&input, "placeholder").await.ok().flatten();

            let kind = classify_input(
                input_type.as_deref(),
                name.as_deref(),
                placeholder.as_deref(),
            );
            let value = match kind {
                FieldKind::Password => self.config().app.login_password.as_str(),
                FieldKind::Store | FieldKind::Unknown => self.store_name(),
            };
            debug!(
                "Input {}: type={:?} name={:?} placeholder={:?} -> {:?}",
                i, input_type, name, placeholder, kind
            );
            if let Err(e) = self.ui.fill(&input, value).await {
                debug!("Could not fill input {}: {}", i, e);
            }
        }
        Ok(())
    }

    async fn log_diagnostics(&self, context: &str) {
        let url = self.ui.current_url().await.unwrap_or_default();
        let title = self.ui.title().await.unwrap_or_default();
        info!("{} (url: {}, title: {:?})", context, url, title);

        let buttons = self.top("button");
        let count = self.ui.count(&buttons).await.unwrap_or(0);
        let mut labels = Vec::new();
        for i in 0..count.min(10) {
            let button = buttons.nth(i);
            if self.ui.is_visible(&button).await.unwrap_or(false) {
                if let Ok(text) = self.ui.text(&button).await {
                    labels.push(text.trim().to_string());
                }
            }
        }
        debug!("Visible buttons: {:?}", labels);
    }

    async fn log_error_messages(&self) {
        let errors = self.top(ERROR_MESSAGES).first();
        if self.ui.is_present(&errors).await.unwrap_or(false) {
            let text = self.ui.text(&errors).await.unwrap_or_default();
            warn!("Found error message: {}", text.trim());
        }
    }

    pub fn app_iframe_selector(&self) -> String {
        format!(r#"iframe[name="{}"]"#, self.config().app.app_iframe)
    }

    pub fn app_frame(&self) -> FrameScope {
        FrameScope::top().child(&self.app_iframe_selector())
    }

    pub fn editor_frame(&self) -> FrameScope {
        FrameScope::top().child(&self.config().app.editor_iframe)
    }

    pub fn overlay_frame(&self) -> FrameScope {
        FrameScope::top().child(&self.config().app.overlay_modal_iframe)
    }

    /// Canvas sandbox nested in the editor frame.
    pub fn drag_drop_frame(&self, editor: &FrameScope) -> FrameScope {
        let name = &self.config().app.drag_drop_iframe;
        editor.child(&format!(r#"iframe[name="{0}"], iframe#{0}"#, name))
    }

    /// `frame` when it is attached, the top-level page otherwise.
    pub async fn resolve_frame(&self, frame: FrameScope) -> FrameScope {
        match self.ui.page().has_frame(&frame).await {
            Ok(true) => frame,
            Ok(false) => {
                info!("No frame {} found, continuing with main page", frame);
                FrameScope::top()
            }
            Err(e) => {
                info!("Frame lookup for {} failed, continuing with main page: {}", frame, e);
                FrameScope::top()
            }
        }
    }

    pub async fn resolve_app_frame(&self) -> FrameScope {
        self.resolve_frame(self.app_frame()).await
    }

    pub async fn resolve_editor_frame(&self) -> FrameScope {
        self.resolve_frame(self.editor_frame()).await
    }

    pub async fn resolve_overlay_frame(&self) -> FrameScope {
        self.resolve_frame(self.overlay_frame()).await
    }

    async fn open_route(&self, route: AppRoute) -> Result<FrameScope> {
        let url = self.config().route_url(route)?;
        self.ui.open_website(&url).await?;
        Ok(self.resolve_app_frame().await)
    }

    pub async fn open_page_listing(&self) -> Result<FrameScope> {
        let frame = self.open_route(AppRoute::Pages).await?;
        // listing rows render after the frame's own data fetch
        self.ui.sleep(2_000).await;
        Ok(frame)
    }

    pub async fn open_sections(&self) -> Result<FrameScope> {
        self.open_route(AppRoute::Sections).await
    }

    pub async fn open_trash(&self) -> Result<FrameScope> {
        self.open_route(AppRoute::Trash).await
    }

    pub async fn open_themes(&self) -> Result<FrameScope> {
        self.open_route(AppRoute::Themes).await
    }

    pub async fn open_settings(&self) -> Result<FrameScope> {
        self.open_route(AppRoute::Settings).await
    }
}
