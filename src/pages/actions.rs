use crate::core::{ClickOptions, Config, ElementState, LoadState, PageDriver};
use crate::dom::{FrameScope, Locator};
use crate::errors::{HarnessError, Result};
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Local storage keys behind the builder's "don't remind me again" prompts.
pub const DONT_REMIND_KEYS: [&str; 5] = [
    "no-auto-save",
    "warning_saved",
    "warning_publish_home",
    "warning_publish_product",
    "warning_publish_collection",
];

const URL_POLL: Duration = Duration::from_millis(100);

/// Single-call UI primitives shared by the bridge and the page objects.
pub struct WebUi<'a, D: PageDriver> {
    page: &'a D,
    config: &'a Config,
}

impl<'a, D: PageDriver> Clone for WebUi<'a, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, D: PageDriver> Copy for WebUi<'a, D> {}

impl<'a, D: PageDriver> WebUi<'a, D> {
    pub fn new(page: &'a D, config: &'a Config) -> Self {
        Self { page, config }
    }

    pub fn page(&self) -> &'a D {
        self.page
    }

    pub fn config(&self) -> &'a Config {
        self.config
    }

    pub async fn open_website(&self, url: &str) -> Result<()> {
        info!("Opening {}", url);
        if let Err(e) = self.page.goto(url).await {
            if !e.is_timeout() {
                return Err(e);
            }
            warn!("Navigation to {} timed out, continuing: {}", url, e);
        }
        self.wait_for_page_loaded().await;
        Ok(())
    }

    /// Network idle, then `load`, then a short settle delay. Never fails: a
    /// page that keeps polling the network is logged and used as is.
    pub async fn wait_for_page_loaded(&self) {
        let timeout = self.config.page_loaded_wait();
        let waited = async {
            self.page
                .wait_for_load_state(LoadState::NetworkIdle, timeout)
                .await?;
            self.page.wait_for_load_state(LoadState::Load, timeout).await
        };
        match waited.await {
            Ok(()) => self.page.pause(Duration::from_millis(1_000)).await,
            Err(e) => {
                let url = self.page.url().await.unwrap_or_default();
                warn!("Page load wait gave up, continuing (url: {}): {}", url, e);
            }
        }
    }

    pub async fn wait_visible(&self, locator: &Locator) -> Result<()> {
        self.page
            .wait_for(locator, ElementState::Visible, self.config.explicit_wait())
            .await
    }

    pub async fn wait_hidden(&self, locator: &Locator) -> Result<()> {
        self.page
            .wait_for(locator, ElementState::Hidden, self.config.explicit_wait())
            .await
    }

    pub async fn click(&self, locator: &Locator) -> Result<()> {
        debug!("click {}", locator);
        self.page.click(locator, ClickOptions::default()).await
    }

    pub async fn force_click(&self, locator: &Locator) -> Result<()> {
        debug!("force click {}", locator);
        self.page.click(locator, ClickOptions::forced()).await
    }

    pub async fn double_click(&self, locator: &Locator) -> Result<()> {
        self.page.click(locator, ClickOptions::double()).await
    }

    pub async fn right_click(&self, locator: &Locator) -> Result<()> {
        self.page.click(locator, ClickOptions::right()).await
    }

    pub async fn fill(&self, locator: &Locator, text: &str) -> Result<()> {
        debug!("fill {} with {:?}", locator, text);
        self.page.fill(locator, text).await
    }

    pub async fn clear_and_fill(&self, locator: &Locator, text: &str) -> Result<()> {
        self.page.fill(locator, "").await?;
        self.page.fill(locator, text).await
    }

    pub async fn type_text(&self, locator: &Locator, text: &str) -> Result<()> {
        self.page.type_text(locator, text).await
    }

    pub async fn press_key(&self, key: &str) -> Result<()> {
        debug!("press {}", key);
        self.page.press(key).await
    }

    /// Text content of the first match, empty when the element has none.
    pub async fn text(&self, locator: &Locator) -> Result<String> {
        Ok(self.page.text_content(locator).await?.unwrap_or_default())
    }

    pub async fn input_value(&self, locator: &Locator) -> Result<String> {
        self.page.input_value(locator).await
    }

    pub async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        self.page.attribute(locator, name).await
    }

    pub async fn is_visible(&self, locator: &Locator) -> Result<bool> {
        self.page.is_visible(locator).await
    }

    pub async fn is_enabled(&self, locator: &Locator) -> Result<bool> {
        self.page.is_enabled(locator).await
    }

    pub async fn is_present(&self, locator: &Locator) -> Result<bool> {
        Ok(self.page.count(locator).await? > 0)
    }

    pub async fn count(&self, locator: &Locator) -> Result<usize> {
        self.page.count(locator).await
    }

    /// First candidate whose first match is visible.
    pub async fn first_visible(&self, candidates: &[Locator]) -> Result<Option<Locator>> {
        for candidate in candidates {
            if self.page.is_visible(candidate).await? {
                return Ok(Some(candidate.clone()));
            }
        }
        Ok(None)
    }

    /// Trimmed, non-empty texts of the visible matches of `locator`.
    pub async fn visible_texts(&self, locator: &Locator, limit: usize) -> Result<Vec<String>> {
        let count = self.page.count(locator).await?.min(limit);
        let mut texts = Vec::new();
        for i in 0..count {
            let item = locator.nth(i);
            if !self.page.is_visible(&item).await? {
                continue;
            }
            let text = self.text(&item).await?;
            let text = text.trim();
            if !text.is_empty() {
                texts.push(text.to_string());
            }
        }
        Ok(texts)
    }

    pub async fn drag_and_drop(&self, from: &Locator, to: &Locator) -> Result<()> {
        self.page.drag_to(from, to, None).await
    }

    pub async fn hover(&self, locator: &Locator) -> Result<()> {
        self.page.hover(locator).await
    }

    pub async fn select_option(&self, locator: &Locator, value: &str) -> Result<()> {
        self.page.select_option(locator, value).await
    }

    pub async fn check(&self, locator: &Locator) -> Result<()> {
        self.page.set_checked(locator, true).await
    }

    pub async fn uncheck(&self, locator: &Locator) -> Result<()> {
        self.page.set_checked(locator, false).await
    }

    pub async fn scroll_to(&self, locator: &Locator) -> Result<()> {
        self.page.scroll_into_view(locator).await
    }

    pub async fn current_url(&self) -> Result<String> {
        self.page.url().await
    }

    pub async fn title(&self) -> Result<String> {
        self.page.title().await
    }

    pub async fn wait_for_url(&self, pattern: &Regex, timeout: Duration) -> Result<String> {
        let polls = (timeout.as_millis() / URL_POLL.as_millis()).max(1);
        let mut url = String::new();
        for _ in 0..polls {
            url = self.page.url().await?;
            if pattern.is_match(&url) {
                return Ok(url);
            }
            self.page.pause(URL_POLL).await;
        }
        Err(HarnessError::Timeout(format!(
            "url did not match {} within {}ms (last: {})",
            pattern,
            timeout.as_millis(),
            url
        )))
    }

    /// Wait until a resource matching `HELPER_SCRIPTS_PATTERN` has loaded
    /// in `frame`.
    pub async fn wait_for_helper_scripts(&self, frame: &FrameScope, timeout: Duration) -> Result<String> {
        let pattern = Regex::new(&self.config.app.helper_scripts_pattern)
            .map_err(|e| HarnessError::Configuration(format!("HELPER_SCRIPTS_PATTERN: {}", e)))?;
        let polls = (timeout.as_millis() / URL_POLL.as_millis()).max(1);
        for _ in 0..polls {
            let loaded = self
                .page
                .evaluate(
                    frame,
                    "performance.getEntriesByType('resource').map(e => e.name)",
                )
                .await?;
            let found = loaded
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|v| v.as_str())
                .find(|name| pattern.is_match(name));
            if let Some(name) = found {
                return Ok(name.to_string());
            }
            self.page.pause(URL_POLL).await;
        }
        Err(HarnessError::Timeout(format!(
            "helper scripts matching {} not loaded within {}ms",
            pattern,
            timeout.as_millis()
        )))
    }

    pub async fn clear_local_storage(&self, frame: &FrameScope) -> Result<()> {
        self.page.evaluate(frame, "localStorage.clear()").await?;
        Ok(())
    }

    pub async fn remove_local_storage_items(&self, frame: &FrameScope, keys: &[&str]) -> Result<()> {
        let keys = serde_json::to_string(keys)?;
        let script = format!(
            "{}.forEach(key => localStorage.removeItem(key))",
            keys
        );
        self.page.evaluate(frame, &script).await?;
        Ok(())
    }

    pub async fn reset_dont_remind(&self, frame: &FrameScope) -> Result<()> {
        self.remove_local_storage_items(frame, &DONT_REMIND_KEYS).await
    }

    /// Removes the support chat widget, which overlaps the editor toolbar.
    pub async fn remove_chat_popup(&self) -> Result<()> {
        self.page
            .evaluate(
                &FrameScope::top(),
                r#"document.querySelectorAll('[id*="crisp"], [class*="crisp"]').forEach(el => el.remove())"#,
            )
            .await?;
        Ok(())
    }

    pub async fn remove_app_navigator_padding(&self) -> Result<()> {
        self.page
            .evaluate(
                &FrameScope::top(),
                "(function() { const main = document.getElementById('AppFrameMain'); if (main) main.style.paddingLeft = '0px'; })()",
            )
            .await?;
        Ok(())
    }

    /// Full-page PNG written to `{screenshot_dir}/{name}.png`.
    pub async fn screenshot(&self, name: &str) -> Result<PathBuf> {
        let bytes = self.page.screenshot().await?;
        let dir = &self.config.artifacts.screenshot_dir;
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}.png", sanitize_file_name(name)));
        tokio::fs::write(&path, bytes).await?;
        debug!("Screenshot saved to {}", path.display());
        Ok(path)
    }

    pub async fn sleep(&self, ms: u64) {
        if ms > 0 {
            self.page.pause(Duration::from_millis(ms)).await;
        }
    }

    /// Optional page-load wait plus the configured step delay.
    pub async fn smart_wait(&self) {
        if self.config.waits.active_page_loaded {
            self.wait_for_page_loaded().await;
        }
        self.sleep(self.config.waits.sleep_step_ms).await;
    }
}

pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
