use crate::core::PageDriver;
use crate::dom::{FrameScope, Locator};
use crate::errors::Result;
use crate::pages::WebUi;
use crate::types::ListingType;
use tracing::info;

const DRAWER: &str = r#"[data-testid="templates-drawer"], .templates-drawer, .drawer"#;
const TEMPLATE_ITEMS: &str = "[data-template], .template-item";
const OPEN_BUTTON: &str =
    r#"[data-testid="open-templates-drawer"], .open-templates-drawer, button:has-text("Templates")"#;
const CLOSE_BUTTON: &str = r#"[data-testid="close-drawer"], .close-drawer, button:has-text("Close")"#;
const CONFIRM_BUTTON: &str =
    r#"[data-testid="confirm-template"], button:has-text("Select"), button:has-text("Confirm")"#;
const CANCEL_BUTTON: &str = r#"[data-testid="cancel-template"], button:has-text("Cancel")"#;
const SEARCH_INPUT: &str = r#"[data-testid="search-templates"], input[placeholder*="search"]"#;
const PREVIEW_IMAGE: &str = "[data-preview], .preview, img";

/// Template picker for one kind of listing (pages, sections or themes).
/// Selecting a template opens a popover that must be confirmed or cancelled.
pub struct TemplatesDrawer<'a, D: PageDriver> {
    ui: WebUi<'a, D>,
    frame: FrameScope,
    listing_type: ListingType,
}

impl<'a, D: PageDriver> TemplatesDrawer<'a, D> {
    pub fn new(ui: WebUi<'a, D>, frame: FrameScope, listing_type: ListingType) -> Self {
        Self {
            ui,
            frame,
            listing_type,
        }
    }

    pub fn listing_type(&self) -> ListingType {
        self.listing_type
    }

    pub fn drawer(&self) -> Locator {
        self.frame.locator(DRAWER).first()
    }

    pub fn templates(&self) -> Locator {
        self.drawer().locator(TEMPLATE_ITEMS)
    }

    pub fn template(&self, index: usize) -> Locator {
        self.templates().nth(index)
    }

    pub fn template_by_name(&self, name: &str) -> Locator {
        self.templates().filter_text(name).first()
    }

    pub async fn open(&self) -> Result<()> {
        info!("Opening {} templates", self.listing_type);
        self.ui.click(&self.frame.locator(OPEN_BUTTON).first()).await?;
        self.ui.wait_visible(&self.drawer()).await
    }

    pub async fn close(&self) -> Result<()> {
        self.ui.click(&self.frame.locator(CLOSE_BUTTON).first()).await?;
        self.ui.wait_hidden(&self.drawer()).await
    }

    pub async fn select(&self, index: usize) -> Result<()> {
        self.ui.click(&self.template(index)).await
    }

    pub async fn select_by_name(&self, name: &str) -> Result<()> {
        self.ui.click(&self.template_by_name(name)).await
    }

    pub async fn confirm(&self) -> Result<()> {
        self.ui.click(&self.frame.locator(CONFIRM_BUTTON).first()).await
    }

    pub async fn cancel(&self) -> Result<()> {
        self.ui.click(&self.frame.locator(CANCEL_BUTTON).first()).await
    }

    pub async fn search(&self, query: &str) -> Result<()> {
        self.ui
            .fill(&self.drawer().locator(SEARCH_INPUT).first(), query)
            .await
    }

    pub async fn filter_by_category(&self, category: &str) -> Result<()> {
        let tab = self
            .drawer()
            .locator(&format!(
                r#"[data-category="{0}"], button:has-text("{0}")"#,
                category
            ))
            .first();
        self.ui.click(&tab).await
    }

    pub async fn template_count(&self) -> Result<usize> {
        self.ui.count(&self.templates()).await
    }

    pub async fn has_template(&self, name: &str) -> Result<bool> {
        self.ui.is_present(&self.template_by_name(name)).await
    }

    pub async fn template_name(&self, index: usize) -> Result<String> {
        Ok(self.ui.text(&self.template(index)).await?.trim().to_string())
    }

    pub async fn preview_src(&self, index: usize) -> Result<Option<String>> {
        let preview = self.template(index).locator(PREVIEW_IMAGE).first();
        self.ui.attribute(&preview, "src").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::testing::{ScriptedElement, ScriptedPage};

    #[tokio::test]
    async fn test_select_by_name_then_confirm() {
        let page = ScriptedPage::new("https://rc.pagefly.io/editor");
        page.set_element("[data-template]", ScriptedElement::visible().with_text(" Fashion "))
            .set_element(".template-item", ScriptedElement::visible().with_text("Bakery"))
            .set_element(r#"button:has-text("Select")"#, ScriptedElement::visible())
            .set_element("img", ScriptedElement::visible().with_attr("src", "https://cdn/bakery.png"));
        let config = Config::from_lookup(|_| None).unwrap();
        let drawer = TemplatesDrawer::new(
            WebUi::new(&page, &config),
            FrameScope::top(),
            ListingType::Page,
        );

        assert_eq!(drawer.listing_type(), ListingType::Page);
        assert_eq!(drawer.template_count().await.unwrap(), 2);
        assert_eq!(drawer.template_name(0).await.unwrap(), "Fashion");
        assert!(drawer.has_template("bakery").await.unwrap());
        assert_eq!(
            drawer.preview_src(1).await.unwrap().as_deref(),
            Some("https://cdn/bakery.png")
        );

        drawer.select_by_name("Bakery").await.unwrap();
        drawer.confirm().await.unwrap();
        let clicks = page.clicks();
        assert!(clicks[0].contains(r#"[has-text="Bakery"]"#));
        assert!(clicks[1].contains(r#"button:has-text("Select")"#));
    }

    #[tokio::test]
    async fn test_cancel_without_popover_times_out() {
        let page = ScriptedPage::new("https://rc.pagefly.io/editor");
        let config = Config::from_lookup(|_| None).unwrap();
        let drawer = TemplatesDrawer::new(
            WebUi::new(&page, &config),
            FrameScope::top(),
            ListingType::Page,
        );

        assert!(drawer.cancel().await.unwrap_err().is_timeout());
    }
}
