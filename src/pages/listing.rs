use crate::core::PageDriver;
use crate::dom::{FrameScope, Locator};
use crate::errors::{HarnessError, Result};
use crate::pages::WebUi;
use crate::types::{EditorType, PageStatus, PageType};
use tracing::{debug, info};

const LOADED_MARKERS: [&str; 9] = [
    r#"[data-testid="create-page-button"]"#,
    ".create-page-btn",
    r#"button:has-text("Create page")"#,
    r#"button:has-text("Create")"#,
    r#"[data-testid="page-table"]"#,
    ".page-table",
    "table",
    ".page-list",
    r#"[data-testid="page-list"]"#,
];

const CREATE_PAGE_CANDIDATES: [&str; 11] = [
    "#pages--create-blank-page-btn",
    r#"[data-testid="create-page-button"]"#,
    ".create-page-btn",
    r#"button:has-text("Create page")"#,
    r#"button:has-text("Create")"#,
    r#"button:has-text("New page")"#,
    r#"button:has-text("Add page")"#,
    r#"[data-testid="create-button"]"#,
    ".create-button",
    r#"button[class*="create"]"#,
    r#"button[class*="add"]"#,
];

const CREATE_BLANK: &str = r#"button:has-text("Create blank page"), [data-testid="create-blank-page"]"#;
const CREATE_FROM_TEMPLATE: &str =
    r#"button:has-text("Create from template"), [data-testid="create-from-template"]"#;
const SEARCH_INPUT: &str =
    r#"[data-testid="search-input"], input[placeholder*="search"], input[type="search"]"#;
const STATUS_FILTER: &str = r#"[data-testid="status-filter"], select, .status-filter"#;
const PAGE_TABLE: &str = r#"[data-testid="page-table"], .page-table, table"#;
const PAGE_ROWS: &str = "tbody tr, .page-row";
const ROW_STATUS: &str = r#"[data-testid="page-status"], .status, .page-status"#;
const ROW_PUBLISH: &str = r#"button:has-text("Publish"), [data-testid="publish-button"]"#;
const ROW_UNPUBLISH: &str = r#"button:has-text("Unpublish"), [data-testid="unpublish-button"]"#;
const ROW_DELETE: &str = r#"button:has-text("Delete"), [data-testid="delete-button"]"#;
const CONFIRM_DELETE: &str =
    r#"button:has-text("Confirm"), button:has-text("Delete"), [data-testid="confirm-delete"]"#;

/// The page listing inside the app frame.
pub struct PageListing<'a, D: PageDriver> {
    ui: WebUi<'a, D>,
    frame: FrameScope,
}

impl<'a, D: PageDriver> PageListing<'a, D> {
    pub fn new(ui: WebUi<'a, D>, frame: FrameScope) -> Self {
        Self { ui, frame }
    }

    fn at(&self, selector: &str) -> Locator {
        self.frame.locator(selector)
    }

    /// Passes as soon as any listing marker is visible.
    pub async fn verify_loaded(&self) -> Result<()> {
        let markers: Vec<Locator> = LOADED_MARKERS.iter().map(|s| self.at(s)).collect();
        if let Some(marker) = self.ui.first_visible(&markers).await? {
            debug!("Page listing loaded, found {}", marker);
            return Ok(());
        }

        let title = self.ui.title().await.unwrap_or_default();
        let url = self.ui.current_url().await.unwrap_or_default();
        Err(HarnessError::Assertion(format!(
            "page listing did not load (title: {:?}, url: {})",
            title, url
        )))
    }

    pub async fn click_create_page(&self) -> Result<()> {
        let candidates: Vec<Locator> = CREATE_PAGE_CANDIDATES
            .iter()
            .map(|s| self.at(s).first())
            .collect();
        if let Some(button) = self.ui.first_visible(&candidates).await? {
            info!("Clicking create page button {}", button);
            return self.ui.click(&button).await;
        }

        let available = self.ui.visible_texts(&self.at("button"), 20).await?;
        Err(HarnessError::ElementNotFound(format!(
            "create page button; available buttons: {:?}",
            available
        )))
    }

    async fn choose_types(&self, page_type: PageType, editor_type: EditorType) -> Result<()> {
        self.click_create_page().await?;
        self.ui
            .click(
                &self
                    .at(&format!(
                        r#"[data-editor-type="{0}"], button:has-text("{0}")"#,
                        editor_type
                    ))
                    .first(),
            )
            .await?;
        self.ui
            .click(
                &self
                    .at(&format!(
                        r#"[data-page-type="{0}"], button:has-text("{0}")"#,
                        page_type
                    ))
                    .first(),
            )
            .await
    }

    pub async fn open_blank_page_editor(
        &self,
        page_type: PageType,
        editor_type: EditorType,
    ) -> Result<()> {
        info!("Creating blank {} page ({} editor)", page_type, editor_type);
        self.choose_types(page_type, editor_type).await?;
        self.ui.click(&self.at(CREATE_BLANK).first()).await
    }

    pub async fn open_template_page_editor(
        &self,
        page_type: PageType,
        editor_type: EditorType,
    ) -> Result<()> {
        info!("Creating {} page from template ({} editor)", page_type, editor_type);
        self.choose_types(page_type, editor_type).await?;
        self.ui.click(&self.at(CREATE_FROM_TEMPLATE).first()).await
    }

    pub async fn search(&self, query: &str) -> Result<()> {
        self.ui.fill(&self.at(SEARCH_INPUT).first(), query).await
    }

    pub async fn filter_by_status(&self, status: PageStatus) -> Result<()> {
        self.ui
            .select_option(&self.at(STATUS_FILTER).first(), status.as_str())
            .await
    }

    pub fn rows(&self) -> Locator {
        self.at(PAGE_TABLE).first().locator(PAGE_ROWS)
    }

    /// Row by 1-based position, as shown to the user.
    pub fn row(&self, index: usize) -> Locator {
        self.rows().nth(index.saturating_sub(1))
    }

    pub fn row_by_title(&self, title: &str) -> Locator {
        self.rows().filter_text(title).first()
    }

    pub async fn page_count(&self) -> Result<usize> {
        self.ui.count(&self.rows()).await
    }

    pub async fn has_page(&self, title: &str) -> Result<bool> {
        self.ui.is_present(&self.row_by_title(title)).await
    }

    pub async fn click_row(&self, index: usize) -> Result<()> {
        self.ui.click(&self.row(index)).await
    }

    pub async fn page_status(&self, index: usize) -> Result<String> {
        let text = self
            .ui
            .text(&self.row(index).locator(ROW_STATUS).first())
            .await?;
        Ok(text.trim().to_string())
    }

    pub async fn publish(&self, index: usize) -> Result<()> {
        self.ui
            .click(&self.row(index).locator(ROW_PUBLISH).first())
            .await
    }

    pub async fn unpublish(&self, index: usize) -> Result<()> {
        self.ui
            .click(&self.row(index).locator(ROW_UNPUBLISH).first())
            .await
    }

    /// Delete the row and accept the confirmation modal.
    pub async fn delete(&self, index: usize) -> Result<()> {
        self.ui
            .click(&self.row(index).locator(ROW_DELETE).first())
            .await?;
        let confirm = self.at(CONFIRM_DELETE).first();
        self.ui.wait_visible(&confirm).await?;
        self.ui.click(&confirm).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::testing::{ScriptedElement, ScriptedPage};

    const APP_FRAME: &str = r#"iframe[name="app-iframe"]"#;

    fn setup() -> (ScriptedPage, Config, FrameScope) {
        let page = ScriptedPage::new("https://rc.pagefly.io/pages");
        page.add_frame(APP_FRAME);
        let config = Config::from_lookup(|_| None).unwrap();
        (page, config, FrameScope::top().child(APP_FRAME))
    }

    #[tokio::test]
    async fn test_verify_loaded_reports_title_and_url() {
        let (page, config, frame) = setup();
        page.set_title("PageFly");
        let listing = PageListing::new(WebUi::new(&page, &config), frame);

        let err = listing.verify_loaded().await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("\"PageFly\""));
        assert!(message.contains("https://rc.pagefly.io/pages"));

        page.set_element(".page-list", ScriptedElement::visible());
        listing.verify_loaded().await.unwrap();
    }

    #[tokio::test]
    async fn test_click_create_page_lists_available_buttons() {
        let (page, config, frame) = setup();
        page.set_element("button", ScriptedElement::visible().with_text("Import"));
        let listing = PageListing::new(WebUi::new(&page, &config), frame);

        let err = listing.click_create_page().await.unwrap_err();
        assert!(matches!(err, HarnessError::ElementNotFound(_)));
        assert!(err.to_string().contains("\"Import\""));

        page.set_element(r#"button:has-text("New page")"#, ScriptedElement::visible());
        listing.click_create_page().await.unwrap();
        assert_eq!(page.clicks().len(), 1);
        assert!(page.clicks()[0].contains("New page"));
    }

    #[tokio::test]
    async fn test_open_blank_page_editor_clicks_through_the_wizard() {
        let (page, config, frame) = setup();
        page.set_element("#pages--create-blank-page-btn", ScriptedElement::visible())
            .set_element(r#"[data-editor-type="flex"]"#, ScriptedElement::visible())
            .set_element(r#"[data-page-type="product"]"#, ScriptedElement::visible())
            .set_element(r#"[data-testid="create-blank-page"]"#, ScriptedElement::visible());
        let listing = PageListing::new(WebUi::new(&page, &config), frame);

        listing
            .open_blank_page_editor(PageType::Product, EditorType::Flex)
            .await
            .unwrap();
        let clicks = page.clicks();
        assert_eq!(clicks.len(), 4);
        assert!(clicks[1].contains(r#"[data-editor-type="flex"]"#));
        assert!(clicks[2].contains(r#"[data-page-type="product"]"#));
        assert!(clicks[3].contains("Create blank page"));
    }

    #[tokio::test]
    async fn test_rows_are_counted_and_found_by_title() {
        let (page, config, frame) = setup();
        page.set_element("tbody tr", ScriptedElement::visible().with_text("Landing"))
            .set_element(".page-row", ScriptedElement::visible().times(2).with_text("About"))
            .set_element(".status", ScriptedElement::visible().with_text(" Published "));
        let listing = PageListing::new(WebUi::new(&page, &config), frame);

        assert_eq!(listing.page_count().await.unwrap(), 3);
        assert!(listing.has_page("landing").await.unwrap());
        assert!(!listing.has_page("Pricing").await.unwrap());
        assert_eq!(listing.page_status(1).await.unwrap(), "Published");
    }

    #[tokio::test]
    async fn test_delete_confirms_in_modal() {
        let (page, config, frame) = setup();
        page.set_element(r#"[data-testid="delete-button"]"#, ScriptedElement::visible())
            .set_element(r#"[data-testid="confirm-delete"]"#, ScriptedElement::visible());
        let listing = PageListing::new(WebUi::new(&page, &config), frame);

        listing.delete(2).await.unwrap();
        let clicks = page.clicks();
        assert_eq!(clicks.len(), 2);
        assert!(clicks[0].contains("[nth=1]"));
        assert!(clicks[1].contains("confirm-delete"));
    }
}
