use crate::core::PageDriver;
use crate::dom::{FrameScope, Locator};
use crate::errors::{HarnessError, Result};
use crate::pages::canvas::{CANVAS, CANVAS_ELEMENTS};
use crate::pages::{EditorCanvas, ElementsDrawer, PageInspector, TemplatesDrawer, WebUi};
use crate::types::{ElementType, ListingType, Point};
use tracing::info;

const TITLE_INPUT: &str = r#"[data-testid="page-title"], input[name="title"], .page-title-input"#;
const SAVE_BUTTON: &str = r#"button:has-text("Save"), [data-testid="save-button"]"#;
const PUBLISH_BUTTON: &str = r#"button:has-text("Publish"), [data-testid="publish-button"]"#;
const PREVIEW_BUTTON: &str = r#"button:has-text("Preview"), [data-testid="preview-button"]"#;
const BACK_BUTTON: &str = r#"button:has-text("Back"), [data-testid="back-button"]"#;

/// The page editor. Element indexes are 0-based, in canvas order.
pub struct PageEditor<'a, D: PageDriver> {
    ui: WebUi<'a, D>,
    frame: FrameScope,
}

impl<'a, D: PageDriver> PageEditor<'a, D> {
    pub fn new(ui: WebUi<'a, D>, frame: FrameScope) -> Self {
        Self { ui, frame }
    }

    pub fn frame(&self) -> &FrameScope {
        &self.frame
    }

    fn at(&self, selector: &str) -> Locator {
        self.frame.locator(selector).first()
    }

    pub fn canvas(&self) -> EditorCanvas<'a, D> {
        EditorCanvas::new(self.ui, self.frame.clone())
    }

    pub fn elements_drawer(&self) -> ElementsDrawer<'a, D> {
        ElementsDrawer::new(self.ui, self.frame.clone())
    }

    pub fn templates_drawer(&self) -> TemplatesDrawer<'a, D> {
        TemplatesDrawer::new(self.ui, self.frame.clone(), ListingType::Page)
    }

    pub fn inspector(&self) -> PageInspector<'a, D> {
        PageInspector::new(self.ui, self.frame.clone())
    }

    pub async fn verify_loaded(&self) -> Result<()> {
        let markers = [self.at(CANVAS), self.at(TITLE_INPUT)];
        if self.ui.first_visible(&markers).await?.is_some() {
            return Ok(());
        }
        let url = self.ui.current_url().await.unwrap_or_default();
        Err(HarnessError::Assertion(format!(
            "editor did not load (url: {})",
            url
        )))
    }

    /// Replace the page title. An empty title is typed as is.
    pub async fn change_title(&self, title: &str) -> Result<()> {
        info!("Changing page title to {:?}", title);
        self.ui.clear_and_fill(&self.at(TITLE_INPUT), title).await
    }

    pub async fn title(&self) -> Result<String> {
        self.ui.input_value(&self.at(TITLE_INPUT)).await
    }

    pub async fn save(&self) -> Result<()> {
        self.ui.click(&self.at(SAVE_BUTTON)).await
    }

    pub async fn publish(&self) -> Result<()> {
        self.ui.click(&self.at(PUBLISH_BUTTON)).await
    }

    pub async fn preview(&self) -> Result<()> {
        self.ui.click(&self.at(PREVIEW_BUTTON)).await
    }

    pub async fn back(&self) -> Result<()> {
        self.ui.click(&self.at(BACK_BUTTON)).await
    }

    pub async fn add_element(&self, element_type: ElementType) -> Result<()> {
        let button = self.at(&format!(
            r#"[data-element-type="{0}"], button:has-text("{0}")"#,
            element_type
        ));
        self.ui.click(&button).await
    }

    pub async fn drag_element_to_canvas(
        &self,
        element_type: ElementType,
        position: Option<Point>,
    ) -> Result<()> {
        self.elements_drawer()
            .drag_to_canvas(element_type, position)
            .await
    }

    pub async fn select_element(&self, index: usize) -> Result<()> {
        let element = self.at(CANVAS).locator(CANVAS_ELEMENTS).nth(index);
        self.ui.click(&element).await
    }

    pub async fn delete_selected(&self) -> Result<()> {
        self.ui.press_key("Delete").await
    }

    pub async fn undo(&self) -> Result<()> {
        self.ui.press_key("Control+z").await
    }

    pub async fn redo(&self) -> Result<()> {
        self.ui.press_key("Control+y").await
    }
}
