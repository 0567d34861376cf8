use crate::core::PageDriver;
use crate::dom::{FrameScope, Locator};
use crate::errors::Result;
use crate::pages::canvas::CANVAS;
use crate::pages::WebUi;
use crate::types::{ElementType, Point};
use tracing::{debug, info};

const DRAWER: &str = r#"[data-testid="elements-drawer"], .elements-drawer, .drawer"#;
const ELEMENT_ITEMS: &str = "[data-element-type], .element-item";
const OPEN_BUTTON: &str =
    r#"[data-testid="open-elements-drawer"], .open-elements-drawer, button:has-text("Elements")"#;
const CLOSE_BUTTON: &str = r#"[data-testid="close-drawer"], .close-drawer, button:has-text("Close")"#;
const SEARCH_INPUT: &str = r#"[data-testid="search-elements"], input[placeholder*="search"]"#;

pub struct ElementsDrawer<'a, D: PageDriver> {
    ui: WebUi<'a, D>,
    frame: FrameScope,
}

impl<'a, D: PageDriver> ElementsDrawer<'a, D> {
    pub fn new(ui: WebUi<'a, D>, frame: FrameScope) -> Self {
        Self { ui, frame }
    }

    pub fn drawer(&self) -> Locator {
        self.frame.locator(DRAWER).first()
    }

    pub fn items(&self) -> Locator {
        self.drawer().locator(ELEMENT_ITEMS)
    }

    pub fn element(&self, element_type: ElementType) -> Locator {
        self.drawer()
            .locator(&format!(r#"[data-element-type="{}"]"#, element_type))
            .first()
    }

    pub async fn open(&self) -> Result<()> {
        self.ui.click(&self.frame.locator(OPEN_BUTTON).first()).await?;
        self.ui.wait_visible(&self.drawer()).await
    }

    pub async fn close(&self) -> Result<()> {
        self.ui.click(&self.frame.locator(CLOSE_BUTTON).first()).await?;
        self.ui.wait_hidden(&self.drawer()).await
    }

    pub async fn is_open(&self) -> Result<bool> {
        self.ui.is_visible(&self.drawer()).await
    }

    /// Drag an element from the drawer onto the canvas, dropping it at
    /// `position` (relative to the canvas) or at its centre.
    pub async fn drag_to_canvas(&self, element_type: ElementType, position: Option<Point>) -> Result<()> {
        info!("Dragging {} onto the canvas", element_type);
        let canvas = self.frame.locator(CANVAS).first();
        self.ui
            .page()
            .drag_to(&self.element(element_type), &canvas, position)
            .await
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

    pub async fn element_count(&self) -> Result<usize> {
        self.ui.count(&self.items()).await
    }

    pub async fn element_count_of_type(&self, element_type: ElementType) -> Result<usize> {
        let typed = self
            .drawer()
            .locator(&format!(r#"[data-element-type="{}"]"#, element_type));
        self.ui.count(&typed).await
    }

    pub async fn has_element(&self, element_type: ElementType) -> Result<bool> {
        Ok(self.element_count_of_type(element_type).await? > 0)
    }

    /// Types listed in the drawer, in display order. Unknown tokens are skipped.
    pub async fn available_types(&self) -> Result<Vec<ElementType>> {
        let items = self.items();
        let count = self.ui.count(&items).await?;
        let mut types = Vec::new();
        for i in 0..count {
            let token = self.ui.attribute(&items.nth(i), "data-element-type").await?;
            match token.as_deref().and_then(ElementType::parse) {
                Some(element_type) if !types.contains(&element_type) => types.push(element_type),
                Some(_) => {}
                None => debug!("Skipping drawer item {} with type {:?}", i, token),
            }
        }
        Ok(types)
    }
}
