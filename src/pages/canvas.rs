use crate::core::PageDriver;
use crate::dom::{FrameScope, Locator};
use crate::errors::{HarnessError, Result};
use crate::pages::WebUi;
use crate::types::{ElementRect, ElementType};

pub(crate) const CANVAS: &str = r#"[data-testid="canvas"], .canvas, .editor-canvas"#;
pub(crate) const CANVAS_ELEMENTS: &str = "[data-element], .element";
const SELECTED_ELEMENT: &str = r#"[data-selected="true"], .selected, .element.selected"#;

fn of_type(element_type: ElementType) -> String {
    format!(r#"[data-element-type="{0}"], .{0}"#, element_type)
}

/// Elements dropped on the editor canvas. Indexes are 0-based.
pub struct EditorCanvas<'a, D: PageDriver> {
    ui: WebUi<'a, D>,
    frame: FrameScope,
}

impl<'a, D: PageDriver> EditorCanvas<'a, D> {
    pub fn new(ui: WebUi<'a, D>, frame: FrameScope) -> Self {
        Self { ui, frame }
    }

    pub fn canvas(&self) -> Locator {
        self.frame.locator(CANVAS).first()
    }

    pub fn elements(&self) -> Locator {
        self.canvas().locator(CANVAS_ELEMENTS)
    }

    pub fn element(&self, index: usize) -> Locator {
        self.elements().nth(index)
    }

    pub fn elements_of_type(&self, element_type: ElementType) -> Locator {
        self.canvas().locator(&of_type(element_type))
    }

    pub fn element_of_type(&self, element_type: ElementType, index: usize) -> Locator {
        self.elements_of_type(element_type).nth(index)
    }

    pub fn selected_element(&self) -> Locator {
        self.canvas().locator(SELECTED_ELEMENT).first()
    }

    pub async fn verify_element_exists(&self, element_type: ElementType) -> Result<()> {
        let count = self.element_count_of_type(element_type).await?;
        if count == 0 {
            return Err(HarnessError::Assertion(format!(
                "expected a {} element on the canvas, found none",
                element_type
            )));
        }
        Ok(())
    }

    pub async fn click_element(&self, index: usize) -> Result<()> {
        self.ui.click(&self.element(index)).await
    }

    pub async fn select_element(&self, index: usize) -> Result<()> {
        self.click_element(index).await
    }

    pub async fn select_element_of_type(&self, element_type: ElementType, index: usize) -> Result<()> {
        self.ui
            .click(&self.element_of_type(element_type, index))
            .await
    }

    pub async fn element_text(&self, index: usize) -> Result<String> {
        self.ui.text(&self.element(index)).await
    }

    pub async fn element_attribute(&self, index: usize, name: &str) -> Result<Option<String>> {
        self.ui.attribute(&self.element(index), name).await
    }

    pub async fn selected_text(&self) -> Result<String> {
        self.ui.text(&self.selected_element()).await
    }

    pub async fn selected_attribute(&self, name: &str) -> Result<Option<String>> {
        self.ui.attribute(&self.selected_element(), name).await
    }

    pub async fn element_count(&self) -> Result<usize> {
        self.ui.count(&self.elements()).await
    }

    pub async fn element_count_of_type(&self, element_type: ElementType) -> Result<usize> {
        self.ui.count(&self.elements_of_type(element_type)).await
    }

    /// Select everything on the canvas and delete it.
    pub async fn clear(&self) -> Result<()> {
        self.ui.press_key("Control+a").await?;
        self.ui.press_key("Delete").await
    }

    pub async fn dimensions(&self) -> Result<ElementRect> {
        let canvas = self.canvas();
        self.ui
            .page()
            .bounding_box(&canvas)
            .await?
            .ok_or_else(|| HarnessError::ElementNotFound(format!("{} has no layout box", canvas)))
    }
}
