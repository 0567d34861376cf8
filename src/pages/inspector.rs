use crate::core::PageDriver;
use crate::dom::{FrameScope, Locator};
use crate::errors::Result;
use crate::pages::WebUi;
use crate::types::InspectorTab;
use tracing::debug;

const PANEL: &str = r#"[data-testid="page-inspector"], .page-inspector, .inspector"#;
const TABS: &str = "[data-tab], .tab";
const OPEN_BUTTON: &str =
    r#"[data-testid="open-inspector"], .open-inspector, button:has-text("Inspector")"#;
const CLOSE_BUTTON: &str =
    r#"[data-testid="close-inspector"], .close-inspector, button:has-text("Close")"#;
const CONTENT_SECTION: &str = r#"[data-section="content"], .content"#;

fn field(name: &str, tag: &str) -> String {
    format!(r#"[data-field="{0}"], {1}[name="{0}"]"#, name, tag)
}

/// Property panel for the selected element.
pub struct PageInspector<'a, D: PageDriver> {
    ui: WebUi<'a, D>,
    frame: FrameScope,
}

impl<'a, D: PageDriver> PageInspector<'a, D> {
    pub fn new(ui: WebUi<'a, D>, frame: FrameScope) -> Self {
        Self { ui, frame }
    }

    pub fn panel(&self) -> Locator {
        self.frame.locator(PANEL).first()
    }

    pub fn tabs(&self) -> Locator {
        self.panel().locator(TABS)
    }

    pub fn tab(&self, tab: InspectorTab) -> Locator {
        self.panel()
            .locator(&format!(r#"[data-tab="{0}"], .{0}"#, tab))
            .first()
    }

    pub async fn open(&self) -> Result<()> {
        self.ui.click(&self.frame.locator(OPEN_BUTTON).first()).await?;
        self.ui.wait_visible(&self.panel()).await
    }

    pub async fn close(&self) -> Result<()> {
        self.ui.click(&self.frame.locator(CLOSE_BUTTON).first()).await?;
        self.ui.wait_hidden(&self.panel()).await
    }

    pub async fn is_visible(&self) -> Result<bool> {
        self.ui.is_visible(&self.panel()).await
    }

    pub async fn tab_count(&self) -> Result<usize> {
        self.ui.count(&self.tabs()).await
    }

    pub async fn switch_tab(&self, tab: InspectorTab) -> Result<()> {
        debug!("Switching inspector to {} tab", tab);
        self.ui.click(&self.tab(tab)).await
    }

    pub fn general(&self) -> InspectorGeneral<'a, D> {
        InspectorGeneral {
            inspector: self.view(),
        }
    }

    pub fn design(&self) -> InspectorDesign<'a, D> {
        InspectorDesign {
            inspector: self.view(),
        }
    }

    pub fn advanced(&self) -> InspectorTabView<'a, D> {
        InspectorTabView::new(self.view(), InspectorTab::Advanced)
    }

    pub fn animation(&self) -> InspectorTabView<'a, D> {
        InspectorTabView::new(self.view(), InspectorTab::Animation)
    }

    pub fn responsive(&self) -> InspectorTabView<'a, D> {
        InspectorTabView::new(self.view(), InspectorTab::Responsive)
    }

    fn view(&self) -> Self {
        Self::new(self.ui, self.frame.clone())
    }

    async fn fill_field(&self, section: Option<&str>, selector: &str, value: &str) -> Result<()> {
        let scope = match section {
            Some(section) => self.panel().locator(section).first(),
            None => self.panel(),
        };
        self.ui.clear_and_fill(&scope.locator(selector).first(), value).await
    }
}

pub struct InspectorGeneral<'a, D: PageDriver> {
    inspector: PageInspector<'a, D>,
}

impl<'a, D: PageDriver> InspectorGeneral<'a, D> {
    pub async fn open(&self) -> Result<()> {
        self.inspector.switch_tab(InspectorTab::General).await
    }

    pub fn content(&self) -> InspectorContent<'a, D> {
        InspectorContent {
            inspector: self.inspector.view(),
        }
    }
}

/// Content section of the General tab.
pub struct InspectorContent<'a, D: PageDriver> {
    inspector: PageInspector<'a, D>,
}

impl<'a, D: PageDriver> InspectorContent<'a, D> {
    pub async fn change_content(&self, content: &str) -> Result<()> {
        self.inspector
            .fill_field(Some(CONTENT_SECTION), &field("content", "input"), content)
            .await
    }

    pub async fn change_text(&self, text: &str) -> Result<()> {
        self.inspector
            .fill_field(Some(CONTENT_SECTION), &field("text", "input"), text)
            .await
    }

    pub async fn change_button_type(&self, button_type: &str) -> Result<()> {
        let select = self
            .inspector
            .panel()
            .locator(CONTENT_SECTION)
            .first()
            .locator(&field("button-type", "select"))
            .first();
        self.inspector.ui.select_option(&select, button_type).await
    }
}

pub struct InspectorDesign<'a, D: PageDriver> {
    inspector: PageInspector<'a, D>,
}

impl<'a, D: PageDriver> InspectorDesign<'a, D> {
    pub async fn open(&self) -> Result<()> {
        self.inspector.switch_tab(InspectorTab::Design).await
    }

    pub async fn change_background(&self, value: &str) -> Result<()> {
        self.inspector
            .fill_field(None, &field("background", "input"), value)
            .await
    }

    pub async fn change_border(&self, value: &str) -> Result<()> {
        self.inspector
            .fill_field(None, &field("border", "input"), value)
            .await
    }

    pub async fn change_spacing(&self, value: &str) -> Result<()> {
        self.inspector
            .fill_field(None, &field("spacing", "input"), value)
            .await
    }
}

/// Advanced, Animation and Responsive tabs, which only need to be opened.
pub struct InspectorTabView<'a, D: PageDriver> {
    inspector: PageInspector<'a, D>,
    tab: InspectorTab,
}

impl<'a, D: PageDriver> InspectorTabView<'a, D> {
    fn new(inspector: PageInspector<'a, D>, tab: InspectorTab) -> Self {
        Self { inspector, tab }
    }

    pub fn kind(&self) -> InspectorTab {
        self.tab
    }

    pub async fn open(&self) -> Result<()> {
        self.inspector.switch_tab(self.tab).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::testing::{RecordedAction, ScriptedElement, ScriptedPage};

    #[tokio::test]
    async fn test_tabs_switch_by_token() {
        let page = ScriptedPage::new("https://rc.pagefly.io/editor");
        page.set_element(".inspector", ScriptedElement::visible())
            .set_element(r#"[data-tab="animation"]"#, ScriptedElement::visible());
        let config = Config::from_lookup(|_| None).unwrap();
        let inspector = PageInspector::new(WebUi::new(&page, &config), FrameScope::top());

        assert!(inspector.is_visible().await.unwrap());
        let animation = inspector.animation();
        assert_eq!(animation.kind(), InspectorTab::Animation);
        animation.open().await.unwrap();
        assert!(page.clicks()[0].contains(r#"[data-tab="animation"]"#));
        assert!(inspector.design().open().await.is_err());
    }

    #[tokio::test]
    async fn test_content_fields_are_replaced() {
        let page = ScriptedPage::new("https://rc.pagefly.io/editor");
        page.set_element(
            r#"input[name="text"]"#,
            ScriptedElement::visible().with_value("Shop now"),
        )
        .set_element(r#"select[name="button-type"]"#, ScriptedElement::visible());
        let config = Config::from_lookup(|_| None).unwrap();
        let inspector = PageInspector::new(WebUi::new(&page, &config), FrameScope::top());
        let content = inspector.general().content();

        content.change_text("Buy").await.unwrap();
        content.change_button_type("submit").await.unwrap();

        assert_eq!(page.element(r#"input[name="text"]"#).unwrap().value, "Buy");
        assert!(page.actions().iter().any(|a| matches!(
            a,
            RecordedAction::Select { value, .. } if value == "submit"
        )));
    }
}
