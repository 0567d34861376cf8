use serde::Serialize;
use std::fmt;

/// One alternative inside an OR-combined selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SelectorPart {
    Css { value: String },
    Xpath { value: String },
    /// `tag:has-text("...")` or `text=...`: case-insensitive substring match
    /// on the text content of elements matching `css`.
    Text { css: String, text: String },
}

impl SelectorPart {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        if let Some(xpath) = raw.strip_prefix("xpath=") {
            return SelectorPart::Xpath {
                value: xpath.trim().to_string(),
            };
        }
        if raw.starts_with("//") || raw.starts_with("(//") || raw.starts_with("./") {
            return SelectorPart::Xpath {
                value: raw.to_string(),
            };
        }
        if let Some(text) = raw.strip_prefix("text=") {
            return SelectorPart::Text {
                css: "*".to_string(),
                text: unquote(text.trim()).to_string(),
            };
        }
        if let Some((css, text)) = split_has_text(raw) {
            return SelectorPart::Text {
                css: if css.is_empty() { "*".to_string() } else { css },
                text,
            };
        }
        SelectorPart::Css {
            value: raw.to_string(),
        }
    }

    /// Source form of the alternative, as it would be written in a page object.
    pub fn source(&self) -> String {
        match self {
            SelectorPart::Css { value } => value.clone(),
            SelectorPart::Xpath { value } => value.clone(),
            SelectorPart::Text { css, text } if css == "*" => format!("text={}", text),
            SelectorPart::Text { css, text } => format!("{}:has-text(\"{}\")", css, text),
        }
    }
}

/// A comma-separated list of alternatives. An element matches when any
/// alternative matches; results are kept in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selector {
    pub alternatives: Vec<SelectorPart>,
}

impl Selector {
    pub fn parse(raw: &str) -> Self {
        let alternatives = split_top_level(raw, ',')
            .into_iter()
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .map(|part| SelectorPart::parse(&part))
            .collect();
        Self { alternatives }
    }

    pub fn sources(&self) -> Vec<String> {
        self.alternatives.iter().map(SelectorPart::source).collect()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sources().join(", "))
    }
}

impl From<&str> for Selector {
    fn from(raw: &str) -> Self {
        Selector::parse(raw)
    }
}

/// Chain of iframes to descend through before resolving a locator.
/// An empty chain is the top-level page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrameScope {
    pub frames: Vec<Selector>,
}

impl FrameScope {
    pub fn top() -> Self {
        Self::default()
    }

    pub fn child(&self, frame_selector: &str) -> Self {
        let mut frames = self.frames.clone();
        frames.push(Selector::parse(frame_selector));
        Self { frames }
    }

    pub fn is_top(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn locator(&self, selector: &str) -> Locator {
        Locator::new(self.clone(), selector)
    }
}

impl fmt::Display for FrameScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            return f.write_str("top");
        }
        let chain: Vec<String> = self.frames.iter().map(|s| s.to_string()).collect();
        f.write_str(&chain.join(" >> "))
    }
}

/// One hop of a locator chain: a selector, then an optional text filter and
/// index applied to its matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub selector: Selector,
    pub has_text: Option<String>,
    pub index: Option<usize>,
}

impl Step {
    fn new(selector: &str) -> Self {
        Self {
            selector: Selector::parse(selector),
            has_text: None,
            index: None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.selector)?;
        if let Some(text) = &self.has_text {
            write!(f, " [has-text={:?}]", text)?;
        }
        if let Some(index) = self.index {
            write!(f, " [nth={}]", index)?;
        }
        Ok(())
    }
}

/// Lazy element query: a frame scope plus descendant steps. Nothing touches
/// the browser until a driver resolves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Locator {
    #[serde(rename = "frames", serialize_with = "serialize_frames")]
    pub frame: FrameScope,
    pub steps: Vec<Step>,
}

fn serialize_frames<S: serde::Serializer>(
    frame: &FrameScope,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    frame.frames.serialize(serializer)
}

impl Locator {
    pub fn new(frame: FrameScope, selector: &str) -> Self {
        Self {
            frame,
            steps: vec![Step::new(selector)],
        }
    }

    /// Descendants of this locator's matches.
    pub fn locator(&self, selector: &str) -> Self {
        let mut child = self.clone();
        child.steps.push(Step::new(selector));
        child
    }

    pub fn nth(&self, index: usize) -> Self {
        let mut located = self.clone();
        if let Some(last) = located.steps.last_mut() {
            last.index = Some(index);
        }
        located
    }

    pub fn first(&self) -> Self {
        self.nth(0)
    }

    pub fn filter_text(&self, text: &str) -> Self {
        let mut filtered = self.clone();
        if let Some(last) = filtered.steps.last_mut() {
            last.has_text = Some(text.to_string());
        }
        filtered
    }

    /// Last step, which is what the element itself is matched by.
    pub fn target(&self) -> &Step {
        // `new` seeds one step and nothing removes steps.
        &self.steps[self.steps.len() - 1]
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "null".to_string())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.frame.is_top() {
            write!(f, "{} >> ", self.frame)?;
        }
        let chain: Vec<String> = self.steps.iter().map(|s| s.to_string()).collect();
        f.write_str(&chain.join(" >> "))
    }
}

fn unquote(raw: &str) -> &str {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' || first == b'\'') && first == last {
            return &raw[1..raw.len() - 1];
        }
    }
    raw
}

fn split_has_text(raw: &str) -> Option<(String, String)> {
    const MARKER: &str = ":has-text(";
    let start = raw.find(MARKER)?;
    if !raw.ends_with(')') {
        return None;
    }
    let css = raw[..start].trim().to_string();
    let inner = &raw[start + MARKER.len()..raw.len() - 1];
    Some((css, unquote(inner.trim()).to_string()))
}

/// Splits on `sep` only outside quotes, brackets and parentheses, so XPath
/// predicates like `starts-with(@name, 'x')` stay intact.
fn split_top_level(raw: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in raw.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
                current.push(ch);
            }
            None => match ch {
                '"' | '\'' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                '(' | '[' => {
                    depth += 1;
                    current.push(ch);
                }
                ')' | ']' => {
                    depth = depth.saturating_sub(1);
                    current.push(ch);
                }
                c if c == sep && depth == 0 => {
                    parts.push(std::mem::take(&mut current));
                }
                _ => current.push(ch),
            },
        }
    }
    parts.push(current);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_combined_selector_keeps_every_alternative() {
        let selector = Selector::parse(
            r#"[data-testid="create-page-button"], .create-page-btn, button:has-text("Create page")"#,
        );
        assert_eq!(selector.alternatives.len(), 3);
        assert_eq!(
            selector.alternatives[0],
            SelectorPart::Css {
                value: r#"[data-testid="create-page-button"]"#.to_string()
            }
        );
        assert_eq!(
            selector.alternatives[2],
            SelectorPart::Text {
                css: "button".to_string(),
                text: "Create page".to_string()
            }
        );
    }

    #[test]
    fn test_xpath_commas_are_not_split() {
        let selector = Selector::parse(
            "//iframe[starts-with(@name, 'frame://RC/modal/') and contains(@name, '/src')]",
        );
        assert_eq!(selector.alternatives.len(), 1);
        assert!(matches!(selector.alternatives[0], SelectorPart::Xpath { .. }));
    }

    #[test]
    fn test_quoted_commas_are_not_split() {
        let selector = Selector::parse(r#"button:has-text("Save, then close"), .save"#);
        assert_eq!(selector.alternatives.len(), 2);
        assert_eq!(
            selector.alternatives[0],
            SelectorPart::Text {
                css: "button".to_string(),
                text: "Save, then close".to_string()
            }
        );
    }

    #[test]
    fn test_prefixed_forms() {
        assert_eq!(
            SelectorPart::parse("xpath=//div[@id='a']"),
            SelectorPart::Xpath {
                value: "//div[@id='a']".to_string()
            }
        );
        assert_eq!(
            SelectorPart::parse("text='Publish'"),
            SelectorPart::Text {
                css: "*".to_string(),
                text: "Publish".to_string()
            }
        );
    }

    #[test]
    fn test_source_round_trips_display() {
        let raw = r#"button:has-text("Login"), input[type="email"]"#;
        assert_eq!(Selector::parse(raw).to_string(), raw);
    }

    #[test]
    fn test_locator_chain_display() {
        let frame = FrameScope::top().child(r#"iframe[name="app-iframe"]"#);
        let rows = frame
            .locator("table")
            .locator("tbody tr, .page-row")
            .filter_text("Landing")
            .first();
        assert_eq!(
            rows.to_string(),
            r#"iframe[name="app-iframe"] >> table >> tbody tr, .page-row [has-text="Landing"] [nth=0]"#
        );
        assert_eq!(rows.target().selector.sources(), vec!["tbody tr", ".page-row"]);
        assert_eq!(rows.target().index, Some(0));
    }

    #[test]
    fn test_locator_serializes_for_the_page_runtime() {
        let locator = FrameScope::top().locator(".canvas").nth(2);
        let json: serde_json::Value = serde_json::from_str(&locator.to_json()).unwrap();
        assert_eq!(json["frames"], serde_json::json!([]));
        assert_eq!(json["steps"][0]["index"], 2);
        assert_eq!(json["steps"][0]["selector"]["alternatives"][0]["kind"], "css");
        assert_eq!(json["steps"][0]["hasText"], serde_json::Value::Null);
    }

    #[test]
    fn test_index_stays_on_its_own_step() {
        let status = FrameScope::top()
            .locator("tbody tr")
            .nth(1)
            .locator(".status");
        assert_eq!(status.steps[0].index, Some(1));
        assert_eq!(status.steps[1].index, None);
        assert_eq!(status.to_string(), "tbody tr [nth=1] >> .status");
    }
}
