use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Offset relative to the top-left corner of an element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Home,
    Product,
    Collection,
    Custom,
}

impl PageType {
    pub const ALL: [PageType; 4] = [
        PageType::Home,
        PageType::Product,
        PageType::Collection,
        PageType::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Home => "home",
            PageType::Product => "product",
            PageType::Collection => "collection",
            PageType::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorType {
    Flex,
    Legacy,
}

impl EditorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditorType::Flex => "flex",
            EditorType::Legacy => "legacy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Published,
    Unpublished,
    Draft,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageStatus::Published => "published",
            PageStatus::Unpublished => "unpublished",
            PageStatus::Draft => "draft",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingType {
    Page,
    Section,
    Theme,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::Page => "page",
            ListingType::Section => "section",
            ListingType::Theme => "theme",
        }
    }
}

/// Elements offered by the builder's elements drawer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Heading,
    Text,
    Button,
    Image,
    Video,
    Section,
    Row,
    Column,
    Spacer,
    Divider,
    Icon,
    Countdown,
    Qrcode,
}

impl ElementType {
    pub const BASIC: [ElementType; 3] = [ElementType::Heading, ElementType::Text, ElementType::Button];
    pub const MEDIA: [ElementType; 2] = [ElementType::Image, ElementType::Video];
    pub const LAYOUT: [ElementType; 3] = [ElementType::Section, ElementType::Row, ElementType::Column];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Heading => "heading",
            ElementType::Text => "text",
            ElementType::Button => "button",
            ElementType::Image => "image",
            ElementType::Video => "video",
            ElementType::Section => "section",
            ElementType::Row => "row",
            ElementType::Column => "column",
            ElementType::Spacer => "spacer",
            ElementType::Divider => "divider",
            ElementType::Icon => "icon",
            ElementType::Countdown => "countdown",
            ElementType::Qrcode => "qrcode",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let parsed = match value.trim().to_ascii_lowercase().as_str() {
            "heading" => ElementType::Heading,
            "text" => ElementType::Text,
            "button" => ElementType::Button,
            "image" => ElementType::Image,
            "video" => ElementType::Video,
            "section" => ElementType::Section,
            "row" => ElementType::Row,
            "column" => ElementType::Column,
            "spacer" => ElementType::Spacer,
            "divider" => ElementType::Divider,
            "icon" => ElementType::Icon,
            "countdown" => ElementType::Countdown,
            "qrcode" => ElementType::Qrcode,
            _ => return None,
        };
        Some(parsed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InspectorTab {
    General,
    Design,
    Advanced,
    Animation,
    Responsive,
}

impl InspectorTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectorTab::General => "general",
            InspectorTab::Design => "design",
            InspectorTab::Advanced => "advanced",
            InspectorTab::Animation => "animation",
            InspectorTab::Responsive => "responsive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceMode {
    Desktop,
    Tablet,
    Mobile,
}

impl DeviceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceMode::Desktop => "desktop",
            DeviceMode::Tablet => "tablet",
            DeviceMode::Mobile => "mobile",
        }
    }

    pub fn viewport(&self) -> Viewport {
        match self {
            DeviceMode::Desktop => Viewport {
                width: 1920,
                height: 1080,
            },
            DeviceMode::Tablet => Viewport {
                width: 768,
                height: 1024,
            },
            DeviceMode::Mobile => Viewport {
                width: 375,
                height: 667,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureHandling {
    StopOnFailure,
    ContinueOnFailure,
    Optional,
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(
    PageType,
    EditorType,
    PageStatus,
    ListingType,
    ElementType,
    InspectorTab,
    DeviceMode
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_tokens_are_lowercase() {
        assert_eq!(PageType::Custom.to_string(), "custom");
        assert_eq!(EditorType::Flex.to_string(), "flex");
        assert_eq!(PageStatus::Unpublished.to_string(), "unpublished");
        assert_eq!(ElementType::Qrcode.to_string(), "qrcode");
        assert_eq!(InspectorTab::Responsive.to_string(), "responsive");
    }

    #[test]
    fn test_element_type_parse() {
        assert_eq!(ElementType::parse(" Heading "), Some(ElementType::Heading));
        assert_eq!(ElementType::parse("carousel"), None);
    }

    #[test]
    fn test_serde_matches_tokens() {
        let json = serde_json::to_string(&ElementType::Countdown).unwrap();
        assert_eq!(json, "\"countdown\"");
        let back: PageType = serde_json::from_str("\"collection\"").unwrap();
        assert_eq!(back, PageType::Collection);
    }

    #[test]
    fn test_device_viewports() {
        assert_eq!(DeviceMode::Tablet.viewport().width, 768);
        assert_eq!(DeviceMode::Mobile.viewport().height, 667);
    }
}
