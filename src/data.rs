//! Fixture data shared by the live specs.

use crate::types::{EditorType, PageType};

pub const MAX_TITLE_LEN: usize = 255;

pub fn page_types() -> Vec<PageType> {
    PageType::ALL.to_vec()
}

pub fn editor_types() -> Vec<EditorType> {
    vec![EditorType::Flex, EditorType::Legacy]
}

#[derive(Debug, Clone)]
pub struct TitleData {
    pub valid: Vec<String>,
    /// Empty, blank and one character over the limit.
    pub invalid: Vec<String>,
}

pub fn page_titles() -> TitleData {
    TitleData {
        valid: (1..=3).map(|n| format!("Test Page {}", n)).collect(),
        invalid: vec![
            String::new(),
            "   ".to_string(),
            "a".repeat(MAX_TITLE_LEN + 1),
        ],
    }
}

/// Title that stays unique across runs, e.g. `Landing - home - 20261019T101500`.
pub fn unique_title(prefix: &str, page_type: PageType) -> String {
    format!(
        "{} - {} - {}",
        prefix,
        page_type,
        chrono::Utc::now().format("%Y%m%dT%H%M%S%3f")
    )
}
