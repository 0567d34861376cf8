pub mod locator;
pub mod script;

pub use locator::{FrameScope, Locator, Selector, SelectorPart, Step};
