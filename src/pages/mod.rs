//! Page objects for the builder UI. Each view is rebuilt per use from the
//! live page and a frame scope; none of them cache element handles.

pub mod actions;
pub mod canvas;
pub mod editor;
pub mod elements_drawer;
pub mod inspector;
pub mod listing;
pub mod templates_drawer;

pub use actions::{sanitize_file_name, WebUi, DONT_REMIND_KEYS};
pub use canvas::EditorCanvas;
pub use editor::PageEditor;
pub use elements_drawer::ElementsDrawer;
pub use inspector::{InspectorContent, InspectorDesign, InspectorGeneral, InspectorTabView, PageInspector};
pub use listing::PageListing;
pub use templates_drawer::TemplatesDrawer;
