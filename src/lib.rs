pub mod auth;
pub mod browser;
pub mod core;
pub mod data;
pub mod dom;
pub mod errors;
pub mod pages;
pub mod runner;
pub mod testing;
pub mod types;

pub use auth::{ensure_session, BootstrapOutcome, Bridge, LoginOutcome};
#[cfg(feature = "chrome")]
pub use browser::{ChromeBrowser, ChromePage};
pub use crate::core::{BrowserLauncher, Config, PageDriver, SessionState, SessionStore};
pub use dom::{FrameScope, Locator};
pub use errors::{HarnessError, Result};
pub use runner::{CaseReport, CaseRunner, CaseStatus};
pub use types::*;
