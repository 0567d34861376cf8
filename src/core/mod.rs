pub mod browser;
pub mod config;
pub mod session;

pub use browser::{
    BrowserLauncher, ClickOptions, ElementState, LoadState, MouseButton, PageDriver,
};
pub use config::{AppRoute, BrowserProfile, Config, RunnerConfig};
pub use session::{CookieData, OriginStorage, SessionState, SessionStore, StorageEntry};
