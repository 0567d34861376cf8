use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Session state error: {0}")]
    SessionState(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Chrome error: {0}")]
    ChromeError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

impl HarnessError {
    /// Wraps a driver-level failure (headless_chrome reports `anyhow::Error`).
    pub fn from_any_error<E: std::fmt::Display>(err: E) -> Self {
        HarnessError::ChromeError(err.to_string())
    }

    pub fn missing_env(name: &str) -> Self {
        HarnessError::Configuration(format!(
            "{} environment variable is required but not set",
            name
        ))
    }

    /// Timeouts are the one failure class the bridge and bootstrap swallow.
    pub fn is_timeout(&self) -> bool {
        matches!(self, HarnessError::Timeout(_))
    }
}
