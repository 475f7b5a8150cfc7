use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("session was reclaimed by its watchdog")]
    SessionReclaimed,

    #[error("invalid profile name: {0}")]
    InvalidProfileName(String),

    #[error("session limiter is closed")]
    LimiterClosed,

    #[error("profile directory error: {0}")]
    Io(#[from] std::io::Error),
}
