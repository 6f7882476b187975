use thiserror::Error;

/// Errors raised by a browser backend (extension bridge or Chromium).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrowserError {
    // ============================================================
    // Lifecycle
    // ============================================================
    #[error("Browser not ready")]
    NotReady,

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Connection lost")]
    ConnectionLost,

    // ============================================================
    // Tabs and navigation
    // ============================================================
    #[error("Tab {0} not found")]
    TabNotFound(i64),

    #[error("No active tab")]
    NoActiveTab,

    #[error("Navigation failed: {0}")]
    Navigation(String),

    // ============================================================
    // Page actions
    // ============================================================
    #[error("Could not find element: {0}")]
    ElementNotFound(String),

    #[error("Script execution error: {0}")]
    ScriptError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Timeout: {operation}")]
    Timeout { operation: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for BrowserError {
    fn from(err: serde_json::Error) -> Self {
        BrowserError::Serialization(err.to_string())
    }
}

impl BrowserError {
    /// Wire code understood by the extension, inverse of
    /// [`crate::error_mapping::map_browser_error`].
    pub fn code(&self) -> &'static str {
        match self {
            BrowserError::NotReady => "NOT_READY",
            BrowserError::NotSupported(_) => "NOT_SUPPORTED",
            BrowserError::ConnectionLost => "CONNECTION_LOST",
            BrowserError::TabNotFound(_) => "TAB_NOT_FOUND",
            BrowserError::NoActiveTab => "NO_ACTIVE_TAB",
            BrowserError::Navigation(_) => "NAVIGATION_ERROR",
            BrowserError::ElementNotFound(_) => "ELEMENT_NOT_FOUND",
            BrowserError::ScriptError(_) => "SCRIPT_ERROR",
            BrowserError::PermissionDenied(_) => "PERMISSION_DENIED",
            BrowserError::Timeout { .. } => "TIMEOUT",
            BrowserError::InvalidRequest(_) => "INVALID_REQUEST",
            BrowserError::Serialization(_) => "SERIALIZATION_ERROR",
            BrowserError::Other(_) => "INTERNAL_ERROR",
        }
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        BrowserError::Timeout {
            operation: operation.into(),
        }
    }
}
