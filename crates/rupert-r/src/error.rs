use rupert_engine::backend::BrowserError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Failed to bind bridge socket: {0}")]
    Bind(#[from] std::io::Error),

    #[error("No extension connected")]
    NoExtension,

    #[error("Extension disconnected before answering {0}")]
    Closed(String),

    #[error("Extension did not answer {0} in time")]
    Timeout(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<BridgeError> for BrowserError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::NoExtension | BridgeError::Closed(_) => BrowserError::ConnectionLost,
            BridgeError::Timeout(operation) => BrowserError::Timeout { operation },
            BridgeError::Serialization(e) => BrowserError::Serialization(e.to_string()),
            BridgeError::Bind(e) => BrowserError::Other(e.to_string()),
        }
    }
}
