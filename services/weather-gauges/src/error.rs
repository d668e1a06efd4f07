//! Error types for the gauge synchronization client

/// Errors that can occur while talking to the weather station
#[derive(Debug, thiserror::Error)]
pub enum GaugeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Event stream error: {0}")]
    Stream(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for gauge operations
pub type Result<T> = std::result::Result<T, GaugeError>;
