use std::time::Duration;

/// Status returned to the compatibility layer on success.
pub const STATUS_SUCCESS: u32 = 0;
/// Status returned when a keystroke query finds no pending transition.
pub const STATUS_EMPTY: u32 = 4306;

const STATUS_NOT_SUPPORTED: u32 = 50;
const STATUS_BAD_ARGUMENTS: u32 = 160;
const STATUS_SERVICE_NOT_ACTIVE: u32 = 1062;
const STATUS_DEVICE_NOT_CONNECTED: u32 = 1167;
const STATUS_BAD_CONFIGURATION: u32 = 1610;

#[derive(Debug, thiserror::Error)]
pub enum NetPadError {
    #[error("Invalid controller slot: {0}")]
    InvalidSlot(u32),

    #[error("Controller {0} is not connected")]
    NotConnected(u32),

    #[error("Not supported by the input server: {0}")]
    Unsupported(&'static str),

    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Input server not ready after {0:?}")]
    NotReady(Duration),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NetPadError {
    /// Win32-style status code the compatibility layer hands back to callers.
    pub fn status_code(&self) -> u32 {
        match self {
            Self::InvalidSlot(_) => STATUS_BAD_ARGUMENTS,
            Self::NotConnected(_) => STATUS_DEVICE_NOT_CONNECTED,
            Self::Unsupported(_) => STATUS_NOT_SUPPORTED,
            Self::TransportUnavailable(_) | Self::NotReady(_) => STATUS_SERVICE_NOT_ACTIVE,
            Self::Config(_) | Self::Io(_) | Self::Json(_) => STATUS_BAD_CONFIGURATION,
        }
    }
}

pub type Result<T> = std::result::Result<T, NetPadError>;
