use thiserror::Error;

/// Failures on the publish/subscribe path.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Transport error on channel {channel}: {reason}")]
    Transport { channel: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Event bus is shut down")]
    ShutDown,
}

impl EventError {
    pub fn transport(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            channel: channel.into(),
            reason: reason.into(),
        }
    }
}

/// Error returned by a subscription handler.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self(message.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EventError>;
pub type HandlerResult = std::result::Result<(), HandlerError>;
