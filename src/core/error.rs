use thiserror::Error;

use crate::core::types::{CharacterId, EventId};

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Character not found: {0}")]
    UnknownCharacter(CharacterId),

    #[error("Character data error in {source_name}: {message}")]
    CharacterData { source_name: String, message: String },

    #[error("Handler for {event} failed: {message}")]
    HandlerFailed { event: String, message: String },

    #[error("Request #{request_id} ({request_type}) got no response within {waited_ms}ms")]
    RequestTimeout {
        request_id: u64,
        request_type: &'static str,
        waited_ms: u128,
    },

    #[error("Cannot schedule event: {0}")]
    InvalidSchedule(String),

    #[error("Event {0:?} is not pending")]
    EventNotPending(EventId),

    #[error("Dispatcher has been destroyed")]
    DispatcherDestroyed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl SimError {
    /// Shorthand for a handler failure tied to an event name
    pub fn handler(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandlerFailed {
            event: event.into(),
            message: message.into(),
        }
    }

    /// Configuration errors abort a run before it starts; everything else is
    /// recoverable inside a running simulation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::DispatcherDestroyed)
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
