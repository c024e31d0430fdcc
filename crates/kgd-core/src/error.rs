// kgd-core – Error types

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyguardError {
    /// A caller used the API in a way the current state does not allow.
    Misuse(String),
    /// A required collaborator (status bar, presenter host, …) is missing.
    CollaboratorUnavailable(String),
    /// Internal invariant violated; indicates a programming error.
    InvalidState(String),
    /// The mediator task has stopped.
    ChannelClosed,
    Timeout(String),
    ConfigError(String),
    IoError(String),
    SerializationError(String),
}

impl fmt::Display for KeyguardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Misuse(msg) => write!(f, "Misuse: {}", msg),
            Self::CollaboratorUnavailable(what) => {
                write!(f, "Collaborator unavailable: {}", what)
            }
            Self::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Self::ChannelClosed => write!(f, "Keyguard mediator is not running"),
            Self::Timeout(msg) => write!(f, "Timed out: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::IoError(msg) => write!(f, "I/O error: {}", msg),
            Self::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for KeyguardError {}

impl From<std::io::Error> for KeyguardError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

impl From<serde_json::Error> for KeyguardError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

impl From<KeyguardError> for String {
    fn from(e: KeyguardError) -> Self {
        e.to_string()
    }
}

pub type KeyguardResult<T> = Result<T, KeyguardError>;
