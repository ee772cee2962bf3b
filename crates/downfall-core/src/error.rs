// Error types shared across the workspace.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a call on the game-client command surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("game client is not connected")]
    NotConnected,

    #[error("command `{command}` rejected: {message}")]
    Rejected {
        command: &'static str,
        message: String,
    },

    #[error("command `{command}` timed out")]
    Timeout { command: &'static str },
}

impl ClientError {
    pub fn rejected(command: &'static str, message: impl Into<String>) -> Self {
        ClientError::Rejected {
            command,
            message: message.into(),
        }
    }
}

/// Failure to read or write the settings document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("no writable location for the settings file")]
    NoConfigDir,
}
