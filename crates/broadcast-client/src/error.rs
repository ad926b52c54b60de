//! Error types for the broadcasting client

use acc_broadcast_protocol::ProtocolError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Registration rejected by server: {0}")]
    RegistrationRejected(String),

    #[error("No registration result after {attempts} attempts")]
    RegistrationTimedOut { attempts: u32 },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ClientError {
    /// Process exit code used by the CLI for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ClientError::InvalidConfiguration(_)
            | ClientError::Json(_)
            | ClientError::Yaml(_) => 4,
            ClientError::RegistrationRejected(_) => 5,
            ClientError::RegistrationTimedOut { .. } => 6,
            ClientError::Protocol(_) | ClientError::Io(_) => 1,
        }
    }
}
