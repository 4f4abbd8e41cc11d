use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Classification of object-store write failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    Unauthorized,
    BucketNotFound,
    Network,
    Rejected,
    Io,
}

impl StoreErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::BucketNotFound => "bucket_not_found",
            Self::Network => "network_error",
            Self::Rejected => "rejected",
            Self::Io => "io_error",
        }
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Failed to retrieve API credentials: {0}")]
    Credential(String),

    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("TestRail rejected the credentials (status {status}) at {endpoint}")]
    AuthRejected { status: u16, endpoint: String },

    #[error("Project scan did not finish within {0:?}")]
    ScanDeadline(Duration),

    #[error("Object store {kind}: {message}")]
    Store {
        kind: StoreErrorKind,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    pub fn store(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self::Store {
            kind,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;
