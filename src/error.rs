use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the host.
pub type Result<T> = std::result::Result<T, HostError>;

/// Errors raised while classifying, reading, or reporting style sheets.
#[derive(Error, Debug)]
pub enum HostError {
    /// A path handed to the classifier does not live under the watched root.
    #[error("path is outside the watched root: {}", path.display())]
    InvalidPath { path: PathBuf },

    /// A style sheet could not be read (usually removed between event and read).
    #[error("cannot read {}: {source}", path.display())]
    Content {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Frame exceeds what the browser accepts from a native host.
    #[error("message of {size} bytes exceeds the {limit} byte frame limit")]
    MessageTooLarge { size: usize, limit: usize },

    /// Output stream failure, including a disconnected browser.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The filesystem subscription could not be established.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
}

impl HostError {
    /// Recoverable errors drop a single message; everything else ends the process.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Content { .. } | Self::MessageTooLarge { .. })
    }
}
