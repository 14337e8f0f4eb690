//! Error types for the streamify library.

use thiserror::Error;

/// Errors that can occur while driving a conversion session.
#[derive(Error, Debug)]
pub enum Error {
    /// Error from the Telegram Bot API.
    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Error while downloading a file from the Bot API file server.
    #[error("Telegram download error: {0}")]
    TelegramDownload(#[from] teloxide::DownloadError),

    /// HTTP client construction error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Probe output could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Thumbnail image could not be decoded or re-encoded.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// A blocking helper task panicked or was aborted.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Progress cannot be computed for a transfer that reports no bytes.
    #[error("transfer reported a total size of zero")]
    ZeroSizedTransfer,

    /// The transfer was cancelled by the user.
    #[error("transfer cancelled")]
    Cancelled,
}

/// A specialized `Result` type for streamify operations.
pub type Result<T> = std::result::Result<T, Error>;
