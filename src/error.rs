//! Error types for each layer of the bot.
//!
//! Store and fetch errors are turned into chat replies at the command
//! boundary via `user_message`; only `Error` ever reaches `main`.

use std::io;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no track with id {0}")]
    NotFound(String),

    #[error("track {0} is already registered")]
    AlreadyExists(String),

    /// A record without its backing file, or a file without its record.
    #[error("store integrity fault for {id}: {detail}")]
    Integrity { id: String, detail: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("already processing this reference")]
    AlreadyProcessing,

    #[error("reference is blacklisted")]
    Blacklisted,

    #[error("duration {duration:?} exceeds the {limit:?} limit")]
    TooLong { duration: Duration, limit: Duration },

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("metadata lookup failed: {0}")]
    Metadata(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FetchError {
    /// Reply text for the user who issued the command.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::InvalidReference(_) => "Invalid YouTube link".to_string(),
            FetchError::AlreadyProcessing => "Already processing this video!".to_string(),
            FetchError::Blacklisted => "This video is blacklisted".to_string(),
            FetchError::TooLong { limit, .. } => {
                format!("Video too long (limit is {} minutes)", limit.as_secs() / 60)
            }
            FetchError::DownloadFailed(_) => "Error downloading video".to_string(),
            FetchError::Metadata(_) => "Could not look up video details".to_string(),
            FetchError::Store(_) => "Failed to download due to database error.".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to start transcoder: {0}")]
    Spawn(#[source] io::Error),

    #[error("transcoder produced no audio for {0:?}")]
    ProcessWatchdogTimeout(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Rejections at the command boundary; `Display` is the reply text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Command {0} does not exist")]
    UnknownVerb(String),

    #[error("Permission denied")]
    PermissionDenied,
}

/// Top-level error surfaced by `runtime::run`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("audio output error: {0}")]
    Audio(#[from] rodio::StreamError),
}
