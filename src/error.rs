use std::error::Error as StdError;

use thiserror::Error;

/// This crate's result type.
pub type Result<T> = std::result::Result<T, Error>;

/// This crate's error type.
///
/// Kept decoupled from `anyhow` so downstream consumers of the framework aren't forced to adopt
/// `anyhow` in their own public APIs. Variants line up with the error kinds the framework needs
/// to distinguish: configuration errors are reported synchronously to the attach request, fatal
/// extension errors detach the session, and the rest (ring underrun, parity failure, unsupported
/// mode) are handled internally by the orchestrator and never reach this type.
#[derive(Debug, Error)]
pub enum Error {
    /// Attach was requested for a name not present in the registry.
    #[error("unknown extension '{0}'")]
    UnknownExtension(String),

    /// Attach parameters failed validation (wrong channel count, bit depth, or malformed
    /// parameter map).
    #[error("invalid audio parameters: {0}")]
    InvalidAudioParams(String),

    /// A running extension's task returned an error other than a clean shutdown.
    #[error("extension task failed: {0}")]
    ExtensionTaskFailed(String),

    /// The ring buffer was asked to do something its invariants forbid (read past what's live,
    /// window past the live range, etc). Internal to the ring/demodulator; never surfaced to a
    /// client directly.
    #[error("pcm ring error: {0}")]
    Ring(#[from] crate::ring::RingError),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl Error {
    pub(crate) fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Message(format!("{err:#}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::Other(Box::new(err))
    }
}
