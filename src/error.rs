use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Errors delivered to write promises and returned by
/// [`WriteEngine::trigger`](crate::WriteEngine::trigger).
///
/// Cloneable: a single failure fans out to every still-pending promise,
/// so the underlying `io::Error` is shared behind an `Arc`.
#[derive(Debug, Clone, Error)]
pub enum WriteError {
    /// Syscall-level I/O failure (EPIPE, ECONNRESET, ...).
    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),
    /// The engine was shut down while the write was still queued.
    #[error("write engine closed")]
    Closed,
}

impl From<io::Error> for WriteError {
    fn from(e: io::Error) -> Self {
        WriteError::Io(Arc::new(e))
    }
}

/// Errors returned by [`WriteConfig::validate`](crate::WriteConfig::validate).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Watermark pair out of range.
    #[error("water mark: {0}")]
    WaterMark(String),
    /// Spin count out of range.
    #[error("spin count: {0}")]
    SpinCount(String),
}
