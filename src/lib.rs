//! flowline — pending stream-write engine for non-blocking event loops.
//!
//! flowline sits between the layers that enqueue writes on a stream
//! socket (TCP or Unix domain) and the syscalls that transfer the bytes.
//! It batches heterogeneous write items (in-memory buffers and file
//! regions), picks the best syscall shape on every drain attempt
//! (contiguous write, vectored `writev`, zero-copy file transfer),
//! delivers per-write completion notifications in FIFO order even under
//! partial writes, and signals flow control through high/low watermarks.
//!
//! The engine performs no I/O of its own and owns no socket: the event
//! loop hands `trigger` one closure per syscall shape and the engine
//! classifies whatever they report.
//!
//! # Quick Start
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use bytes::Bytes;
//! use flowline::{IoVecArena, SyscallResult, WriteConfig, WriteEngine, WriteOutcome, WritePromise};
//!
//! // One arena per event loop, shared by every engine on that loop.
//! let arena = Rc::new(RefCell::new(IoVecArena::new()));
//! let mut engine = WriteEngine::new(&WriteConfig::default(), arena).unwrap();
//!
//! engine.add(
//!     Bytes::from_static(b"hello"),
//!     Some(WritePromise::new(|result| assert!(result.is_ok()))),
//! );
//! engine.mark_flush_checkpoint(None);
//!
//! // On a writability edge the loop drains with real syscalls; here the
//! // closures stand in for write(2) / writev(2) / sendfile(2).
//! let result = engine
//!     .trigger(
//!         |bytes| Ok(SyscallResult::Processed(bytes.len())),
//!         |iovecs| Ok(SyscallResult::Processed(iovecs.iter().map(|v| v.iov_len).sum())),
//!         |_fd, begin, end| Ok(SyscallResult::Processed((end - begin) as usize)),
//!     )
//!     .unwrap();
//! assert_eq!(result.outcome, WriteOutcome::WrittenCompletely);
//! assert!(engine.is_empty());
//! ```
//!
//! # Threading
//!
//! Engines are confined to the event-loop thread that owns them; only the
//! writability flag is shared, and reads of it are eventually consistent.
//!
//! # Platform
//!
//! Unix only: the gather path speaks `libc::iovec` and file regions carry
//! raw descriptors.

// ── Internal modules ────────────────────────────────────────────────────
pub(crate) mod gather;
pub(crate) mod pending;

// ── Public modules ──────────────────────────────────────────────────────
pub mod config;
pub mod engine;
pub mod error;
pub mod item;
pub mod metrics;
pub mod notify;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use config::{WaterMark, WriteConfig, WriteConfigBuilder};
pub use engine::{TriggerOutcome, WritabilityHandle, WriteEngine};
pub use error::{ConfigError, WriteError};
pub use gather::{IoVecArena, MAX_VECTOR_BYTES, MAX_VECTOR_COUNT};
pub use item::{FileRegion, WriteItem};
pub use notify::WritePromise;
pub use pending::{SyscallResult, WriteOutcome};
