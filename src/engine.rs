//! Drain engine for a connection's pending stream writes.
//!
//! [`WriteEngine`] sits between the layers that enqueue writes and the
//! syscalls that transfer bytes. It owns the pending-write queue, borrows
//! the loop-scoped iovec arena while draining, picks the best syscall
//! shape for the head of the flushed batch on every drain iteration, and
//! toggles writability across the configured watermarks.
//!
//! The engine performs no I/O itself: `trigger` is handed one closure per
//! syscall shape (contiguous write, vectored write, file-region transfer)
//! and classifies whatever they report. Syscall failures propagate out of
//! `trigger` with the queue intact; the caller decides whether to retry
//! on the next writability edge or tear the connection down with
//! [`WriteEngine::fail_all`].

use std::cell::RefCell;
use std::io;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;

use crate::config::{WaterMark, WriteConfig};
use crate::error::{ConfigError, WriteError};
use crate::gather::{IoVecArena, vector_write};
use crate::item::{FileRegion, WriteItem};
use crate::metrics;
use crate::notify::WritePromise;
use crate::pending::{PendingWrites, SyscallResult, WriteOutcome};

/// Result of one [`WriteEngine::trigger`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerOutcome {
    /// How the drain pass ended.
    pub outcome: WriteOutcome,
    /// True when the engine became writable again during this drain.
    pub writability_changed: bool,
}

/// Cross-thread view of an engine's writability flag.
///
/// Reads are only eventually consistent with the owning loop's mutations;
/// producers use it as a hint to pause, not as a synchronisation point.
#[derive(Clone)]
pub struct WritabilityHandle {
    flag: Arc<AtomicBool>,
}

impl WritabilityHandle {
    /// True while buffered bytes sit below the high watermark.
    pub fn is_writable(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// The syscall shape best suited to the head of the flushed batch.
///
/// Re-evaluated on every drain iteration: consuming the head can change
/// the shape mid-trigger, e.g. when a vectored batch ends right before a
/// file region.
enum DrainStep {
    /// Nothing flushed.
    Nothing,
    /// One contiguous buffer write. The clone pins the backing storage
    /// across the syscall.
    Single(Bytes),
    /// Gather as many flushed buffers as the limits allow.
    Vector,
    /// Zero-copy transfer of the head file region.
    File(FileRegion),
}

/// Pending stream-write engine for one connection.
///
/// Confined to its owning event-loop thread; only the writability flag is
/// shared. Destroyed after `fail_all(error, true)` has emptied the queue.
pub struct WriteEngine {
    state: PendingWrites,
    arena: Rc<RefCell<IoVecArena>>,
    water_mark: WaterMark,
    writable: Arc<AtomicBool>,
    spin_count: u32,
    closed: bool,
}

impl WriteEngine {
    /// Create an engine using the loop's shared iovec arena.
    ///
    /// The config is validated even when it came through
    /// [`WriteConfigBuilder`](crate::WriteConfigBuilder): the fields are
    /// public, so a hand-built config can carry out-of-range values.
    pub fn new(
        config: &WriteConfig,
        arena: Rc<RefCell<IoVecArena>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(WriteEngine {
            state: PendingWrites::new(),
            arena,
            water_mark: config.water_mark,
            writable: Arc::new(AtomicBool::new(true)),
            spin_count: config.spin_count,
            closed: false,
        })
    }

    /// True while buffered bytes sit below the high watermark. The only
    /// engine method callable from any thread.
    pub fn is_writable(&self) -> bool {
        self.writable.load(Ordering::Relaxed)
    }

    /// Shareable handle to the writability flag for off-loop observers.
    pub fn writability(&self) -> WritabilityHandle {
        WritabilityHandle {
            flag: self.writable.clone(),
        }
    }

    /// False once `fail_all(_, true)` has run.
    pub fn is_open(&self) -> bool {
        !self.closed
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// True when a flush checkpoint has marked items eligible for writing.
    pub fn is_flush_pending(&self) -> bool {
        self.state.is_flush_pending()
    }

    /// Bytes currently buffered across all queued items.
    pub fn buffered_bytes(&self) -> u64 {
        self.state.bytes()
    }

    /// Number of queued write items.
    pub fn pending_chunks(&self) -> usize {
        self.state.chunks()
    }

    /// Enqueue a write. Returns `false` exactly when this append pushed
    /// buffered bytes over the high watermark and flipped the engine to
    /// unwritable; the caller should stop producing until a later
    /// `trigger` reports the engine writable again.
    ///
    /// # Panics (debug)
    /// Panics if the engine is closed.
    pub fn add(&mut self, item: impl Into<WriteItem>, promise: Option<WritePromise>) -> bool {
        debug_assert!(!self.closed, "add on closed write engine");
        let item = item.into();
        let n = item.remaining();
        self.state.append(item, promise);
        metrics::BYTES_PENDING.add(n as i64);
        if self.state.bytes() > self.water_mark.high
            && self
                .writable
                .compare_exchange(true, false, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
        {
            metrics::WATERMARK_STALLS.increment();
            return false;
        }
        true
    }

    /// Move the flush mark to the tail of the queue, making everything
    /// queued so far eligible for the next drain.
    ///
    /// On an empty queue a supplied promise succeeds immediately. If the
    /// tail item already carries a promise, the new one is cascaded onto
    /// it and fires with the same outcome.
    pub fn mark_flush_checkpoint(&mut self, promise: Option<WritePromise>) {
        self.state.mark_flush_checkpoint(promise);
    }

    /// Drain flushed items through the supplied syscall closures.
    ///
    /// Each spin iteration re-selects the best syscall shape for the head
    /// of the flushed batch and classifies the closure's report via the
    /// queue's consumption rules. Partial progress keeps spinning up to
    /// the configured bound; any other outcome returns immediately. A
    /// syscall error propagates with the queue intact.
    ///
    /// Completion promises for fully written items fire synchronously, in
    /// append order, after all state mutations of their drain iteration
    /// and before `trigger` returns. A promise handler that fails the
    /// engine mid-batch can interleave failures with later completions;
    /// callers must not rely on cross-batch ordering in that case.
    pub fn trigger<S, V, F>(
        &mut self,
        mut single_op: S,
        mut vector_op: V,
        mut file_op: F,
    ) -> Result<TriggerOutcome, WriteError>
    where
        S: FnMut(&[u8]) -> io::Result<SyscallResult>,
        V: FnMut(&[libc::iovec]) -> io::Result<SyscallResult>,
        F: FnMut(RawFd, u64, u64) -> io::Result<SyscallResult>,
    {
        let was_writable = self.is_writable();
        for _ in 0..self.spin_count {
            if self.closed {
                return Ok(self.trigger_outcome(WriteOutcome::Closed, was_writable));
            }
            let outcome = match self.best_step() {
                DrainStep::Nothing => {
                    return Ok(self.trigger_outcome(WriteOutcome::NothingToBeWritten, was_writable));
                }
                DrainStep::Single(buf) => {
                    let result = single_op(&buf[..])?;
                    metrics::WRITES_SINGLE.increment();
                    self.account(1, result)
                }
                DrainStep::File(region) => {
                    let result = file_op(region.fd, region.reader_index, region.end_index)?;
                    metrics::WRITES_FILE.increment();
                    self.account(1, result)
                }
                DrainStep::Vector => {
                    let (attempted, result) = {
                        let mut arena = self.arena.borrow_mut();
                        vector_write(&self.state, &mut arena, &mut vector_op)?
                    };
                    metrics::WRITES_VECTOR.increment();
                    self.account(attempted, result)
                }
            };
            if outcome != WriteOutcome::WrittenPartially {
                return Ok(self.trigger_outcome(outcome, was_writable));
            }
        }
        // Spin bound exhausted; the event loop re-triggers on the next
        // writability edge.
        Ok(self.trigger_outcome(WriteOutcome::WrittenPartially, was_writable))
    }

    /// Fail every still-pending write with `error`, firing promises
    /// synchronously in queue order. With `close`, the engine transitions
    /// to its terminal closed state and accepts no further operations.
    ///
    /// # Panics (debug)
    /// Panics on a second close.
    pub fn fail_all(&mut self, error: WriteError, close: bool) {
        if close {
            debug_assert!(!self.closed, "double close of write engine");
            self.closed = true;
        }
        let pending_bytes = self.state.bytes();
        let batch = self.state.fail_all();
        debug_assert!(self.state.is_empty());
        metrics::BYTES_PENDING.add(-(pending_bytes as i64));
        metrics::WRITES_FAILED.add(batch.len() as u64);
        // Empty queue sits below any low watermark.
        self.writable.store(true, Ordering::Relaxed);
        batch.fail_all(&error);
    }

    fn best_step(&self) -> DrainStep {
        let flushed = self.state.flushed_count();
        if flushed == 0 {
            return DrainStep::Nothing;
        }
        match self.state.item(0) {
            WriteItem::File(region) => DrainStep::File(*region),
            WriteItem::Buffer(buf) => {
                if flushed >= 2 && matches!(self.state.item(1), WriteItem::Buffer(_)) {
                    DrainStep::Vector
                } else {
                    DrainStep::Single(buf.clone())
                }
            }
        }
    }

    /// Feed one syscall report into the queue, maintain the watermark
    /// flag, and fire the completions collected for this iteration.
    fn account(&mut self, item_count: usize, result: SyscallResult) -> WriteOutcome {
        let written = match result {
            SyscallResult::Processed(n) | SyscallResult::WouldBlock(n) => n,
        };
        let (batch, outcome) = self.state.did_write(item_count, result);
        metrics::BYTES_WRITTEN.add(written as u64);
        metrics::BYTES_PENDING.add(-(written as i64));
        if outcome == WriteOutcome::WouldBlock {
            metrics::WRITES_WOULD_BLOCK.increment();
        }
        if self.state.bytes() < self.water_mark.low {
            self.writable.store(true, Ordering::Relaxed);
        }
        // Promises fire only after all state mutations for this pass.
        batch.succeed_all();
        outcome
    }

    fn trigger_outcome(&self, outcome: WriteOutcome, was_writable: bool) -> TriggerOutcome {
        TriggerOutcome {
            outcome,
            writability_changed: !was_writable && self.is_writable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WriteConfigBuilder;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn engine() -> WriteEngine {
        WriteEngine::new(
            &WriteConfig::default(),
            Rc::new(RefCell::new(IoVecArena::new())),
        )
        .unwrap()
    }

    fn engine_with(config: WriteConfig) -> WriteEngine {
        WriteEngine::new(&config, Rc::new(RefCell::new(IoVecArena::new()))).unwrap()
    }

    #[test]
    fn invalid_config_rejected_at_construction() {
        let config = WriteConfig {
            spin_count: 0,
            ..WriteConfig::default()
        };
        let result = WriteEngine::new(&config, Rc::new(RefCell::new(IoVecArena::new())));
        assert!(result.is_err());
    }

    fn no_single(_: &[u8]) -> io::Result<SyscallResult> {
        panic!("single op not expected")
    }

    fn no_vector(_: &[libc::iovec]) -> io::Result<SyscallResult> {
        panic!("vector op not expected")
    }

    fn no_file(_: RawFd, _: u64, _: u64) -> io::Result<SyscallResult> {
        panic!("file op not expected")
    }

    #[test]
    fn empty_trigger_returns_nothing() {
        let mut engine = engine();
        let result = engine.trigger(no_single, no_vector, no_file).unwrap();
        assert_eq!(result.outcome, WriteOutcome::NothingToBeWritten);
        assert!(!result.writability_changed);
    }

    #[test]
    fn unflushed_items_are_not_written() {
        let mut engine = engine();
        engine.add(Bytes::from_static(b"queued"), None);
        let result = engine.trigger(no_single, no_vector, no_file).unwrap();
        assert_eq!(result.outcome, WriteOutcome::NothingToBeWritten);
        assert_eq!(engine.buffered_bytes(), 6);
    }

    #[test]
    fn single_buffer_takes_single_path() {
        let mut engine = engine();
        engine.add(Bytes::from_static(b"hello"), None);
        engine.mark_flush_checkpoint(None);

        let result = engine
            .trigger(
                |bytes| {
                    assert_eq!(bytes, b"hello");
                    Ok(SyscallResult::Processed(5))
                },
                no_vector,
                no_file,
            )
            .unwrap();
        assert_eq!(result.outcome, WriteOutcome::WrittenCompletely);
        assert!(engine.is_empty());
    }

    #[test]
    fn two_buffers_take_vector_path() {
        let mut engine = engine();
        engine.add(Bytes::from_static(b"ab"), None);
        engine.add(Bytes::from_static(b"cd"), None);
        engine.mark_flush_checkpoint(None);

        let result = engine
            .trigger(no_single, |iovecs| {
                Ok(SyscallResult::Processed(
                    iovecs.iter().map(|v| v.iov_len).sum(),
                ))
            }, no_file)
            .unwrap();
        assert_eq!(result.outcome, WriteOutcome::WrittenCompletely);
        assert!(engine.is_empty());
    }

    #[test]
    fn file_region_head_takes_file_path() {
        let mut engine = engine();
        engine.add(FileRegion::new(7, 100, 300), None);
        engine.add(Bytes::from_static(b"after"), None);
        engine.mark_flush_checkpoint(None);

        let result = engine
            .trigger(no_single, no_vector, |fd, begin, end| {
                assert_eq!((fd, begin, end), (7, 100, 300));
                Ok(SyscallResult::Processed(200))
            })
            .unwrap();
        // The file region completed; the trailing flushed buffer awaits
        // the next trigger.
        assert_eq!(result.outcome, WriteOutcome::WrittenCompletely);
        assert_eq!(engine.pending_chunks(), 1);
    }

    #[test]
    fn spin_continues_on_partial_progress() {
        let mut engine = engine();
        engine.add(Bytes::from_static(b"0123456789a"), None);
        engine.mark_flush_checkpoint(None);

        let mut calls = 0;
        let result = engine
            .trigger(
                |bytes| {
                    calls += 1;
                    Ok(SyscallResult::Processed(bytes.len().min(4)))
                },
                no_vector,
                no_file,
            )
            .unwrap();
        assert_eq!(result.outcome, WriteOutcome::WrittenCompletely);
        assert_eq!(calls, 3); // 4 + 4 + 3 bytes
        assert!(engine.is_empty());
    }

    #[test]
    fn spin_bound_exhaustion_reports_partial() {
        let mut engine = engine_with(WriteConfigBuilder::new().spin_count(2).build().unwrap());
        engine.add(Bytes::from_static(b"0123456789"), None);
        engine.mark_flush_checkpoint(None);

        let result = engine
            .trigger(
                |_| Ok(SyscallResult::Processed(1)),
                no_vector,
                no_file,
            )
            .unwrap();
        assert_eq!(result.outcome, WriteOutcome::WrittenPartially);
        assert_eq!(engine.buffered_bytes(), 8);
    }

    #[test]
    fn syscall_error_propagates_with_queue_intact() {
        let mut engine = engine();
        engine.add(Bytes::from_static(b"hello"), None);
        engine.mark_flush_checkpoint(None);

        let err = engine
            .trigger(
                |_| Err(io::Error::from(io::ErrorKind::BrokenPipe)),
                no_vector,
                no_file,
            )
            .unwrap_err();
        assert!(matches!(err, WriteError::Io(_)));
        assert_eq!(engine.buffered_bytes(), 5);
        assert_eq!(engine.pending_chunks(), 1);
        assert!(engine.is_flush_pending());
    }

    #[test]
    fn add_crossing_high_watermark_flips_once() {
        let mut engine = engine_with(WriteConfigBuilder::new().water_mark(8, 16).build().unwrap());
        assert!(engine.add(Bytes::from(vec![0u8; 10]), None));
        assert!(engine.is_writable());
        // This append crosses the high mark: flag flips, add reports it.
        assert!(!engine.add(Bytes::from(vec![0u8; 10]), None));
        assert!(!engine.is_writable());
        // Further appends see the flag already down and report writable.
        assert!(engine.add(Bytes::from(vec![0u8; 10]), None));
        assert!(!engine.is_writable());
    }

    #[test]
    fn trigger_on_closed_engine_returns_closed() {
        let mut engine = engine();
        engine.add(Bytes::from_static(b"doomed"), None);
        engine.fail_all(WriteError::Closed, true);
        assert!(!engine.is_open());

        let result = engine.trigger(no_single, no_vector, no_file).unwrap();
        assert_eq!(result.outcome, WriteOutcome::Closed);
    }

    #[test]
    fn fail_all_without_close_leaves_engine_open_and_writable() {
        let mut engine = engine_with(WriteConfigBuilder::new().water_mark(8, 16).build().unwrap());
        engine.add(Bytes::from(vec![0u8; 32]), None);
        assert!(!engine.is_writable());

        engine.fail_all(WriteError::Closed, false);
        assert!(engine.is_open());
        assert!(engine.is_empty());
        assert!(engine.is_writable());
        assert_eq!(engine.buffered_bytes(), 0);
    }

    #[test]
    fn writability_handle_tracks_flag_cross_thread() {
        let mut engine = engine_with(WriteConfigBuilder::new().water_mark(8, 16).build().unwrap());
        let handle = engine.writability();
        assert!(handle.is_writable());
        engine.add(Bytes::from(vec![0u8; 32]), None);
        assert!(!handle.is_writable());
    }
}
