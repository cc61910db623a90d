//! Queue state for a connection's pending writes.
//!
//! [`PendingWrites`] is a pure data structure: an ordered queue of write
//! items with a movable flush mark, an aggregate byte count, and an
//! optional completion promise per item. It performs no I/O; the engine
//! feeds syscall results back through [`PendingWrites::did_write`].
//!
//! Invariants:
//! - `bytes` equals the sum of `remaining()` across all queued items.
//! - The flush mark, when set, indexes into `[0, len)`; it is never set
//!   while the queue is empty.
//! - The head item always has `remaining() > 0`: fully consumed items are
//!   removed atomically with the capture of their promise.

use std::collections::VecDeque;

use crate::item::WriteItem;
use crate::notify::{CompletionBatch, WritePromise};

/// Return shape of the caller-supplied syscall closures.
///
/// A non-blocking socket either transfers `n >= 0` bytes or hits
/// EWOULDBLOCK after `n` bytes (`n` may be 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallResult {
    /// The syscall transferred `n` bytes.
    Processed(usize),
    /// The socket would block; `n` bytes were transferred first.
    WouldBlock(usize),
}

/// Categorical result of one drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Every attempted item was written in full.
    WrittenCompletely,
    /// Some progress was made but attempted items remain.
    WrittenPartially,
    /// No flushed items; no syscall was attempted.
    NothingToBeWritten,
    /// The socket would block before any byte moved.
    WouldBlock,
    /// The engine is closed; no syscall was attempted.
    Closed,
}

/// One queued write plus its optional completion promise.
pub(crate) struct PendingWrite {
    pub(crate) item: WriteItem,
    pub(crate) promise: Option<WritePromise>,
}

/// Ordered queue of pending writes with a movable flush mark.
pub(crate) struct PendingWrites {
    queue: VecDeque<PendingWrite>,
    bytes: u64,
    /// Index of the last item included in the current flush batch. Items
    /// up to and including this index are eligible to be written now.
    flush_mark: Option<usize>,
}

impl PendingWrites {
    pub(crate) fn new() -> Self {
        PendingWrites {
            queue: VecDeque::new(),
            bytes: 0,
            flush_mark: None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Count of items currently queued.
    pub(crate) fn chunks(&self) -> usize {
        self.queue.len()
    }

    /// Sum of remaining bytes across all queued items.
    pub(crate) fn bytes(&self) -> u64 {
        self.bytes
    }

    pub(crate) fn is_flush_pending(&self) -> bool {
        self.flush_mark.is_some()
    }

    /// Items eligible to be written now.
    pub(crate) fn flushed_count(&self) -> usize {
        self.flush_mark.map_or(0, |mark| mark + 1)
    }

    /// Read-only indexed access for the gather path.
    pub(crate) fn item(&self, index: usize) -> &WriteItem {
        &self.queue[index].item
    }

    /// Enqueue an item at the tail. Never touches the flush mark.
    pub(crate) fn append(&mut self, item: WriteItem, promise: Option<WritePromise>) {
        debug_assert!(item.remaining() > 0, "appended item has no bytes");
        self.bytes += item.remaining();
        self.queue.push_back(PendingWrite { item, promise });
    }

    /// Move the flush mark to the current last item.
    ///
    /// On an empty queue a supplied promise is fired with success
    /// immediately and no mark is set. On a non-empty queue the promise
    /// (if any) lands on the last item: cascaded onto an existing promise,
    /// or installed directly. A flush promise reports when all bytes up to
    /// the mark have been delivered, which is exactly the last-in-batch
    /// item completing.
    pub(crate) fn mark_flush_checkpoint(&mut self, promise: Option<WritePromise>) {
        if self.queue.is_empty() {
            debug_assert!(self.flush_mark.is_none());
            if let Some(p) = promise {
                p.succeed();
            }
            return;
        }
        let last = self.queue.len() - 1;
        self.flush_mark = Some(last);
        if let Some(p) = promise {
            let slot = &mut self.queue[last].promise;
            match slot {
                Some(existing) => existing.cascade(p),
                None => *slot = Some(p),
            }
        }
    }

    /// Remove the head item and return its promise for the caller to
    /// signal. The flush mark, if pointing at the head, is cleared;
    /// otherwise it shifts down by one.
    fn fully_written_first(&mut self) -> Option<WritePromise> {
        debug_assert!(!self.queue.is_empty(), "fully_written_first on empty queue");
        let write = self.queue.pop_front()?;
        self.bytes -= write.item.remaining();
        self.flush_mark = match self.flush_mark {
            Some(0) | None => None,
            Some(mark) => Some(mark - 1),
        };
        write.promise
    }

    /// Advance the head item's read cursor by `n` bytes. The head stays at
    /// index 0 and the flush mark is unchanged.
    fn partially_written_first(&mut self, n: u64) {
        debug_assert!(!self.queue.is_empty(), "partially_written_first on empty queue");
        let head = &mut self.queue[0];
        debug_assert!(
            n < head.item.remaining(),
            "partial write of {n} covers all {} remaining bytes",
            head.item.remaining()
        );
        head.item.advance(n);
        self.bytes -= n;
    }

    /// Consume the result of one syscall that attempted the leading
    /// `item_count` items.
    ///
    /// Walks the attempted items front to back, removing each fully
    /// covered item (collecting its promise) and partially advancing the
    /// first item the byte count does not cover. An attempt that covered
    /// fewer than `item_count` items classifies as `WrittenPartially` even
    /// when the syscall itself reported full success; the extra attempted
    /// item simply advances by zero bytes.
    ///
    /// `WouldBlock(n > 0)` consumes identically to `Processed(n)`;
    /// `WouldBlock(0)` returns immediately with no state change.
    pub(crate) fn did_write(
        &mut self,
        item_count: usize,
        result: SyscallResult,
    ) -> (CompletionBatch, WriteOutcome) {
        let mut batch = CompletionBatch::default();
        let written = match result {
            SyscallResult::WouldBlock(0) => return (batch, WriteOutcome::WouldBlock),
            SyscallResult::Processed(n) | SyscallResult::WouldBlock(n) => n as u64,
        };
        let mut unaccounted = written;
        for _ in 0..item_count {
            debug_assert!(!self.queue.is_empty(), "consumed past the end of the queue");
            if self.queue.is_empty() {
                break;
            }
            let head_remaining = self.queue[0].item.remaining();
            if unaccounted >= head_remaining {
                unaccounted -= head_remaining;
                batch.push(self.fully_written_first());
            } else {
                self.partially_written_first(unaccounted);
                return (batch, WriteOutcome::WrittenPartially);
            }
        }
        debug_assert!(
            unaccounted == 0,
            "syscall reported {unaccounted} more bytes than were attempted"
        );
        (batch, WriteOutcome::WrittenCompletely)
    }

    /// Drain the queue head to tail, collecting every promise. The caller
    /// fires the returned batch with the failure.
    pub(crate) fn fail_all(&mut self) -> CompletionBatch {
        let mut batch = CompletionBatch::default();
        while !self.queue.is_empty() {
            batch.push(self.fully_written_first());
        }
        debug_assert!(self.bytes == 0, "bytes {} left after drain", self.bytes);
        debug_assert!(self.flush_mark.is_none());
        batch
    }
}
