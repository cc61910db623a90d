//! Gather pass for vectored writes.
//!
//! Materialises up to the vector limit of in-memory buffers from the
//! flushed prefix of a [`PendingWrites`] queue into a pre-allocated iovec
//! array, pins each buffer's backing storage for the duration of the
//! syscall, invokes the caller-supplied syscall closure, then releases
//! the pins.

use std::io;

use bytes::Bytes;

use crate::item::WriteItem;
use crate::pending::{PendingWrites, SyscallResult};

/// Maximum iovec entries per vectored write (`IOV_MAX` on Linux).
pub const MAX_VECTOR_COUNT: usize = 1024;

/// Maximum total bytes per vectored write. The kernel reports progress as
/// a signed int; staying under `i32::MAX` keeps the accounting exact.
pub const MAX_VECTOR_BYTES: u64 = i32::MAX as u64;

/// Pre-allocated scratch for vectored writes: an iovec array plus a
/// parallel storage-retention array.
///
/// One arena is allocated per event loop and shared by every engine on
/// that loop. The loop is single-threaded and only one connection drains
/// at a time, so the arena is lent exclusively to whichever engine is
/// inside a `trigger` call.
pub struct IoVecArena {
    iovecs: Box<[libc::iovec]>,
    storage: Box<[Option<Bytes>]>,
    byte_limit: u64,
}

impl IoVecArena {
    /// Allocate an arena with the platform vector limits.
    pub fn new() -> Self {
        Self::with_limits(MAX_VECTOR_COUNT, MAX_VECTOR_BYTES)
    }

    /// Allocate an arena with explicit limits. Production code wants
    /// [`IoVecArena::new`]; tests shrink the limits to exercise the
    /// batch-boundary paths.
    pub fn with_limits(slots: usize, byte_limit: u64) -> Self {
        assert!(slots > 0, "arena needs at least one iovec slot");
        let iovecs = vec![
            libc::iovec {
                iov_base: std::ptr::null_mut(),
                iov_len: 0,
            };
            slots
        ]
        .into_boxed_slice();
        let storage = vec![None; slots].into_boxed_slice();
        IoVecArena {
            iovecs,
            storage,
            byte_limit,
        }
    }

    /// Number of iovec slots.
    pub fn capacity(&self) -> usize {
        self.iovecs.len()
    }
}

impl Default for IoVecArena {
    fn default() -> Self {
        Self::new()
    }
}

/// Pack the flushed buffer prefix into `arena`, invoke `op` over the
/// packed iovecs, and release the storage retentions.
///
/// Returns `(attempted, result)` where `attempted` counts the packed
/// items plus one when a limit cut the batch short of the flushed set.
/// The extra count makes a fully successful syscall still classify as
/// `WrittenPartially`, so the engine keeps draining. A file region ends
/// the batch without the extra count: it is the natural boundary and the
/// next drain dispatches it through the file path.
///
/// Retentions are released before an error propagates.
pub(crate) fn vector_write<F>(
    state: &PendingWrites,
    arena: &mut IoVecArena,
    op: F,
) -> io::Result<(usize, SyscallResult)>
where
    F: FnOnce(&[libc::iovec]) -> io::Result<SyscallResult>,
{
    let flushed = state.flushed_count();
    debug_assert!(flushed > 0, "vector write with no flushed items");

    let limit = arena.iovecs.len();
    let packable = flushed.min(limit);
    let mut hit_limit = flushed > limit;
    let mut used = 0;
    let mut to_write: u64 = 0;

    for i in 0..packable {
        match state.item(i) {
            WriteItem::File(_) => {
                debug_assert!(i != 0, "head of a vector write must be a buffer");
                hit_limit = false;
                break;
            }
            WriteItem::Buffer(buf) => {
                let remaining = buf.len() as u64;
                if used > 0 && arena.byte_limit - to_write < remaining {
                    hit_limit = true;
                    break;
                }
                // A lone oversized buffer is clamped to the byte limit;
                // the tail is picked up by the next drain.
                let len = remaining.min(arena.byte_limit) as usize;
                // Clone pins the refcounted backing storage until the
                // retention slot is cleared below.
                arena.storage[used] = Some(buf.clone());
                arena.iovecs[used] = libc::iovec {
                    iov_base: buf.as_ptr() as *mut libc::c_void,
                    iov_len: len,
                };
                to_write += len as u64;
                used += 1;
            }
        }
    }

    let result = op(&arena.iovecs[..used]);

    // Release every retention regardless of the syscall result.
    for slot in arena.storage[..used].iter_mut() {
        *slot = None;
    }

    Ok((used + hit_limit as usize, result?))
}
