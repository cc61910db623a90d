use std::os::fd::RawFd;

use bytes::{Buf, Bytes};

/// A byte range of an open file eligible for zero-copy transfer.
///
/// The descriptor is borrowed, not owned: the caller keeps it open for as
/// long as the region is queued. `reader_index` advances as bytes reach
/// the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRegion {
    /// Borrowed descriptor of the source file.
    pub fd: RawFd,
    /// First byte not yet transferred.
    pub reader_index: u64,
    /// One past the last byte to transfer.
    pub end_index: u64,
}

impl FileRegion {
    /// Create a region covering `[reader_index, end_index)` of `fd`.
    ///
    /// # Panics (debug)
    /// Panics if `reader_index > end_index`.
    pub fn new(fd: RawFd, reader_index: u64, end_index: u64) -> Self {
        debug_assert!(
            reader_index <= end_index,
            "file region [{reader_index}, {end_index}) is inverted"
        );
        FileRegion {
            fd,
            reader_index,
            end_index,
        }
    }

    /// Bytes not yet transferred.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.end_index - self.reader_index
    }
}

/// A single queued write: an in-memory buffer or a file region.
///
/// Closed sum: the drain path dispatches a different syscall per variant
/// and the gather path packs only buffers.
#[derive(Debug, Clone)]
pub enum WriteItem {
    /// In-memory bytes. `Bytes::advance` is the read cursor; cloning the
    /// handle retains the backing storage.
    Buffer(Bytes),
    /// A `(descriptor, begin, end)` range for zero-copy transfer.
    File(FileRegion),
}

impl WriteItem {
    /// Bytes left to write for this item.
    pub fn remaining(&self) -> u64 {
        match self {
            WriteItem::Buffer(buf) => buf.len() as u64,
            WriteItem::File(region) => region.remaining(),
        }
    }

    /// Advance the read cursor by `n` bytes.
    pub(crate) fn advance(&mut self, n: u64) {
        match self {
            WriteItem::Buffer(buf) => buf.advance(n as usize),
            WriteItem::File(region) => {
                debug_assert!(
                    n <= region.remaining(),
                    "advance({n}) exceeds remaining {}",
                    region.remaining()
                );
                region.reader_index += n;
            }
        }
    }
}

impl From<Bytes> for WriteItem {
    fn from(buf: Bytes) -> Self {
        WriteItem::Buffer(buf)
    }
}

impl From<FileRegion> for WriteItem {
    fn from(region: FileRegion) -> Self {
        WriteItem::File(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_remaining_and_advance() {
        let mut item = WriteItem::from(Bytes::from_static(b"hello world"));
        assert_eq!(item.remaining(), 11);
        item.advance(6);
        assert_eq!(item.remaining(), 5);
        match &item {
            WriteItem::Buffer(buf) => assert_eq!(&buf[..], b"world"),
            WriteItem::File(_) => unreachable!(),
        }
    }

    #[test]
    fn file_region_remaining_and_advance() {
        let mut item = WriteItem::from(FileRegion::new(3, 100, 400));
        assert_eq!(item.remaining(), 300);
        item.advance(250);
        assert_eq!(item.remaining(), 50);
        match &item {
            WriteItem::File(region) => {
                assert_eq!(region.reader_index, 350);
                assert_eq!(region.end_index, 400);
            }
            WriteItem::Buffer(_) => unreachable!(),
        }
    }

    #[test]
    fn empty_file_region() {
        let region = FileRegion::new(1, 42, 42);
        assert_eq!(region.remaining(), 0);
    }
}
