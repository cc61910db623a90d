//! Engine metrics.
//!
//! Process-wide counters for drained bytes, syscall mix, and flow-control
//! events. Exposed through any metriken-compatible exposition layer.

use metriken::{Counter, Gauge, metric};

#[metric(
    name = "flowline/bytes/written",
    description = "Total bytes handed to the kernel"
)]
pub static BYTES_WRITTEN: Counter = Counter::new();

#[metric(
    name = "flowline/bytes/pending",
    description = "Bytes currently buffered across all engines"
)]
pub static BYTES_PENDING: Gauge = Gauge::new();

#[metric(
    name = "flowline/writes/single",
    description = "Single-buffer write syscalls issued"
)]
pub static WRITES_SINGLE: Counter = Counter::new();

#[metric(
    name = "flowline/writes/vector",
    description = "Vectored write syscalls issued"
)]
pub static WRITES_VECTOR: Counter = Counter::new();

#[metric(
    name = "flowline/writes/file",
    description = "File-region transfer syscalls issued"
)]
pub static WRITES_FILE: Counter = Counter::new();

#[metric(
    name = "flowline/writes/would_block",
    description = "Drain passes that hit EWOULDBLOCK with no progress"
)]
pub static WRITES_WOULD_BLOCK: Counter = Counter::new();

#[metric(
    name = "flowline/writes/failed",
    description = "Queued writes failed via fail_all"
)]
pub static WRITES_FAILED: Counter = Counter::new();

#[metric(
    name = "flowline/watermark/stalls",
    description = "Appends that pushed buffered bytes over the high watermark"
)]
pub static WATERMARK_STALLS: Counter = Counter::new();
