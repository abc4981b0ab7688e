//! Batch queue of document-to-video jobs
//!
//! Items move through `Pending → Processing → Done | Error` and only a sweep
//! moves an item out of Pending. A failed item never stops the sweep.

pub mod batch;
pub mod item;

pub use batch::{BatchQueue, QueueCounts, SweepEvent, SweepObserver, SweepSummary};
pub use item::{ItemId, ItemStatus, QueueItem};
