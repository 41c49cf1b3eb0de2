//! The corpus layer: queue entries, per-feedback queues, and the
//! global queue that schedules across them.

pub mod base;
pub mod entry;
pub mod feedback_queue;
pub mod global;

pub use base::{BaseQueue, QUEUE_MAP_SIZE};
pub use entry::{EntryHandle, QueueEntry};
pub use feedback_queue::FeedbackQueue;
pub use global::GlobalQueue;
