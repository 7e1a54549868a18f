//! Refresh queue collaborator.
//!
//! At-least-once delivery with visibility-timeout semantics: a received
//! message is hidden until it is acknowledged or its visibility timeout
//! lapses, after which it is delivered again.

pub mod memory;

use async_trait::async_trait;
use fxrate_core::{QueueError, RefreshJob};
use std::time::Duration;

pub use memory::InMemoryQueue;

/// Opaque handle returned with a received message and used to acknowledge it.
pub type ReceiptHandle = String;

/// A message received from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub receipt: ReceiptHandle,
    pub body: String,
    /// How many times this message has been received, including this one.
    pub receive_count: u32,
}

/// Queue backend carrying refresh jobs.
#[async_trait]
pub trait RefreshQueue: Send + Sync {
    /// Publish a refresh job.
    async fn send(&self, job: &RefreshJob) -> Result<(), QueueError>;

    /// Receive up to `max_messages`, waiting at most `wait_time` for at least
    /// one to become available. Returns an empty batch on timeout.
    async fn receive_batch(
        &self,
        max_messages: usize,
        wait_time: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError>;

    /// Permanently remove acknowledged messages.
    async fn ack(&self, receipts: &[ReceiptHandle]) -> Result<(), QueueError>;
}
