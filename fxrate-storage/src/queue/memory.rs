//! In-process implementation of [`RefreshQueue`].

use super::{QueueMessage, ReceiptHandle, RefreshQueue};
use async_trait::async_trait;
use fxrate_core::{QueueError, RefreshJob};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

/// Upper bound on one sleep inside a long poll, so hidden messages whose
/// visibility lapses are picked up without a send.
const POLL_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
struct Stored {
    body: String,
    receive_count: u32,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Stored>,
    in_flight: HashMap<ReceiptHandle, (Stored, Instant)>,
}

impl QueueState {
    /// Move messages whose visibility timeout lapsed back to the ready list.
    fn restore_expired(&mut self, now: Instant) {
        let expired: Vec<ReceiptHandle> = self
            .in_flight
            .iter()
            .filter(|(_, (_, visible_at))| *visible_at <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();
        for receipt in expired {
            if let Some((stored, _)) = self.in_flight.remove(&receipt) {
                self.ready.push_back(stored);
            }
        }
    }
}

/// FIFO queue with visibility timeout and long polling.
#[derive(Debug)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    visibility_timeout: Duration,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl InMemoryQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            visibility_timeout,
        }
    }

    /// Messages waiting for delivery (excludes received, unacknowledged ones).
    pub async fn ready_len(&self) -> usize {
        let mut state = self.state.lock().await;
        state.restore_expired(Instant::now());
        state.ready.len()
    }

    /// Received messages not yet acknowledged nor expired.
    pub async fn in_flight_len(&self) -> usize {
        let mut state = self.state.lock().await;
        state.restore_expired(Instant::now());
        state.in_flight.len()
    }

    /// Bodies of all ready messages, in delivery order.
    pub async fn ready_bodies(&self) -> Vec<String> {
        let mut state = self.state.lock().await;
        state.restore_expired(Instant::now());
        state.ready.iter().map(|s| s.body.clone()).collect()
    }

    async fn try_take(&self, max_messages: usize) -> Vec<QueueMessage> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.restore_expired(now);

        let mut batch = Vec::new();
        while batch.len() < max_messages {
            let Some(mut stored) = state.ready.pop_front() else {
                break;
            };
            stored.receive_count += 1;
            let receipt = uuid::Uuid::now_v7().to_string();
            batch.push(QueueMessage {
                receipt: receipt.clone(),
                body: stored.body.clone(),
                receive_count: stored.receive_count,
            });
            state
                .in_flight
                .insert(receipt, (stored, now + self.visibility_timeout));
        }
        batch
    }
}

#[async_trait]
impl RefreshQueue for InMemoryQueue {
    async fn send(&self, job: &RefreshJob) -> Result<(), QueueError> {
        self.state.lock().await.ready.push_back(Stored {
            body: job.to_payload(),
            receive_count: 0,
        });
        self.notify.notify_one();
        Ok(())
    }

    async fn receive_batch(
        &self,
        max_messages: usize,
        wait_time: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        if max_messages == 0 {
            return Ok(Vec::new());
        }
        let deadline = Instant::now() + wait_time;
        loop {
            let batch = self.try_take(max_messages).await;
            if !batch.is_empty() {
                return Ok(batch);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(batch);
            }
            let slice = (deadline - now).min(POLL_SLICE);
            let _ = tokio::time::timeout(slice, self.notify.notified()).await;
        }
    }

    async fn ack(&self, receipts: &[ReceiptHandle]) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        for receipt in receipts {
            // Unknown receipts were already acknowledged or have been
            // redelivered under a new handle.
            state.in_flight.remove(receipt);
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use fxrate_core::Pair;
    use std::sync::Arc;

    fn job(base: &str, quote: &str) -> RefreshJob {
        RefreshJob::new(Pair::new(base, quote))
    }

    #[tokio::test]
    async fn test_send_then_receive_in_order() {
        let queue = InMemoryQueue::default();
        queue.send(&job("usd", "eur")).await.unwrap();
        queue.send(&job("gbp", "jpy")).await.unwrap();

        let batch = queue.receive_batch(10, Duration::ZERO).await.unwrap();
        let bodies: Vec<_> = batch.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["USD_EUR", "GBP_JPY"]);
        assert!(batch.iter().all(|m| m.receive_count == 1));
        assert_eq!(queue.ready_len().await, 0);
        assert_eq!(queue.in_flight_len().await, 2);
    }

    #[tokio::test]
    async fn test_receive_respects_max_messages() {
        let queue = InMemoryQueue::default();
        for code in ["AAA", "BBB", "CCC"] {
            queue.send(&job(code, "USD")).await.unwrap();
        }
        let batch = queue.receive_batch(2, Duration::ZERO).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(queue.ready_len().await, 1);
    }

    #[tokio::test]
    async fn test_ack_removes_messages() {
        let queue = InMemoryQueue::default();
        queue.send(&job("usd", "eur")).await.unwrap();
        let batch = queue.receive_batch(10, Duration::ZERO).await.unwrap();
        let receipts: Vec<_> = batch.into_iter().map(|m| m.receipt).collect();

        queue.ack(&receipts).await.unwrap();
        assert_eq!(queue.in_flight_len().await, 0);
        assert_eq!(queue.ready_len().await, 0);
        // acking twice is harmless
        queue.ack(&receipts).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unacked_message_is_redelivered_after_visibility_timeout() {
        let queue = InMemoryQueue::new(Duration::from_secs(30));
        queue.send(&job("usd", "eur")).await.unwrap();

        let first = queue.receive_batch(10, Duration::ZERO).await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(queue
            .receive_batch(10, Duration::ZERO)
            .await
            .unwrap()
            .is_empty());

        tokio::time::advance(Duration::from_secs(30)).await;
        let second = queue.receive_batch(10, Duration::ZERO).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].body, "USD_EUR");
        assert_eq!(second[0].receive_count, 2);
        assert_ne!(second[0].receipt, first[0].receipt);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_poll_times_out_empty() {
        let queue = InMemoryQueue::default();
        let started = Instant::now();
        let batch = queue
            .receive_batch(10, Duration::from_secs(20))
            .await
            .unwrap();
        assert!(batch.is_empty());
        assert!(started.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_long_poll_wakes_on_send() {
        let queue = Arc::new(InMemoryQueue::default());
        let receiver = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.receive_batch(10, Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.send(&job("usd", "eur")).await.unwrap();

        let batch = receiver.await.unwrap().unwrap();
        assert_eq!(batch.len(), 1);
    }
}
