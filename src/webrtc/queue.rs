//! Bounded drop-oldest send queue
//!
//! Each peer owns one of these between the broadcast fan-out and its sender
//! task. When the queue is full the oldest packet is displaced so fresh media
//! always wins; the overflow is a normal, counted event.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::media::MediaPacket;

/// Minimum queue depth required by the send path contract.
pub const SEND_QUEUE_CAPACITY: usize = 512;

pub struct SendQueue {
    inner: Mutex<VecDeque<MediaPacket>>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
}

impl SendQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue a packet, displacing the oldest entry when full. Returns
    /// `false` when a packet was displaced.
    pub fn push(&self, packet: MediaPacket) -> bool {
        let displaced = {
            let mut queue = self.inner.lock();
            let displaced = if queue.len() >= self.capacity {
                queue.pop_front();
                true
            } else {
                false
            };
            queue.push_back(packet);
            displaced
        };

        if displaced {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.notify.notify_one();
        !displaced
    }

    /// Dequeue one packet, waiting up to `timeout` for one to arrive.
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<MediaPacket> {
        if let Some(packet) = self.inner.lock().pop_front() {
            return Some(packet);
        }

        let notified = self.notify.notified();
        tokio::pin!(notified);

        // A push may have landed between the pop above and the listener
        // registration; the stored permit covers that, but re-check anyway.
        if let Some(packet) = self.inner.lock().pop_front() {
            return Some(packet);
        }

        match tokio::time::timeout(timeout, notified).await {
            Ok(()) => self.inner.lock().pop_front(),
            Err(_) => None,
        }
    }

    /// Wake a sleeping consumer without enqueueing, used on shutdown.
    pub fn wake(&self) {
        self.notify.notify_waiters();
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Packets displaced by the drop-oldest policy so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;
    use bytes::Bytes;

    fn packet(tag: u8) -> MediaPacket {
        MediaPacket {
            kind: MediaKind::Video,
            payload: Bytes::from(vec![tag]),
            timestamp: tag as u32,
            marker: false,
        }
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = SendQueue::new(4);
        queue.push(packet(1));
        queue.push(packet(2));

        let first = queue.pop_timeout(Duration::from_millis(10)).await.unwrap();
        let second = queue.pop_timeout(Duration::from_millis(10)).await.unwrap();
        assert_eq!(first.timestamp, 1);
        assert_eq!(second.timestamp, 2);
    }

    #[tokio::test]
    async fn test_drop_oldest_on_overflow() {
        let queue = SendQueue::new(2);
        assert!(queue.push(packet(1)));
        assert!(queue.push(packet(2)));
        assert!(!queue.push(packet(3)));

        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.len(), 2);

        // Oldest packet (1) was displaced; fresh data survives
        let first = queue.pop_timeout(Duration::from_millis(10)).await.unwrap();
        assert_eq!(first.timestamp, 2);
    }

    #[tokio::test]
    async fn test_pop_times_out_when_empty() {
        let queue = SendQueue::new(4);
        let got = queue.pop_timeout(Duration::from_millis(20)).await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_push_wakes_waiting_pop() {
        let queue = std::sync::Arc::new(SendQueue::new(4));
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop_timeout(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(packet(7));

        let got = consumer.await.unwrap();
        assert_eq!(got.unwrap().timestamp, 7);
    }
}
