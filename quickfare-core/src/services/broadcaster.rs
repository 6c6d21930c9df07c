//! Notification broadcaster - balance change fan-out
//!
//! In-process tokio broadcast channel. Delivery is at-most-once: each
//! subscriber has a bounded queue and a subscriber that falls behind skips
//! the events it missed. Publishing never waits for a subscriber.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::domain::BalanceChangeEvent;

/// Default per-subscriber queue length
pub const DEFAULT_CAPACITY: usize = 64;

/// Fan-out of balance change events to live subscribers
pub struct NotificationBroadcaster {
    tx: broadcast::Sender<BalanceChangeEvent>,
}

impl Default for NotificationBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl NotificationBroadcaster {
    /// Create a broadcaster with the given per-subscriber queue length
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Deliver an event to every current subscriber
    ///
    /// Returns how many subscribers the event was queued for.
    pub fn publish(&self, event: BalanceChangeEvent) -> usize {
        let sequence_number = event.sequence_number;
        match self.tx.send(event) {
            Ok(receivers) => {
                debug!(sequence_number, receivers, "Published balance event");
                receivers
            }
            // No receivers is the normal idle state
            Err(_) => 0,
        }
    }

    /// Subscribe to events of every account
    pub fn subscribe(&self) -> BalanceSubscription {
        BalanceSubscription {
            rx: self.tx.subscribe(),
            handle: None,
            missed: 0,
        }
    }

    /// Subscribe to events of one account
    pub fn subscribe_to(&self, handle: impl Into<String>) -> BalanceSubscription {
        BalanceSubscription {
            rx: self.tx.subscribe(),
            handle: Some(handle.into()),
            missed: 0,
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A live subscription; dropping it unsubscribes
pub struct BalanceSubscription {
    rx: broadcast::Receiver<BalanceChangeEvent>,
    handle: Option<String>,
    missed: u64,
}

impl BalanceSubscription {
    /// Wait for the next matching event
    ///
    /// Returns `None` once the broadcaster is gone. Cancel-safe: dropping the
    /// future loses no event.
    pub async fn next_event(&mut self) -> Option<BalanceChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already queued
    pub fn try_next_event(&mut self) -> Option<BalanceChangeEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Account this subscription is filtered to, if any
    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    /// Events skipped so far because this subscriber fell behind
    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// Turn the subscription into a `Stream`
    pub fn into_stream(self) -> impl Stream<Item = BalanceChangeEvent> + Send + 'static {
        let handle = self.handle;
        BroadcastStream::new(self.rx).filter_map(move |item| match item {
            Ok(event) if handle.as_deref().map_or(true, |h| h == event.account_handle) => {
                Some(event)
            }
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "Balance subscriber lagged; events dropped");
                None
            }
        })
    }

    fn accepts(&self, event: &BalanceChangeEvent) -> bool {
        self.handle
            .as_deref()
            .map_or(true, |h| h == event.account_handle)
    }

    fn record_lag(&mut self, skipped: u64) {
        self.missed += skipped;
        warn!(
            handle = self.handle.as_deref().unwrap_or("*"),
            skipped, "Balance subscriber lagged; events dropped"
        );
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn event(handle: &str, balance: i64, sequence_number: u64) -> BalanceChangeEvent {
        BalanceChangeEvent {
            account_handle: handle.to_string(),
            new_balance: Decimal::from(balance),
            amount: Decimal::from(balance),
            sequence_number,
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let broadcaster = NotificationBroadcaster::default();
        assert_eq!(broadcaster.publish(event("alice", 1, 1)), 0);
    }

    #[tokio::test]
    async fn test_fan_out_to_all_subscribers() {
        let broadcaster = NotificationBroadcaster::default();
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        assert_eq!(broadcaster.publish(event("alice", 10, 1)), 2);

        assert_eq!(first.next_event().await.unwrap().sequence_number, 1);
        assert_eq!(second.next_event().await.unwrap().sequence_number, 1);
    }

    #[tokio::test]
    async fn test_filtered_subscription() {
        let broadcaster = NotificationBroadcaster::default();
        let mut alice = broadcaster.subscribe_to("alice");

        broadcaster.publish(event("bob", 5, 1));
        broadcaster.publish(event("alice", 10, 2));

        let received = alice.next_event().await.unwrap();
        assert_eq!(received.account_handle, "alice");
        assert_eq!(received.sequence_number, 2);
        assert!(alice.try_next_event().is_none());
    }

    #[tokio::test]
    async fn test_slow_subscriber_misses_events_without_blocking_publish() {
        let broadcaster = NotificationBroadcaster::new(2);
        let mut slow = broadcaster.subscribe();

        for seq in 1..=5 {
            broadcaster.publish(event("alice", seq as i64, seq));
        }

        // Only the newest two survive in the bounded queue
        let first = slow.next_event().await.unwrap();
        assert_eq!(first.sequence_number, 4);
        assert_eq!(slow.missed(), 3);
        assert_eq!(slow.next_event().await.unwrap().sequence_number, 5);
    }

    #[tokio::test]
    async fn test_dropping_subscription_unsubscribes() {
        let broadcaster = NotificationBroadcaster::default();
        let subscription = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);
        drop(subscription);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_ends_when_broadcaster_dropped() {
        let broadcaster = NotificationBroadcaster::default();
        let stream = broadcaster.subscribe_to("alice").into_stream();
        tokio::pin!(stream);

        broadcaster.publish(event("bob", 1, 1));
        broadcaster.publish(event("alice", 2, 2));
        drop(broadcaster);

        let collected: Vec<u64> = stream.map(|e| e.sequence_number).collect().await;
        assert_eq!(collected, vec![2]);
    }
}
