//! Engine event bus.
//!
//! Single fan-in channel: the three inbound streams converge into one
//! receiver drained by the application loop, preserving arrival order
//! per source and stamping every event with the bus receive time.

use crate::error::{FeedError, FeedResult};
use std::sync::Arc;
use tgate_core::{BrokerTick, Clock, ExchangePrice, Stamped, WebhookEvent};
use tokio::sync::mpsc;

/// A stamped event on the bus.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Webhook(Stamped<WebhookEvent>),
    Tick(Stamped<BrokerTick>),
    Price(Stamped<ExchangePrice>),
}

impl FeedEvent {
    /// Bus receive timestamp (Unix ms).
    pub fn received_at_ms(&self) -> i64 {
        match self {
            Self::Webhook(e) => e.received_at_ms,
            Self::Tick(e) => e.received_at_ms,
            Self::Price(e) => e.received_at_ms,
        }
    }
}

/// Producer handle for the engine event bus.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<FeedEvent>,
    clock: Arc<dyn Clock>,
}

impl EventBus {
    /// Create a bus and its single consumer end.
    pub fn channel(capacity: usize, clock: Arc<dyn Clock>) -> (Self, mpsc::Receiver<FeedEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, clock }, rx)
    }

    async fn send(&self, event: FeedEvent) -> FeedResult<()> {
        self.tx.send(event).await.map_err(|_| FeedError::BusClosed)
    }

    /// Publish a webhook signal, stamped with the bus receive time.
    pub async fn publish_webhook(&self, event: WebhookEvent) -> FeedResult<()> {
        let stamped = Stamped::new(event, self.clock.now_ms());
        self.send(FeedEvent::Webhook(stamped)).await
    }

    /// Publish a brokerage tick.
    pub async fn publish_tick(&self, event: BrokerTick) -> FeedResult<()> {
        let stamped = Stamped::new(event, self.clock.now_ms());
        self.send(FeedEvent::Tick(stamped)).await
    }

    /// Publish an exchange price update.
    pub async fn publish_price(&self, event: ExchangePrice) -> FeedResult<()> {
        let stamped = Stamped::new(event, self.clock.now_ms());
        self.send(FeedEvent::Price(stamped)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tgate_core::{ManualClock, Price};

    #[tokio::test]
    async fn test_events_are_stamped_and_ordered() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (bus, mut rx) = EventBus::channel(16, clock.clone());

        bus.publish_tick(BrokerTick {
            token: 1,
            last_price: Price::new(dec!(100)),
        })
        .await
        .unwrap();

        clock.advance(5);
        bus.publish_price(ExchangePrice {
            symbol: "BTCUSDT".to_string(),
            price: Price::new(dec!(64000)),
            timestamp_ms: None,
        })
        .await
        .unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.received_at_ms(), 1_000);
        assert_eq!(second.received_at_ms(), 1_005);
        assert!(matches!(first, FeedEvent::Tick(_)));
        assert!(matches!(second, FeedEvent::Price(_)));
    }

    #[tokio::test]
    async fn test_closed_bus_errors() {
        let clock = Arc::new(ManualClock::new(0));
        let (bus, rx) = EventBus::channel(1, clock);
        drop(rx);
        let err = bus
            .publish_tick(BrokerTick {
                token: 1,
                last_price: Price::new(dec!(1)),
            })
            .await;
        assert!(err.is_err());
    }
}
