use crate::models::QueueMessage;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Message as handed over by the bus: either already parsed or raw text
#[derive(Debug, Clone, PartialEq)]
pub enum RawMessage {
    Structured(Value),
    Text(String),
}

/// Stream of messages for one subscription
pub type Subscription = mpsc::Receiver<RawMessage>;

/// Outbound envelope as it goes on the wire
pub type OutboundMessage = QueueMessage<Value>;

#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn subscribe(&self, topic: &str, subscription: &str) -> Result<Subscription>;
    async fn publish(&self, topic: &str, message: OutboundMessage) -> Result<()>;
}

const SUBSCRIPTION_BUFFER: usize = 64;

/// In-process bus. Every subscription on a topic receives each message published to it.
#[derive(Default)]
pub struct InMemoryBus {
    subscriptions: Mutex<HashMap<String, Vec<(String, mpsc::Sender<RawMessage>)>>>,
    history: Mutex<HashMap<String, Vec<OutboundMessage>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a raw message to every subscription on `topic`. Returns the number reached.
    pub async fn send_raw(&self, topic: &str, message: RawMessage) -> usize {
        let senders: Vec<mpsc::Sender<RawMessage>> = self
            .subscriptions
            .lock()
            .map(|subs| {
                subs.get(topic)
                    .map(|list| list.iter().map(|(_, tx)| tx.clone()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default();

        let mut delivered = 0;
        for tx in senders {
            if tx.send(message.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Everything published to `topic` so far
    pub fn published(&self, topic: &str) -> Vec<OutboundMessage> {
        self.history
            .lock()
            .map(|h| h.get(topic).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn subscribe(&self, topic: &str, subscription: &str) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let mut subs = self
            .subscriptions
            .lock()
            .map_err(|_| anyhow!("subscription registry poisoned"))?;
        let list = subs.entry(topic.to_string()).or_default();
        // A re-subscription replaces the previous receiver
        list.retain(|(name, _)| name != subscription);
        list.push((subscription.to_string(), tx));
        tracing::info!("Subscribed '{}' to topic '{}'", subscription, topic);
        Ok(rx)
    }

    async fn publish(&self, topic: &str, message: OutboundMessage) -> Result<()> {
        let value = serde_json::to_value(&message)?;
        self.history
            .lock()
            .map_err(|_| anyhow!("publish history poisoned"))?
            .entry(topic.to_string())
            .or_default()
            .push(message);
        self.send_raw(topic, RawMessage::Structured(value)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outbound(id: &str) -> OutboundMessage {
        QueueMessage {
            message_id: id.to_string(),
            message_type: "osw-upload".to_string(),
            message: None,
            published_date: None,
            data: json!({"success": true}),
        }
    }

    #[tokio::test]
    async fn test_fan_out_to_subscriptions() {
        let bus = InMemoryBus::new();
        let mut a = bus.subscribe("results", "a").await.unwrap();
        let mut b = bus.subscribe("results", "b").await.unwrap();

        bus.publish("results", outbound("m1")).await.unwrap();

        for rx in [&mut a, &mut b] {
            match rx.recv().await.unwrap() {
                RawMessage::Structured(v) => assert_eq!(v["messageId"], "m1"),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(bus.published("results").len(), 1);
        assert!(bus.published("other").is_empty());
    }

    #[tokio::test]
    async fn test_send_raw_without_subscribers() {
        let bus = InMemoryBus::new();
        assert_eq!(bus.send_raw("nobody", RawMessage::Text("{}".into())).await, 0);

        let _rx = bus.subscribe("t", "s").await.unwrap();
        let _rx2 = bus.subscribe("t", "s").await.unwrap();
        assert_eq!(bus.send_raw("t", RawMessage::Text("{}".into())).await, 1);
    }
}
