use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Publishes domain events for the notification side. Delivery is
/// best-effort: callers publish after commit and never fail a booking
/// because the broker is down.
#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                debug!(topic, key, partition = delivery.partition, offset = delivery.offset, "event delivered");
                Ok(())
            }
            Err((e, _msg)) => {
                error!(topic, key, error = %e, "failed to deliver event");
                Err(e)
            }
        }
    }

    /// Serializes `event` as JSON and publishes it, swallowing failures.
    pub async fn emit<T: Serialize>(&self, topic: &str, key: &str, event: &T) {
        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(e) => {
                warn!(topic, error = %e, "failed to serialize event");
                return;
            }
        };
        let _ = self.publish(topic, key, &payload).await;
    }
}
