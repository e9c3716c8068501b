//! Kafka producer for interaction events
//!
//! Features:
//! - Idempotent production for exactly-once semantics
//! - Automatic batching and compression
//! - Backpressure handling
//! - Metrics and tracing
//! - Graceful shutdown with flush

use crate::config::KafkaConfig;
use crate::error::{Error, Result};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Kafka producer with batching and reliability features
#[derive(Clone)]
pub struct KafkaProducer {
    producer: Arc<FutureProducer>,
    metrics: Arc<KafkaProducerMetrics>,
    enabled: bool,
    /// How long we'll wait for a send to complete before timing out
    delivery_timeout: Duration,
}

/// Producer metrics
struct KafkaProducerMetrics {
    messages_sent: AtomicU64,
    messages_failed: AtomicU64,
    bytes_sent: AtomicU64,
}

impl KafkaProducerMetrics {
    fn new() -> Self {
        Self {
            messages_sent: AtomicU64::new(0),
            messages_failed: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
        }
    }
}

impl KafkaProducer {
    /// Create a new Kafka producer from configuration
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        if !config.enabled {
            info!("Kafka is disabled, creating no-op producer");
            return Ok(Self::noop());
        }

        info!("Creating Kafka producer...");
        debug!("Kafka brokers: {}", config.brokers);

        // Build client config with additional resilience settings
        let mut cfg = ClientConfig::new();
        cfg.set("bootstrap.servers", &config.brokers)
            .set("client.id", "pulsefeed-engine")
            // Reliability
            .set("acks", &config.producer.acks)
            .set("enable.idempotence", config.producer.idempotent.to_string())
            .set("max.in.flight.requests.per.connection", "5")
            .set("retries", config.producer.retries.to_string())
            .set("retry.backoff.ms", "100")
            .set(
                "reconnect.backoff.ms",
                config.producer.reconnect_backoff_ms.to_string(),
            )
            .set(
                "reconnect.backoff.max.ms",
                config.producer.reconnect_backoff_max_ms.to_string(),
            )
            // Batching
            .set("batch.size", config.producer.batch_size.to_string())
            .set("linger.ms", config.producer.linger.as_millis().to_string())
            // Compression
            .set("compression.type", &config.producer.compression)
            // Timeouts
            .set(
                "message.timeout.ms",
                config.producer.message_timeout.as_millis().to_string(),
            )
            .set(
                "delivery.timeout.ms",
                config.producer.delivery_timeout.as_millis().to_string(),
            )
            .set("request.timeout.ms", "30000")
            // Message size
            .set(
                "message.max.bytes",
                config.producer.max_message_bytes.to_string(),
            )
            // Statistics (for metrics)
            .set("statistics.interval.ms", "60000");

        // Enable librdkafka debug categories if requested (useful for diagnosing transport failures)
        if let Some(debug) = &config.producer.rdkafka_debug {
            cfg.set("debug", debug);
        }

        let producer: FutureProducer = cfg.create().map_err(|e| Error::Kafka {
            message: format!("Failed to create producer: {}", e).into(),
            source: Some(e),
        })?;

        info!("Kafka producer created successfully");

        Ok(Self {
            producer: Arc::new(producer),
            metrics: Arc::new(KafkaProducerMetrics::new()),
            enabled: true,
            delivery_timeout: config.producer.delivery_timeout,
        })
    }

    /// Create a no-op producer (when Kafka is disabled)
    pub fn noop() -> Self {
        Self {
            producer: Arc::new(
                ClientConfig::new()
                    .set("bootstrap.servers", "localhost:9092")
                    .create()
                    .expect("Failed to create dummy producer"),
            ),
            metrics: Arc::new(KafkaProducerMetrics::new()),
            enabled: false,
            delivery_timeout: Duration::from_secs(5),
        }
    }

    /// Send an event to Kafka
    #[instrument(skip(self, event), fields(topic = topic, key = key))]
    pub async fn send_event<T: Serialize + std::fmt::Debug>(
        &self,
        topic: &str,
        key: &str,
        event: &T,
    ) -> Result<()> {
        if !self.enabled {
            debug!("Kafka disabled, skipping event: {:?}", event);
            return Ok(());
        }

        let payload = serde_json::to_string(event)?;
        let payload_len = payload.len();

        debug!("Sending event to topic '{}' with key '{}'", topic, key);

        let record = FutureRecord::to(topic).key(key).payload(&payload);

        match self
            .producer
            .send(record, Timeout::After(self.delivery_timeout))
            .await
        {
            Ok((partition, offset)) => {
                debug!(
                    "Message delivered to partition {} at offset {}",
                    partition, offset
                );
                self.metrics.messages_sent.fetch_add(1, Ordering::Relaxed);
                self.metrics
                    .bytes_sent
                    .fetch_add(payload_len as u64, Ordering::Relaxed);
                Ok(())
            }
            Err((err, _)) => {
                self.metrics.messages_failed.fetch_add(1, Ordering::Relaxed);
                error!("Failed to deliver message: {:?}", err);
                Err(Error::Kafka {
                    message: format!("Failed to send message: {}", err).into(),
                    source: Some(err),
                })
            }
        }
    }

    /// Flush pending messages
    pub fn flush(&self, timeout: Duration) {
        if !self.enabled {
            return;
        }

        info!("Flushing Kafka producer...");
        self.producer.flush(Timeout::After(timeout)).ok();
        info!("Kafka producer flushed");
    }

    /// Get producer statistics
    pub fn stats(&self) -> ProducerStats {
        ProducerStats {
            messages_sent: self.metrics.messages_sent.load(Ordering::Relaxed),
            messages_failed: self.metrics.messages_failed.load(Ordering::Relaxed),
            bytes_sent: self.metrics.bytes_sent.load(Ordering::Relaxed),
            in_flight: self.producer.in_flight_count() as u64,
        }
    }

    /// Check if producer is healthy
    pub fn is_healthy(&self) -> bool {
        if !self.enabled {
            return true;
        }
        // Check if we can reach the broker
        self.producer.in_flight_count() < 10000 // Arbitrary threshold
    }
}

/// Producer statistics
#[derive(Debug, Clone)]
pub struct ProducerStats {
    pub messages_sent: u64,
    pub messages_failed: u64,
    pub bytes_sent: u64,
    pub in_flight: u64,
}

impl Drop for KafkaProducer {
    fn drop(&mut self) {
        if self.enabled && Arc::strong_count(&self.producer) == 1 {
            // Last reference, flush before dropping
            self.flush(Duration::from_secs(5));
        }
    }
}

// ============================================================================
// Event types for Kafka messages
// ============================================================================

/// Interaction event message published to the interactions topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEventMessage {
    pub user_id: String,
    pub post_id: String,
    pub kind: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
}

impl InteractionEventMessage {
    pub fn new(
        user_id: impl Into<String>,
        post_id: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            post_id: post_id.into(),
            kind: kind.into(),
            timestamp: chrono::Utc::now().timestamp(),
            duration_secs: None,
        }
    }

    pub fn with_duration(mut self, duration_secs: i64) -> Self {
        self.duration_secs = Some(duration_secs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_event_message() {
        let event = InteractionEventMessage::new("user-1", "post-9", "view").with_duration(12);

        assert_eq!(event.kind, "view");
        assert_eq!(event.duration_secs, Some(12));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["post_id"], "post-9");
    }

    #[test]
    fn test_producer_stats() {
        let metrics = KafkaProducerMetrics::new();
        metrics.messages_sent.fetch_add(10, Ordering::Relaxed);
        metrics.messages_failed.fetch_add(1, Ordering::Relaxed);

        assert_eq!(metrics.messages_sent.load(Ordering::Relaxed), 10);
        assert_eq!(metrics.messages_failed.load(Ordering::Relaxed), 1);
    }
}
