//! Durable log publishers
//!
//! Every committed comment is appended to an external at-least-once log,
//! keyed by event id. Publishing is best-effort from the caller's side; the
//! service logs a failure and carries on.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use log::info;

use crate::error::{CommentRelayError, ErrorCode, Result};

/// Appends serialized events to a durable log
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, value: &[u8]) -> Result<()>;
}

/// Writes records to the application log instead of an external system
#[derive(Debug, Default)]
pub struct LoggingEventLog;

#[async_trait]
impl EventLog for LoggingEventLog {
    async fn publish(&self, topic: &str, key: &str, value: &[u8]) -> Result<()> {
        info!("[{}] {} => {}", topic, key, String::from_utf8_lossy(value));
        Ok(())
    }
}

/// One appended record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub topic: String,
    pub key: String,
    pub value: Vec<u8>,
}

/// Keeps appended records in memory
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    records: Mutex<Vec<LogRecord>>,
    unavailable: bool,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log that rejects every publish
    pub fn unavailable() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            unavailable: true,
        }
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn publish(&self, topic: &str, key: &str, value: &[u8]) -> Result<()> {
        if self.unavailable {
            return Err(CommentRelayError::new(ErrorCode::LogPublishFailed, "log unavailable"));
        }
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogRecord {
                topic: topic.to_string(),
                key: key.to_string(),
                value: value.to_vec(),
            });
        Ok(())
    }
}

#[cfg(feature = "kafka")]
pub use kafka::KafkaEventLog;

#[cfg(feature = "kafka")]
mod kafka {
    use std::time::Duration;

    use async_trait::async_trait;
    use log::{debug, info};
    use rdkafka::config::ClientConfig;
    use rdkafka::producer::{FutureProducer, FutureRecord};

    use super::EventLog;
    use crate::error::{CommentRelayError, ErrorCode, Result};

    const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

    /// Idempotent Kafka producer
    pub struct KafkaEventLog {
        producer: FutureProducer,
    }

    impl KafkaEventLog {
        pub fn new(brokers: &[String], client_id: &str) -> Result<Self> {
            let producer: FutureProducer = ClientConfig::new()
                .set("bootstrap.servers", brokers.join(","))
                .set("client.id", client_id)
                .set("acks", "all")
                .set("enable.idempotence", "true")
                .set("retries", "5")
                .set("max.in.flight.requests.per.connection", "1")
                .create()
                .map_err(|e| CommentRelayError::new(ErrorCode::ConfigInvalid, format!("Failed to create Kafka producer: {}", e)))?;

            info!("Kafka producer created for brokers {:?}", brokers);
            Ok(Self { producer })
        }
    }

    #[async_trait]
    impl EventLog for KafkaEventLog {
        async fn publish(&self, topic: &str, key: &str, value: &[u8]) -> Result<()> {
            let record = FutureRecord::to(topic).key(key).payload(value);
            let (partition, offset) = self
                .producer
                .send(record, DELIVERY_TIMEOUT)
                .await
                .map_err(|(e, _)| CommentRelayError::new(ErrorCode::LogPublishFailed, format!("Kafka publish failed: {}", e)))?;

            debug!("Published {} to {} [{}@{}]", key, topic, partition, offset);
            Ok(())
        }
    }
}
