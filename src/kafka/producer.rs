use async_trait::async_trait;
use chrono::DateTime;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use tracing::debug;

use super::serializer::JsonSerializer;
use crate::poller::RecordSink;
use crate::source::Record;
use crate::{config::KafkaConfig, Error, Result};

pub struct KafkaProducer {
    producer: FutureProducer,
    serializer: JsonSerializer,
    config: KafkaConfig,
}

impl KafkaProducer {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("compression.type", &config.compression)
            .set("acks", &config.acks)
            .set("linger.ms", config.linger_ms.to_string())
            .set("batch.size", config.batch_size.to_string())
            // librdkafka sizes the producer queue in KiB
            .set(
                "queue.buffering.max.kbytes",
                (config.buffer_memory / 1024).max(1).to_string(),
            )
            .create()
            .map_err(Error::Kafka)?;

        Ok(Self {
            producer,
            serializer: JsonSerializer::new(config.format),
            config: config.clone(),
        })
    }

    pub async fn send(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: &str,
        timestamp_ms: Option<i64>,
    ) -> Result<()> {
        let mut record = FutureRecord::to(topic)
            .payload(payload)
            .key(key.unwrap_or(""));
        if let Some(ts) = timestamp_ms {
            record = record.timestamp(ts);
        }

        self.producer
            .send(record, rdkafka::util::Timeout::Never)
            .await
            .map_err(|(e, _)| Error::Kafka(e))?;

        Ok(())
    }

    /// Send one record; the partition is left to the partitioner.
    pub async fn send_record(&self, record: &Record) -> Result<()> {
        let topic = self.config.topic_name(&record.topic);
        let key = record.key_string();
        let payload = self.serializer.serialize(record)?;
        let timestamp_ms = DateTime::parse_from_rfc3339(&record.timestamp)
            .ok()
            .map(|ts| ts.timestamp_millis());

        self.send(&topic, Some(&key), &payload, timestamp_ms).await
    }
}

#[async_trait]
impl RecordSink for KafkaProducer {
    async fn publish(&self, records: &[Record]) -> Result<()> {
        for record in records {
            self.send_record(record).await?;
        }
        debug!(count = records.len(), "Published records to Kafka");
        Ok(())
    }
}
