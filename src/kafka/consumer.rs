use std::future::Future;
use std::sync::Arc;

use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::ClientConfig;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::config::KafkaConfig;
use crate::forward::Pipeline;
use crate::kafka::Record;
use crate::{Error, Result};

/// Anything the consumer loop can pull records from, one at a time.
///
/// Implementations must be cancel safe: if the returned future is dropped
/// before it resolves, no record may be lost.
pub trait RecordSource: Send {
    fn next_record(&mut self) -> impl Future<Output = Result<Record>> + Send;
}

/// Kafka consumer group member subscribed to the source topic.
///
/// Offsets are committed by librdkafka on a fixed interval, independently of
/// whether the records have been delivered yet.
pub struct KafkaSource {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaSource {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("group.id", &config.group_id)
            .set("client.id", &config.group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", config.commit_interval_ms.to_string())
            .set("session.timeout.ms", config.session_timeout_ms.to_string())
            .set("socket.keepalive.enable", "true")
            .set("socket.connection.setup.timeout.ms", "5000")
            .create()
            .map_err(Error::Kafka)?;

        consumer.subscribe(&[config.topic.as_str()])?;

        info!(
            brokers = %config.brokers.join(","),
            topic = %config.topic,
            group_id = %config.group_id,
            "Kafka consumer subscribed"
        );

        Ok(Self {
            consumer,
            topic: config.topic.clone(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl RecordSource for KafkaSource {
    async fn next_record(&mut self) -> Result<Record> {
        let message = self.consumer.recv().await?;
        Ok(Record::from_message(&message))
    }
}

impl Drop for KafkaSource {
    fn drop(&mut self) {
        info!(topic = %self.topic, "Kafka consumer closed");
    }
}

/// Pulls records from a [`RecordSource`] and hands them to the pipeline.
///
/// The enqueue is the only backpressure point: while the pipeline queue is
/// full the loop stops reading, which in turn holds back the source.
pub struct ConsumerLoop<S> {
    source: S,
    pipeline: Arc<Pipeline>,
}

impl<S: RecordSource + 'static> ConsumerLoop<S> {
    pub fn new(source: S, pipeline: Arc<Pipeline>) -> Self {
        Self { source, pipeline }
    }

    /// Runs until `cancel` fires, returning the number of records enqueued.
    ///
    /// Read errors are logged and the read is retried immediately. A record
    /// that has already been read is always enqueued, even if cancellation
    /// arrives meanwhile. Fails only when the pipeline has been closed under
    /// the loop.
    #[instrument(skip_all)]
    pub async fn run(mut self, cancel: CancellationToken) -> Result<u64> {
        info!("Consumer loop starting");
        let mut enqueued: u64 = 0;

        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                read = self.source.next_record() => read,
            };

            match read {
                Ok(record) => {
                    debug!(
                        topic = %record.topic,
                        partition = record.partition,
                        offset = record.offset,
                        "Record received"
                    );
                    if let Err(e) = self.pipeline.handle(record).await {
                        error!(error = %e, "Failed to enqueue record");
                        return Err(e);
                    }
                    enqueued += 1;
                }
                Err(e) => {
                    error!(error = %e, "Consume error");
                }
            }
        }

        info!(enqueued, "Consumer loop stopped");
        Ok(enqueued)
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<Result<u64>> {
        tokio::spawn(self.run(cancel))
    }
}
