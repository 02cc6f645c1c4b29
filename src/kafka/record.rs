use bytes::Bytes;
use rdkafka::message::Message;

/// A single record read from the source topic.
///
/// The payload is handed to the pipeline untouched. Topic, partition and
/// offset are carried for logging only; committing offsets is left to the
/// Kafka client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Bytes,
}

impl Record {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            payload: payload.into(),
        }
    }

    /// Copies a borrowed Kafka message into an owned record.
    pub fn from_message<M: Message>(message: &M) -> Self {
        Self {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            payload: Bytes::copy_from_slice(message.payload().unwrap_or_default()),
        }
    }
}
