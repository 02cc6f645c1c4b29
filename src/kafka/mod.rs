pub mod consumer;
pub mod record;

pub use consumer::{ConsumerLoop, KafkaSource, RecordSource};
pub use record::Record;
