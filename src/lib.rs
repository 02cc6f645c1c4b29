pub mod config;
pub mod error;
pub mod forward;
pub mod kafka;
pub mod logging;
pub mod process;

pub use config::Config;
pub use error::{Error, Result};
pub use forward::Pipeline;
pub use kafka::{ConsumerLoop, KafkaSource, Record, RecordSource};
