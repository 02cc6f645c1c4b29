//! Error types and result handling for kafka-forwarder.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! Per-message delivery failures never surface as an [`Error`] to the
//! consumer; they are logged inside the worker that handled the record.
//! The variants here cover startup, lifecycle and the few operations that
//! report back to a caller.
//!
//! # Example
//!
//! ```rust
//! use kafka_forwarder::{Error, Result};
//!
//! fn load_settings() -> Result<()> {
//!     Err(Error::Config("forward.url is required".to_string()))
//! }
//!
//! match load_settings() {
//!     Ok(()) => println!("Loaded"),
//!     Err(Error::Config(msg)) => eprintln!("Configuration error: {}", msg),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for kafka-forwarder operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error, from a missing or invalid setting.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Kafka client or consumer error.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// HTTP client construction or transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON decoding error for an inbound record.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error, typically from PID or log file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Deflate compression of an outbound body failed.
    #[error("Compression error: {0}")]
    Compression(String),

    /// A record was handed to a pipeline that has already been stopped.
    #[error("Pipeline is closed")]
    PipelineClosed,

    /// Process lifecycle error (PID file, signalling, daemonizing).
    #[error("Process error: {0}")]
    Process(String),
}

/// A convenient Result type alias for kafka-forwarder operations.
///
/// This is equivalent to `std::result::Result<T, kafka_forwarder::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
