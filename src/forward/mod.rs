pub mod client;
pub mod compress;
pub mod credentials;
pub mod envelope;
pub mod forwarder;
pub mod pipeline;
pub mod retry;
pub mod worker;


pub use client::{SinkClient, SinkResponse};
pub use compress::BodyEncoding;
pub use credentials::CredentialMap;
pub use envelope::ParsedEnvelope;
pub use forwarder::{DeliveryOutcome, Forwarder};
pub use pipeline::Pipeline;
pub use retry::{RetryPolicy, StatusClass};
pub use worker::DeliveryWorker;
