#![allow(dead_code)]

use kafka_forwarder::config::ForwardConfig;
use kafka_forwarder::forward::CredentialMap;
use kafka_forwarder::Record;
use std::env;

/// Forwarding settings pointed at a test sink, with fast retries.
pub fn get_test_forward_config(url: String) -> ForwardConfig {
    ForwardConfig {
        url,
        concurrency: 4,
        max_retries: 3,
        compress: false,
        queue_capacity: 16,
        retry_base_delay_ms: 50,
        connect_timeout_ms: 1000,
        request_timeout_ms: 2000,
    }
}

pub fn get_test_credentials() -> CredentialMap {
    CredentialMap::new([("x", "T1"), ("y", "T2")]).unwrap()
}

pub fn test_record(offset: i64, payload: &str) -> Record {
    Record::new("ta-data", 0, offset, payload.as_bytes().to_vec())
}

/// Brokers for the tests that need a running Kafka.
pub fn get_test_brokers() -> Vec<String> {
    env::var("TEST_KAFKA_BROKERS")
        .unwrap_or_else(|_| "localhost:9092".to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .collect()
}
