use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use tracing::{debug, error, instrument, warn};

use crate::config::ForwardConfig;
use crate::forward::{BodyEncoding, CredentialMap, ParsedEnvelope, RetryPolicy, SinkClient, StatusClass};
use crate::kafka::Record;
use crate::Result;

/// Header carrying the tenant token on every outbound request.
pub const TENANT_TOKEN_HEADER: &str = "x-em-appk";

/// How the processing of one record ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The payload is not a JSON object (or `null`), or its `appid` is not a string.
    Malformed,
    /// The `appid` has no configured token.
    UnknownTenant,
    /// The body could not be compressed.
    EncodingFailed,
    /// The sink answered 200.
    Delivered { attempts: u32 },
    /// The sink answered a status that is not retried.
    Rejected { attempts: u32, status: u16 },
    /// Every allowed attempt failed with a transport error or 4xx.
    GaveUp { attempts: u32 },
}

/// Per-record delivery logic shared by all workers.
///
/// Holds only read-only state, so one instance sits behind an `Arc` and is
/// used concurrently without locking.
#[derive(Debug)]
pub struct Forwarder {
    client: SinkClient,
    credentials: CredentialMap,
    encoding: BodyEncoding,
    retry: RetryPolicy,
}

impl Forwarder {
    pub fn new(
        client: SinkClient,
        credentials: CredentialMap,
        encoding: BodyEncoding,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            credentials,
            encoding,
            retry,
        }
    }

    pub fn from_config(config: &ForwardConfig, credentials: CredentialMap) -> Result<Self> {
        Ok(Self::new(
            SinkClient::new(config)?,
            credentials,
            BodyEncoding::from_compress_flag(config.compress),
            RetryPolicy::new(config.max_retries, config.retry_base_delay()),
        ))
    }

    pub fn sink_url(&self) -> &str {
        self.client.url()
    }

    /// Delivers one record to the sink.
    ///
    /// Nothing here is reported upstream; the outcome is returned for the
    /// caller's logging and for tests.
    #[instrument(
        skip_all,
        fields(topic = %record.topic, partition = record.partition, offset = record.offset)
    )]
    pub async fn forward(&self, record: &Record) -> DeliveryOutcome {
        let envelope = match ParsedEnvelope::decode(&record.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(
                    error = %e,
                    payload = %String::from_utf8_lossy(&record.payload),
                    "Failed to decode record envelope"
                );
                return DeliveryOutcome::Malformed;
            }
        };

        let Some(token) = self.credentials.token_for(&envelope.appid) else {
            debug!(appid = %envelope.appid, "Unknown appid, record dropped");
            return DeliveryOutcome::UnknownTenant;
        };

        let body = match self.encoding.encode(&record.payload) {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, appid = %envelope.appid, "Failed to encode body");
                return DeliveryOutcome::EncodingFailed;
            }
        };

        let headers = self.headers(token);

        for attempt in 0..self.retry.max_attempts {
            let last = self.retry.is_last_attempt(attempt);

            // Bytes clones share the buffer, so every attempt sends the whole body.
            match self.client.post(body.clone(), headers.clone()).await {
                Err(e) => {
                    if last {
                        warn!(error = %e, retries = attempt + 1, "Post failed, giving up");
                        return DeliveryOutcome::GaveUp { attempts: attempt + 1 };
                    }
                    debug!(error = %e, attempt = attempt + 1, "Post failed, will retry");
                }
                Ok(response) => match StatusClass::of(response.status) {
                    StatusClass::Delivered => {
                        debug!(attempts = attempt + 1, "Record delivered");
                        return DeliveryOutcome::Delivered { attempts: attempt + 1 };
                    }
                    StatusClass::Retryable => {
                        if last {
                            warn!(
                                status = %response.status,
                                body = %response.body,
                                retries = attempt + 1,
                                "Sink status error, giving up"
                            );
                            return DeliveryOutcome::GaveUp { attempts: attempt + 1 };
                        }
                        debug!(
                            status = %response.status,
                            attempt = attempt + 1,
                            "Sink status error, will retry"
                        );
                    }
                    StatusClass::Terminal => {
                        warn!(
                            status = %response.status,
                            body = %response.body,
                            "Sink status error"
                        );
                        return DeliveryOutcome::Rejected {
                            attempts: attempt + 1,
                            status: response.status.as_u16(),
                        };
                    }
                },
            }

            tokio::time::sleep(self.retry.backoff(attempt)).await;
        }

        DeliveryOutcome::GaveUp {
            attempts: self.retry.max_attempts,
        }
    }

    fn headers(&self, token: &HeaderValue) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(3);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(HeaderName::from_static(TENANT_TOKEN_HEADER), token.clone());
        if let Some(encoding) = self.encoding.content_encoding() {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding));
        }
        headers
    }
}
