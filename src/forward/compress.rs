use std::io::Write;

use bytes::Bytes;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::{Error, Result};

/// How an outbound body is encoded before it is posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyEncoding {
    /// Forward the record payload byte for byte.
    #[default]
    Identity,
    /// Raw DEFLATE stream at the default level, sent as `Content-Encoding: deflate`.
    Deflate,
}

impl BodyEncoding {
    pub fn from_compress_flag(compress: bool) -> Self {
        if compress {
            Self::Deflate
        } else {
            Self::Identity
        }
    }

    /// Value for the `Content-Encoding` header, if any.
    pub fn content_encoding(&self) -> Option<&'static str> {
        match self {
            Self::Identity => None,
            Self::Deflate => Some("deflate"),
        }
    }

    pub fn encode(&self, payload: &Bytes) -> Result<Bytes> {
        match self {
            Self::Identity => Ok(payload.clone()),
            Self::Deflate => compress(payload).map(Bytes::from),
        }
    }
}

/// Compresses `input` into a raw DEFLATE stream.
pub fn compress(input: &[u8]) -> Result<Vec<u8>> {
    let buf = Vec::with_capacity(input.len() * 7 / 10);
    let mut encoder = DeflateEncoder::new(buf, Compression::default());
    encoder
        .write_all(input)
        .map_err(|e| Error::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| Error::Compression(e.to_string()))
}
