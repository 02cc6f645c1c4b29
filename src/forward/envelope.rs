use std::fmt;

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::Deserialize;

use crate::Result;

/// The only part of an inbound record the forwarder looks at.
///
/// Every other field of the payload is opaque and forwarded as is. A missing
/// `appid` decodes to the empty string, which never matches a tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedEnvelope {
    pub appid: String,
}

impl ParsedEnvelope {
    /// Decodes the envelope from a JSON object or `null`.
    ///
    /// Keys are matched against `appid` ignoring ASCII case and the last
    /// matching key wins. A `null` value leaves the field empty; any other
    /// non-string value is an error.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

impl<'de> Deserialize<'de> for ParsedEnvelope {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(EnvelopeVisitor)
    }
}

struct EnvelopeVisitor;

impl<'de> Visitor<'de> for EnvelopeVisitor {
    type Value = ParsedEnvelope;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON object or null")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
        Ok(ParsedEnvelope::default())
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut envelope = ParsedEnvelope::default();
        while let Some(key) = map.next_key::<String>()? {
            if key.eq_ignore_ascii_case("appid") {
                if let Some(appid) = map.next_value::<Option<String>>()? {
                    envelope.appid = appid;
                }
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ignores_other_fields() {
        let envelope =
            ParsedEnvelope::decode(br#"{"appid":"x","v":1,"nested":{"appid":"y"}}"#).unwrap();
        assert_eq!(envelope.appid, "x");
    }

    #[test]
    fn test_decode_missing_appid() {
        let envelope = ParsedEnvelope::decode(br#" {"v":1}"#).unwrap();
        assert_eq!(envelope.appid, "");
    }

    #[test]
    fn test_decode_null_is_empty() {
        assert_eq!(ParsedEnvelope::decode(b"null").unwrap().appid, "");
        assert_eq!(ParsedEnvelope::decode(br#"{"appid":null}"#).unwrap().appid, "");
        // A null does not clear an earlier value.
        assert_eq!(
            ParsedEnvelope::decode(br#"{"appid":"x","appid":null}"#).unwrap().appid,
            "x"
        );
    }

    #[test]
    fn test_decode_last_duplicate_wins() {
        let envelope = ParsedEnvelope::decode(br#"{"appid":"x","appid":"y"}"#).unwrap();
        assert_eq!(envelope.appid, "y");
    }

    #[test]
    fn test_decode_key_case_insensitive() {
        assert_eq!(ParsedEnvelope::decode(br#"{"AppId":"x"}"#).unwrap().appid, "x");
        assert_eq!(ParsedEnvelope::decode(br#"{"APPID":"x","v":2}"#).unwrap().appid, "x");
        // The value itself stays case sensitive.
        assert_eq!(ParsedEnvelope::decode(br#"{"appid":"X"}"#).unwrap().appid, "X");
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(ParsedEnvelope::decode(b"{not json").is_err());
        assert!(ParsedEnvelope::decode(b"").is_err());
        assert!(ParsedEnvelope::decode(br#"["x"]"#).is_err());
        assert!(ParsedEnvelope::decode(br#""x""#).is_err());
        assert!(ParsedEnvelope::decode(br#"{"appid":7}"#).is_err());
        assert!(ParsedEnvelope::decode(br#"{"appid":"x"} trailing"#).is_err());
    }
}
