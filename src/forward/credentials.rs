use std::collections::HashMap;

use reqwest::header::HeaderValue;

use crate::{Error, Result};

/// Read-only lookup from tenant application id to its outbound token.
///
/// Tokens are validated as header values once, at construction, so the
/// delivery path never has to deal with an unencodable token.
#[derive(Debug, Clone, Default)]
pub struct CredentialMap {
    tokens: HashMap<String, HeaderValue>,
}

impl CredentialMap {
    pub fn new<I, K, V>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut tokens = HashMap::new();
        for (app_id, token) in entries {
            let app_id = app_id.into();
            let mut value = HeaderValue::from_str(token.as_ref()).map_err(|e| {
                Error::Config(format!("invalid token for app-id '{}': {}", app_id, e))
            })?;
            value.set_sensitive(true);
            tokens.insert(app_id, value);
        }
        Ok(Self { tokens })
    }

    pub fn from_config(app_ids: &HashMap<String, String>) -> Result<Self> {
        Self::new(app_ids.iter().map(|(k, v)| (k.clone(), v.as_str())))
    }

    pub fn token_for(&self, app_id: &str) -> Option<&HeaderValue> {
        self.tokens.get(app_id)
    }

    pub fn app_ids(&self) -> impl Iterator<Item = &str> {
        self.tokens.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_exact() {
        let map = CredentialMap::new([("x", "T1"), ("Other", "T2")]).unwrap();

        assert_eq!(map.token_for("x").unwrap(), "T1");
        assert_eq!(map.token_for("Other").unwrap(), "T2");
        assert!(map.token_for("other").is_none());
        assert!(map.token_for("").is_none());
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_tokens_are_sensitive() {
        let map = CredentialMap::new([("x", "secret")]).unwrap();
        assert!(map.token_for("x").unwrap().is_sensitive());
    }

    #[test]
    fn test_rejects_unencodable_token() {
        let err = CredentialMap::new([("x", "bad\ntoken")]).unwrap_err();
        assert!(err.to_string().contains("app-id 'x'"));
    }

    #[test]
    fn test_from_config() {
        let app_ids = HashMap::from([("a".to_string(), "1".to_string())]);
        let map = CredentialMap::from_config(&app_ids).unwrap();
        assert_eq!(map.app_ids().collect::<Vec<_>>(), vec!["a"]);
    }
}
