use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "etc/kafka-forwarder.yml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub forward: ForwardConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    /// Tenant identifier to outbound token.
    #[serde(rename = "app-id", alias = "app_id", default)]
    pub app_id: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ForwardConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(alias = "max_retries", default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub compress: bool,
    #[serde(alias = "queue_capacity", default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(alias = "retry_base_delay_ms", default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(alias = "connect_timeout_ms", default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(alias = "request_timeout_ms", default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LogConfig {
    #[serde(default)]
    pub dir: String,
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Size in megabytes at which the log file is rotated.
    #[serde(alias = "max_size_mb", default = "default_log_max_size_mb")]
    pub max_size_mb: u64,
    #[serde(alias = "max_backups", default = "default_log_max_backups")]
    pub max_backups: usize,
    /// Gzip rotated files.
    #[serde(default = "default_log_compress")]
    pub compress: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct KafkaConfig {
    #[serde(default, deserialize_with = "deserialize_brokers")]
    pub brokers: Vec<String>,
    #[serde(alias = "group_id", default = "default_group_id")]
    pub group_id: String,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(alias = "commit_interval_ms", default = "default_commit_interval_ms")]
    pub commit_interval_ms: u64,
    #[serde(alias = "session_timeout_ms", default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("KAFKA_FORWARDER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Checks the settings the process cannot run without.
    pub fn validate(&self) -> Result<()> {
        if self.app_id.is_empty() {
            return Err(Error::Config("app-id is required".to_string()));
        }
        if self.kafka.brokers.is_empty() {
            return Err(Error::Config("kafka brokers is required".to_string()));
        }
        if self.forward.url.is_empty() {
            return Err(Error::Config("forward.url is required".to_string()));
        }
        if !(self.forward.url.starts_with("http://") || self.forward.url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "forward.url must be an http(s) URL, got '{}'",
                self.forward.url
            )));
        }
        if self.forward.concurrency == 0 {
            return Err(Error::Config("forward.concurrency must be at least 1".to_string()));
        }
        if self.forward.max_retries == 0 {
            return Err(Error::Config("forward.max-retries must be at least 1".to_string()));
        }
        if self.forward.queue_capacity == 0 {
            return Err(Error::Config("forward.queue-capacity must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Location of the PID file used by the lifecycle commands.
    pub fn pid_file(&self) -> PathBuf {
        Path::new(&self.log.dir).join("pid")
    }

    /// Log file path, when file logging is configured.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.log
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .map(|name| Path::new(&self.log.dir).join(name))
    }
}

impl ForwardConfig {
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            compress: false,
            queue_capacity: default_queue_capacity(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: String::new(),
            level: default_log_level(),
            name: None,
            max_size_mb: default_log_max_size_mb(),
            max_backups: default_log_max_backups(),
            compress: default_log_compress(),
        }
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: Vec::new(),
            group_id: default_group_id(),
            topic: default_topic(),
            commit_interval_ms: default_commit_interval_ms(),
            session_timeout_ms: default_session_timeout_ms(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BrokerList {
    Csv(String),
    List(Vec<String>),
}

// Accepts both "host1:9092,host2:9092" and a YAML/TOML list.
fn deserialize_brokers<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match BrokerList::deserialize(deserializer)? {
        BrokerList::Csv(csv) => csv.split(',').map(str::to_string).collect(),
        BrokerList::List(list) => list,
    };

    Ok(raw
        .into_iter()
        .map(|broker| broker.trim().to_string())
        .filter(|broker| !broker.is_empty())
        .collect())
}

fn default_concurrency() -> usize {
    8
}

fn default_max_retries() -> u32 {
    3
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_size_mb() -> u64 {
    64
}

fn default_log_max_backups() -> usize {
    7
}

fn default_log_compress() -> bool {
    true
}

fn default_group_id() -> String {
    "em-ta-consumer".to_string()
}

fn default_topic() -> String {
    "ta-data".to_string()
}

fn default_commit_interval_ms() -> u64 {
    1000
}

fn default_session_timeout_ms() -> u64 {
    60_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(ext: &str, body: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(ext).tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_yaml_with_defaults() {
        let file = write_config(
            ".yml",
            r#"
forward:
  url: "http://sink.local/ingest"
  concurrency: 4
  max-retries: 5
  compress: true
kafka:
  brokers: "k1:9092, k2:9092"
app-id:
  AppOne: token-1
  app-two: token-2
"#,
        );

        let config = Config::from_file(file.path()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.forward.url, "http://sink.local/ingest");
        assert_eq!(config.forward.concurrency, 4);
        assert_eq!(config.forward.max_retries, 5);
        assert!(config.forward.compress);
        assert_eq!(config.forward.queue_capacity, 1000);
        assert_eq!(config.forward.retry_base_delay(), Duration::from_secs(1));
        assert_eq!(config.kafka.brokers, vec!["k1:9092", "k2:9092"]);
        assert_eq!(config.kafka.topic, "ta-data");
        assert_eq!(config.kafka.group_id, "em-ta-consumer");
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.max_size_mb, 64);
        assert_eq!(config.log.max_backups, 7);
        assert!(config.log.compress);
        // Tenant ids are case sensitive.
        assert_eq!(config.app_id.get("AppOne").map(String::as_str), Some("token-1"));
        assert_eq!(config.app_id.len(), 2);
    }

    #[test]
    fn test_load_toml_broker_list() {
        let file = write_config(
            ".toml",
            r#"
[forward]
url = "https://sink.local/ingest"

[kafka]
brokers = ["k1:9092", "k2:9092"]
topic = "events"
group-id = "forwarders"

[log]
max-size-mb = 16
max-backups = 3
compress = false

[app-id]
x = "T1"
"#,
        );

        let config = Config::from_file(file.path()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.kafka.brokers, vec!["k1:9092", "k2:9092"]);
        assert_eq!(config.kafka.topic, "events");
        assert_eq!(config.kafka.group_id, "forwarders");
        assert_eq!(config.forward.concurrency, 8);
        assert_eq!(config.forward.max_retries, 3);
        assert_eq!(config.log.max_size_mb, 16);
        assert_eq!(config.log.max_backups, 3);
        assert!(!config.log.compress);
    }

    #[test]
    fn test_validate_requires_app_id() {
        let file = write_config(
            ".yml",
            "forward:\n  url: http://sink\nkafka:\n  brokers: k1:9092\n",
        );
        let config = Config::from_file(file.path()).unwrap();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("app-id is required"));
    }

    #[test]
    fn test_validate_requires_brokers_and_url() {
        let mut config = Config {
            forward: ForwardConfig::default(),
            log: LogConfig::default(),
            kafka: KafkaConfig::default(),
            app_id: HashMap::from([("x".to_string(), "T1".to_string())]),
        };
        assert!(config.validate().unwrap_err().to_string().contains("brokers"));

        config.kafka.brokers = vec!["k1:9092".to_string()];
        assert!(config.validate().unwrap_err().to_string().contains("forward.url"));

        config.forward.url = "ftp://sink".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("http(s)"));

        config.forward.url = "http://sink".to_string();
        config.forward.concurrency = 0;
        assert!(config.validate().is_err());

        config.forward.concurrency = 2;
        config.validate().unwrap();
    }

    #[test]
    fn test_log_paths() {
        let mut config = Config {
            forward: ForwardConfig::default(),
            log: LogConfig {
                dir: "/var/log/fwd".to_string(),
                level: "debug".to_string(),
                ..LogConfig::default()
            },
            kafka: KafkaConfig::default(),
            app_id: HashMap::new(),
        };
        assert_eq!(config.pid_file(), PathBuf::from("/var/log/fwd/pid"));
        assert_eq!(config.log_file(), None);

        config.log.name = Some("forwarder.log".to_string());
        assert_eq!(config.log_file(), Some(PathBuf::from("/var/log/fwd/forwarder.log")));
    }
}
