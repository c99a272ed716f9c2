use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::kafka::SerializationFormat;
use crate::source::QuoteStyle;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub postgres: PostgresConfig,
    pub kafka: KafkaConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub poller: PollerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub ssl_mode: SslMode,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    #[default]
    Disable,
    Prefer,
    Require,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    #[serde(default)]
    pub topic_prefix: Option<String>,
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default = "default_acks")]
    pub acks: String,
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_buffer_memory")]
    pub buffer_memory: usize,
    #[serde(default)]
    pub format: SerializationFormat,
}

/// Connector start properties for the polled table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub table: String,
    #[serde(default = "default_max_poll_count")]
    pub max_poll_count: i64,
    #[serde(default)]
    pub incrementing_column_name: Option<String>,
    #[serde(default)]
    pub timestamp_column_name: Option<String>,
    /// Reserved; the polling queries do not apply a delay window yet.
    #[serde(default)]
    pub timestamp_delay_seconds: Option<u64>,
    #[serde(default)]
    pub init_timestamp: Option<String>,
    #[serde(default)]
    pub fetch_mode: Option<String>,
    #[serde(default)]
    pub custom_query: Option<String>,
    #[serde(default = "default_qualify_columns")]
    pub qualify_columns: bool,
    #[serde(default)]
    pub quote_style: QuoteStyle,
    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub checkpoint_file: Option<PathBuf>,
    #[serde(default = "default_checkpoint_interval_secs")]
    pub checkpoint_interval_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            checkpoint_file: None,
            checkpoint_interval_secs: default_checkpoint_interval_secs(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("POLL_SOURCE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }

    pub fn topic_name(&self, table_name: &str) -> String {
        self.kafka.topic_name(table_name)
    }
}

impl KafkaConfig {
    pub fn topic_name(&self, table_name: &str) -> String {
        match &self.topic_prefix {
            Some(prefix) if !prefix.is_empty() => format!("{}.{}", prefix, table_name),
            _ => table_name.to_string(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_compression() -> String {
    "snappy".to_string()
}

fn default_acks() -> String {
    "all".to_string()
}

fn default_linger_ms() -> u32 {
    100
}

fn default_batch_size() -> usize {
    16384
}

fn default_buffer_memory() -> usize {
    33_554_432 // 32MB
}

fn default_max_poll_count() -> i64 {
    100
}

fn default_qualify_columns() -> bool {
    true
}

fn default_max_tasks() -> usize {
    1
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_checkpoint_interval_secs() -> u64 {
    10
}
