use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::collaborator::RowExecutor;
use super::quote::QuoteStyle;
use crate::{Error, Result};

pub const DEFAULT_ID_COLUMN: &str = "id";
pub const DEFAULT_UPDATED_AT_COLUMN: &str = "updated_at";

/// A fetched row: column name to value, in result-set column order.
pub type Row = Map<String, Value>;

/// Called with the string form of each record key before a batch is returned.
pub type RecordObserver = Arc<dyn Fn(&str) + Send + Sync>;

/// Declared column types of one table, in ordinal order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
}

impl TableSchema {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        self.columns.push(ColumnSchema {
            name: name.into(),
            data_type: data_type.into(),
        });
        self
    }

    pub fn column_type(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.data_type.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    #[default]
    Increment,
    Timestamp,
}

impl FromStr for FetchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "increment" => Ok(FetchMode::Increment),
            "timestamp" => Ok(FetchMode::Timestamp),
            other => Err(Error::InvalidFetchMode {
                mode: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMode::Increment => f.write_str("increment"),
            FetchMode::Timestamp => f.write_str("timestamp"),
        }
    }
}

/// A single row, keyed and ready for the downstream transport.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub key: Value,
    pub key_schema: Option<Arc<TableSchema>>,
    pub value: Row,
    pub value_schema: Arc<TableSchema>,
    /// Wall-clock creation time, ISO-8601.
    pub timestamp: String,
    /// `None` lets the transport choose.
    pub partition: Option<i32>,
    pub topic: String,
}

impl Record {
    pub fn new(key: Value, value: Row, value_schema: Arc<TableSchema>, topic: &str) -> Self {
        Self {
            key,
            key_schema: None,
            value,
            value_schema,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            partition: None,
            topic: topic.to_string(),
        }
    }

    pub fn key_string(&self) -> String {
        key_to_string(&self.key)
    }
}

/// String form of a key value; strings are not JSON-quoted.
pub fn key_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

/// Null, `false`, zero and the empty string cannot identify a row.
pub fn is_usable_key(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Everything a task needs to build its query and cursor.
#[derive(Clone)]
pub struct TaskConfig {
    pub table: String,
    pub fetch_mode: Option<String>,
    pub incrementing_column: String,
    pub timestamp_column: String,
    pub max_rows: i64,
    pub custom_query: Option<String>,
    pub init_timestamp: Option<String>,
    pub timestamp_delay_seconds: Option<u64>,
    pub qualify_columns: bool,
    pub quote_style: QuoteStyle,
    pub table_schema: Arc<TableSchema>,
    pub executor: Arc<dyn RowExecutor>,
}

impl fmt::Debug for TaskConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskConfig")
            .field("table", &self.table)
            .field("fetch_mode", &self.fetch_mode)
            .field("incrementing_column", &self.incrementing_column)
            .field("timestamp_column", &self.timestamp_column)
            .field("max_rows", &self.max_rows)
            .field("custom_query", &self.custom_query)
            .field("init_timestamp", &self.init_timestamp)
            .field("qualify_columns", &self.qualify_columns)
            .field("quote_style", &self.quote_style)
            .finish_non_exhaustive()
    }
}
