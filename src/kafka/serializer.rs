use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{source::Record, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializationFormat {
    /// The row only, compact JSON.
    #[default]
    JsonCompact,
    /// The row only, pretty-printed.
    Json,
    /// `{"schema": ..., "payload": ...}` with the discovered column types.
    JsonWithSchema,
}

pub struct JsonSerializer {
    format: SerializationFormat,
}

impl JsonSerializer {
    pub fn new(format: SerializationFormat) -> Self {
        Self { format }
    }

    pub fn serialize(&self, record: &Record) -> Result<String> {
        let payload = match self.format {
            SerializationFormat::JsonCompact => serde_json::to_string(&record.value)?,
            SerializationFormat::Json => serde_json::to_string_pretty(&record.value)?,
            SerializationFormat::JsonWithSchema => serde_json::to_string(&json!({
                "schema": {
                    "table": record.value_schema.table,
                    "fields": record.value_schema.columns,
                },
                "payload": record.value,
            }))?,
        };
        Ok(payload)
    }
}
