use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::query::{Parameter, PARAM_LAST_ID, PARAM_LIMIT, PARAM_OFFSET, PARAM_TIMESTAMP};
use super::types::FetchMode;

/// Timestamp watermark used when no `init_timestamp` is configured.
pub const EPOCH_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

/// Watermark and pagination state owned by a single task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub last_id: Value,
    pub last_timestamp: Value,
    pub offset: u64,
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Cursor {
    pub fn new(init_timestamp: Option<&str>) -> Self {
        Self {
            last_id: Value::from(0),
            last_timestamp: Value::from(init_timestamp.unwrap_or(EPOCH_TIMESTAMP)),
            offset: 0,
        }
    }

    /// Move the watermark to a processed row. A row without a timestamp
    /// keeps the previous one.
    pub fn advance(&mut self, id: Value, timestamp: Option<Value>) {
        self.last_id = id;
        if let Some(timestamp) = timestamp {
            self.last_timestamp = timestamp;
        }
    }

    pub fn advance_offset(&mut self, rows: usize) {
        self.offset += rows as u64;
    }

    /// Offset submitted with the next statement; always 0 in timestamp mode.
    pub fn effective_offset(&self, mode: FetchMode) -> u64 {
        match mode {
            FetchMode::Increment => self.offset,
            FetchMode::Timestamp => 0,
        }
    }

    pub fn parameters(
        &self,
        mode: FetchMode,
        max_rows: i64,
        id_type: Option<&str>,
        timestamp_type: Option<&str>,
    ) -> Vec<Parameter> {
        vec![
            Parameter {
                name: PARAM_LAST_ID,
                value: self.last_id.clone(),
                declared_type: id_type.map(str::to_string),
            },
            Parameter {
                name: PARAM_TIMESTAMP,
                value: self.last_timestamp.clone(),
                declared_type: timestamp_type.map(str::to_string),
            },
            Parameter {
                name: PARAM_LIMIT,
                value: Value::from(max_rows),
                declared_type: Some("int8".to_string()),
            },
            Parameter {
                name: PARAM_OFFSET,
                value: Value::from(self.effective_offset(mode)),
                declared_type: Some("int8".to_string()),
            },
        ]
    }
}
