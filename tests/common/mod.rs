#![allow(dead_code)]

use async_trait::async_trait;
use pg_poll_source::config::{PostgresConfig, SourceConfig, SslMode};
use pg_poll_source::source::{QuoteStyle, Row, RowExecutor, Statement};
use pg_poll_source::{Error, Result};
use serde_json::{json, Value};
use std::env;
use std::sync::Mutex;

/// Get PostgreSQL settings from `TEST_PG_*` environment variables.
pub fn get_test_postgres() -> PostgresConfig {
    PostgresConfig {
        host: env::var("TEST_PG_HOST").unwrap_or_else(|_| "localhost".to_string()),
        port: env::var("TEST_PG_PORT")
            .unwrap_or_else(|_| "5432".to_string())
            .parse()
            .unwrap_or(5432),
        database: env::var("TEST_PG_DATABASE").unwrap_or_else(|_| "postgres".to_string()),
        username: env::var("TEST_PG_USERNAME").unwrap_or_else(|_| "postgres".to_string()),
        password: env::var("TEST_PG_PASSWORD").unwrap_or_else(|_| "postgres".to_string()),
        connect_timeout_secs: 30,
        ssl_mode: SslMode::Disable,
    }
}

pub fn source_config(table: &str, fetch_mode: &str, max_poll_count: i64) -> SourceConfig {
    SourceConfig {
        table: table.to_string(),
        max_poll_count,
        incrementing_column_name: None,
        timestamp_column_name: None,
        timestamp_delay_seconds: None,
        init_timestamp: None,
        fetch_mode: Some(fetch_mode.to_string()),
        custom_query: None,
        qualify_columns: true,
        quote_style: QuoteStyle::DoubleQuote,
        max_tasks: 1,
    }
}

/// Records every statement and serves rows by key order, honoring the bound
/// limit and offset. Good enough for increment-mode tests.
pub struct RecordingExecutor {
    pub rows: Mutex<Vec<Row>>,
    pub statements: Mutex<Vec<Statement>>,
    pub fail: Mutex<bool>,
}

impl RecordingExecutor {
    pub fn with_ids(count: i64) -> Self {
        let rows = (1..=count)
            .map(|id| {
                let mut row = Row::new();
                row.insert("id".to_string(), json!(id));
                row.insert("email".to_string(), json!(format!("user{}@example.com", id)));
                row
            })
            .collect();
        Self {
            rows: Mutex::new(rows),
            statements: Mutex::new(Vec::new()),
            fail: Mutex::new(false),
        }
    }
}

#[async_trait]
impl RowExecutor for RecordingExecutor {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>> {
        self.statements.lock().unwrap().push(statement.clone());
        if *self.fail.lock().unwrap() {
            return Err(Error::QueryExecution {
                message: "server closed the connection unexpectedly".to_string(),
            });
        }

        let limit = statement.value("limit").and_then(Value::as_u64).unwrap_or(0) as usize;
        let offset = statement.value("offset").and_then(Value::as_u64).unwrap_or(0) as usize;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}
