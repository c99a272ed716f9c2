use async_trait::async_trait;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;

use super::collaborator::{RowExecutor, SchemaDiscovery, SourceSession};
use super::query::Statement;
use super::types::{Row, TableSchema};
use crate::{Error, Result};

pub fn row(id: i64, updated_at: &str) -> Row {
    let mut row = Row::new();
    row.insert("id".to_string(), json!(id));
    row.insert("name".to_string(), json!(format!("user-{}", id)));
    row.insert("updated_at".to_string(), json!(updated_at));
    row
}

/// In-memory `users(id, name, updated_at)` table that answers the built
/// statements by interpreting their bound parameters.
pub struct FakeTable {
    rows: Mutex<Vec<Row>>,
    executed: Mutex<Vec<Statement>>,
    failures: AtomicUsize,
    authenticated: AtomicBool,
    closed: AtomicBool,
    reject_auth: bool,
    schema: TableSchema,
}

impl FakeTable {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: Mutex::new(rows),
            executed: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(0),
            authenticated: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            reject_auth: false,
            schema: Self::schema(),
        }
    }

    pub fn with_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        Self::new(
            ids.into_iter()
                .map(|id| row(id, &format!("2024-01-01T00:00:{:02}", id % 60)))
                .collect(),
        )
    }

    pub fn schema() -> TableSchema {
        TableSchema::new("users")
            .with_column("id", "int4")
            .with_column("name", "text")
            .with_column("updated_at", "timestamp")
    }

    pub fn without_schema(mut self) -> Self {
        self.schema = TableSchema::new("users");
        self
    }

    pub fn rejecting_auth(mut self) -> Self {
        self.reject_auth = true;
        self
    }

    pub fn insert(&self, row: Row) {
        self.rows.lock().unwrap().push(row);
    }

    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, AtomicOrdering::SeqCst);
    }

    pub fn executed(&self) -> Vec<Statement> {
        self.executed.lock().unwrap().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(AtomicOrdering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(AtomicOrdering::SeqCst)
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn field<'a>(row: &'a Row, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

#[async_trait]
impl RowExecutor for FakeTable {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>> {
        self.executed.lock().unwrap().push(statement.clone());

        if self
            .failures
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::QueryExecution {
                message: "connection reset by peer".to_string(),
            });
        }

        let limit = statement.value("limit").and_then(Value::as_u64).unwrap_or(0) as usize;
        let offset = statement.value("offset").and_then(Value::as_u64).unwrap_or(0) as usize;
        let mut rows = self.rows.lock().unwrap().clone();

        if statement.sql.contains(":timestamp") {
            let last_id = statement.value("lastid").cloned().unwrap_or(Value::Null);
            let watermark = statement.value("timestamp").cloned().unwrap_or(Value::Null);
            rows.retain(|r| {
                let ts = compare(field(r, "updated_at"), &watermark);
                ts == Ordering::Greater
                    || (ts == Ordering::Equal && compare(field(r, "id"), &last_id) == Ordering::Greater)
            });
            rows.sort_by(|a, b| {
                compare(field(a, "updated_at"), field(b, "updated_at"))
                    .then_with(|| compare(field(a, "id"), field(b, "id")))
            });
        } else {
            rows.sort_by(|a, b| compare(field(a, "id"), field(b, "id")));
        }

        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }
}

#[async_trait]
impl SchemaDiscovery for FakeTable {
    async fn discover(&self, table: &str) -> Result<TableSchema> {
        if table == self.schema.table {
            Ok(self.schema.clone())
        } else {
            Ok(TableSchema::new(table))
        }
    }
}

#[async_trait]
impl SourceSession for FakeTable {
    async fn authenticate(&self) -> Result<()> {
        if self.reject_auth {
            return Err(Error::Connection("password authentication failed".to_string()));
        }
        self.authenticated.store(true, AtomicOrdering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, AtomicOrdering::SeqCst);
        Ok(())
    }
}
