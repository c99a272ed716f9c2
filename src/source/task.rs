use async_trait::async_trait;
use tracing::info;

use super::cursor::Cursor;
use super::executor::{PollExecutor, PollState, PollStats};
use super::query::QueryBuilder;
use super::types::{FetchMode, Record, RecordObserver, TaskConfig};
use crate::{Error, Result};

/// Lifecycle the host scheduler drives for each task.
///
/// `poll` takes `&mut self`, so one task never runs two cycles at once.
#[async_trait]
pub trait SourceTask: Send {
    fn start(&mut self, config: TaskConfig) -> Result<()>;

    async fn poll(&mut self) -> Result<Vec<Record>>;

    fn stop(&mut self);
}

struct Running {
    executor: PollExecutor,
    cursor: Cursor,
    mode: FetchMode,
    table: String,
}

/// Polls one table with its own cursor.
#[derive(Default)]
pub struct TableSourceTask {
    observer: Option<RecordObserver>,
    running: Option<Running>,
}

impl TableSourceTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(observer: RecordObserver) -> Self {
        Self {
            observer: Some(observer),
            running: None,
        }
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.running.as_ref().map(|r| &r.cursor)
    }

    pub fn fetch_mode(&self) -> Option<FetchMode> {
        self.running.as_ref().map(|r| r.mode)
    }

    pub fn state(&self) -> Option<PollState> {
        self.running.as_ref().map(|r| r.executor.state())
    }

    pub fn stats(&self) -> PollStats {
        self.running
            .as_ref()
            .map(|r| r.executor.stats())
            .unwrap_or_default()
    }

    /// Replace the zero cursor set by `start` with a checkpointed one.
    pub fn resume(&mut self, cursor: Cursor) -> Result<()> {
        let running = self
            .running
            .as_mut()
            .ok_or_else(|| Error::Config("task must be started before resuming".to_string()))?;
        info!(
            table = %running.table,
            last_id = %cursor.last_id,
            last_timestamp = %cursor.last_timestamp,
            offset = cursor.offset,
            "Resuming from checkpointed cursor"
        );
        running.cursor = cursor;
        Ok(())
    }
}

#[async_trait]
impl SourceTask for TableSourceTask {
    fn start(&mut self, config: TaskConfig) -> Result<()> {
        if config.max_rows <= 0 {
            return Err(Error::Config(format!(
                "max_poll_count must be positive, got {}",
                config.max_rows
            )));
        }

        let mode = match config.fetch_mode.as_deref() {
            Some(mode) => mode.parse::<FetchMode>()?,
            None => FetchMode::default(),
        };

        let builder = QueryBuilder::new(mode, config.table.clone(), config.quote_style)
            .with_incrementing_column(config.incrementing_column.clone())
            .with_timestamp_column(config.timestamp_column.clone())
            .with_custom_query(config.custom_query.clone())
            .with_qualified_columns(config.qualify_columns);

        let executor = PollExecutor::new(
            &builder,
            config.table.clone(),
            config.incrementing_column.clone(),
            config.timestamp_column.clone(),
            config.max_rows,
            config.table_schema.clone(),
            config.executor.clone(),
            self.observer.clone(),
        );

        info!(
            table = %config.table,
            mode = %mode,
            max_rows = config.max_rows,
            query = %executor.template(),
            "Source task started"
        );

        self.running = Some(Running {
            executor,
            cursor: Cursor::new(config.init_timestamp.as_deref()),
            mode,
            table: config.table,
        });
        Ok(())
    }

    async fn poll(&mut self) -> Result<Vec<Record>> {
        let running = self
            .running
            .as_mut()
            .ok_or_else(|| Error::Config("task polled before start".to_string()))?;
        running.executor.poll(&mut running.cursor).await
    }

    fn stop(&mut self) {
        // The connection belongs to the connector and is closed there.
        if let Some(running) = self.running.as_mut() {
            running.executor.stop();
            info!(table = %running.table, "Source task stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::quote::QuoteStyle;
    use crate::source::test_utils::{row, FakeTable};
    use crate::source::types::TableSchema;
    use serde_json::json;
    use std::sync::Arc;

    fn task_config(table: Arc<FakeTable>, mode: Option<&str>, max_rows: i64) -> TaskConfig {
        TaskConfig {
            table: "users".to_string(),
            fetch_mode: mode.map(str::to_string),
            incrementing_column: "id".to_string(),
            timestamp_column: "updated_at".to_string(),
            max_rows,
            custom_query: None,
            init_timestamp: None,
            timestamp_delay_seconds: None,
            qualify_columns: true,
            quote_style: QuoteStyle::DoubleQuote,
            table_schema: Arc::new(TableSchema::new("users").with_column("id", "int4")),
            executor: table,
        }
    }

    #[test]
    fn test_start_defaults_to_increment() {
        let mut task = TableSourceTask::new();
        task.start(task_config(Arc::new(FakeTable::with_ids(1..=2)), None, 10))
            .unwrap();

        assert_eq!(task.fetch_mode(), Some(FetchMode::Increment));
        assert_eq!(task.cursor(), Some(&Cursor::default()));
        assert_eq!(task.state(), Some(PollState::Idle));
    }

    #[test]
    fn test_start_rejects_non_positive_max_rows() {
        for max_rows in [0, -5] {
            let mut task = TableSourceTask::new();
            let err = task
                .start(task_config(Arc::new(FakeTable::with_ids(1..=2)), None, max_rows))
                .unwrap_err();
            assert!(matches!(err, Error::Config(_)));
            assert!(task.cursor().is_none());
        }
    }

    #[test]
    fn test_start_rejects_unknown_mode() {
        let mut task = TableSourceTask::new();
        let err = task
            .start(task_config(Arc::new(FakeTable::with_ids(1..=2)), Some("bulk"), 10))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFetchMode { .. }));
    }

    #[tokio::test]
    async fn test_poll_before_start() {
        let mut task = TableSourceTask::new();
        assert!(matches!(task.poll().await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_increment_completeness_with_growing_table() {
        let table = Arc::new(FakeTable::with_ids(1..=5));
        let mut task = TableSourceTask::new();
        task.start(task_config(table.clone(), Some("increment"), 2)).unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.extend(task.poll().await.unwrap().into_iter().map(|r| r.key));
        }
        table.insert(row(6, "2024-01-01T00:00:06"));
        table.insert(row(7, "2024-01-01T00:00:07"));

        loop {
            let batch = task.poll().await.unwrap();
            if batch.is_empty() {
                break;
            }
            seen.extend(batch.into_iter().map(|r| r.key));
        }

        assert_eq!(seen, (1..=7).map(|id| json!(id)).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_timestamp_watermark_is_monotonic() {
        let table = Arc::new(FakeTable::new(vec![
            row(9, "2024-01-01T00:00:01"),
            row(2, "2024-01-01T00:00:02"),
            row(4, "2024-01-01T00:00:02"),
            row(1, "2024-01-01T00:00:03"),
        ]));
        let mut task = TableSourceTask::new();
        task.start(task_config(table.clone(), Some("timestamp"), 2)).unwrap();

        let mut previous = (String::new(), 0_i64);
        let mut seen = Vec::new();
        loop {
            let batch = task.poll().await.unwrap();
            if batch.is_empty() {
                break;
            }
            seen.extend(batch.iter().map(|r| r.key.as_i64().unwrap()));

            let cursor = task.cursor().unwrap();
            let current = (
                cursor.last_timestamp.as_str().unwrap().to_string(),
                cursor.last_id.as_i64().unwrap(),
            );
            assert!(current > previous);
            previous = current;
        }

        assert_eq!(seen, vec![9, 2, 4, 1]);
    }

    #[tokio::test]
    async fn test_stop_then_poll() {
        let table = Arc::new(FakeTable::with_ids(1..=2));
        let mut task = TableSourceTask::new();
        task.start(task_config(table.clone(), None, 10)).unwrap();
        task.stop();

        assert_eq!(task.state(), Some(PollState::Stopped));
        assert!(matches!(task.poll().await, Err(Error::Shutdown)));
        assert!(!table.is_closed());
    }

    #[tokio::test]
    async fn test_resume_from_checkpoint() {
        let table = Arc::new(FakeTable::with_ids(1..=5));
        let mut task = TableSourceTask::new();
        assert!(task.resume(Cursor::default()).is_err());

        task.start(task_config(table, None, 10)).unwrap();
        let mut cursor = Cursor::default();
        cursor.advance(json!(3), None);
        cursor.advance_offset(3);
        task.resume(cursor).unwrap();

        let keys: Vec<_> = task.poll().await.unwrap().into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec![json!(4), json!(5)]);
    }
}
