//! One poll cycle: bind, execute, map rows to records, advance the cursor.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

use super::collaborator::RowExecutor;
use super::cursor::Cursor;
use super::query::{QueryBuilder, Statement};
use super::types::{is_usable_key, FetchMode, Record, RecordObserver, Row, TableSchema};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Executing,
    Stopped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStats {
    pub polls: u64,
    pub empty_polls: u64,
    pub failed_polls: u64,
    pub records: u64,
    pub total_poll_time_ms: u64,
}

/// Resets `Executing` to `Idle` when a cycle ends, including when the
/// poll future is dropped mid-query.
struct CycleGuard<'a> {
    state: &'a mut PollState,
}

impl<'a> CycleGuard<'a> {
    fn enter(state: &'a mut PollState) -> Self {
        *state = PollState::Executing;
        Self { state }
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if *self.state == PollState::Executing {
            *self.state = PollState::Idle;
        }
    }
}

pub struct PollExecutor {
    template: String,
    mode: FetchMode,
    table: String,
    incrementing_column: String,
    timestamp_column: String,
    max_rows: i64,
    schema: Arc<TableSchema>,
    rows: Arc<dyn RowExecutor>,
    observer: Option<RecordObserver>,
    state: PollState,
    stats: PollStats,
}

impl PollExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        builder: &QueryBuilder,
        table: impl Into<String>,
        incrementing_column: impl Into<String>,
        timestamp_column: impl Into<String>,
        max_rows: i64,
        schema: Arc<TableSchema>,
        rows: Arc<dyn RowExecutor>,
        observer: Option<RecordObserver>,
    ) -> Self {
        Self {
            template: builder.build(),
            mode: builder.mode(),
            table: table.into(),
            incrementing_column: incrementing_column.into(),
            timestamp_column: timestamp_column.into(),
            max_rows,
            schema,
            rows,
            observer,
            state: PollState::Idle,
            stats: PollStats::default(),
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn stats(&self) -> PollStats {
        self.stats.clone()
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// The statement the next cycle will issue for `cursor`.
    pub fn statement(&self, cursor: &Cursor) -> Statement {
        Statement {
            sql: self.template.clone(),
            parameters: cursor.parameters(
                self.mode,
                self.max_rows,
                self.schema.column_type(&self.incrementing_column),
                self.schema.column_type(&self.timestamp_column),
            ),
        }
    }

    pub fn stop(&mut self) {
        self.state = PollState::Stopped;
    }

    /// Run one poll cycle. The cursor is only written once every row of the
    /// batch has been mapped; any error leaves it untouched.
    pub async fn poll(&mut self, cursor: &mut Cursor) -> Result<Vec<Record>> {
        if self.state == PollState::Stopped {
            return Err(Error::Shutdown);
        }

        let statement = self.statement(cursor);
        let started = Instant::now();
        debug!(
            table = %self.table,
            mode = %self.mode,
            last_id = %cursor.last_id,
            last_timestamp = %cursor.last_timestamp,
            offset = cursor.effective_offset(self.mode),
            limit = self.max_rows,
            "Polling table"
        );

        let result = {
            let _cycle = CycleGuard::enter(&mut self.state);
            self.rows.execute(&statement).await
        };
        self.stats.polls += 1;
        self.stats.total_poll_time_ms += started.elapsed().as_millis() as u64;

        let rows = match result {
            Ok(rows) => rows,
            Err(e) => {
                self.stats.failed_polls += 1;
                warn!(table = %self.table, error = %e, "Poll query failed, cursor unchanged");
                return Err(e);
            }
        };

        let (records, advanced) = match self.map_rows(rows, cursor) {
            Ok(mapped) => mapped,
            Err(e) => {
                self.stats.failed_polls += 1;
                warn!(table = %self.table, error = %e, "Rejected batch, cursor unchanged");
                return Err(e);
            }
        };
        *cursor = advanced;

        if records.is_empty() {
            self.stats.empty_polls += 1;
        }
        self.stats.records += records.len() as u64;
        debug!(table = %self.table, count = records.len(), "{} published", records.len());

        if let Some(observer) = &self.observer {
            for record in &records {
                let key = record.key_string();
                trace!(table = %self.table, key = %key, "Record observed");
                observer(&key);
            }
        }

        Ok(records)
    }

    /// Map rows in result order, advancing a staged copy of the cursor per row.
    fn map_rows(&self, rows: Vec<Row>, cursor: &Cursor) -> Result<(Vec<Record>, Cursor)> {
        let mut staged = cursor.clone();
        let mut records = Vec::with_capacity(rows.len());

        for row in rows {
            let key = match row.get(&self.incrementing_column) {
                Some(value) if is_usable_key(value) => value.clone(),
                _ => {
                    return Err(Error::MissingKey {
                        column: self.incrementing_column.clone(),
                    })
                }
            };
            let timestamp = row
                .get(&self.timestamp_column)
                .filter(|v| !v.is_null())
                .cloned();

            staged.advance(key.clone(), timestamp);
            records.push(Record::new(key, row, self.schema.clone(), &self.table));
        }

        if self.mode == FetchMode::Increment {
            staged.advance_offset(records.len());
        }

        Ok((records, staged))
    }
}
