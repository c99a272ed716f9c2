use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::collaborator::{RowExecutor, SourceSession};
use super::types::{TableSchema, TaskConfig, DEFAULT_ID_COLUMN, DEFAULT_UPDATED_AT_COLUMN};
use crate::config::SourceConfig;
use crate::{Error, Result};

/// Lifecycle the host drives for a connector: discover once, then hand out
/// task configurations.
#[async_trait]
pub trait SourceConnector: Send {
    async fn start(&mut self, properties: SourceConfig) -> Result<()>;

    fn task_configs(&self, max_tasks: usize) -> Result<Vec<TaskConfig>>;

    async fn stop(&mut self) -> Result<()>;
}

struct Discovered {
    properties: SourceConfig,
    schema: Arc<TableSchema>,
}

/// Connector for a single table behind a shared session.
pub struct TableSourceConnector<S> {
    session: Arc<S>,
    discovered: Option<Discovered>,
}

impl<S: SourceSession + 'static> TableSourceConnector<S> {
    pub fn new(session: S) -> Self {
        Self::with_session(Arc::new(session))
    }

    pub fn with_session(session: Arc<S>) -> Self {
        Self {
            session,
            discovered: None,
        }
    }

    pub fn table_schema(&self) -> Option<Arc<TableSchema>> {
        self.discovered.as_ref().map(|d| d.schema.clone())
    }
}

#[async_trait]
impl<S: SourceSession + 'static> SourceConnector for TableSourceConnector<S> {
    async fn start(&mut self, properties: SourceConfig) -> Result<()> {
        if properties.table.trim().is_empty() {
            return Err(Error::Config("source table must be set".to_string()));
        }

        self.session.authenticate().await?;
        info!(table = %properties.table, "Authenticated, discovering table schema");

        let schema = self.session.discover(&properties.table).await?;
        if schema.is_empty() {
            return Err(Error::SchemaDiscovery {
                table: properties.table.clone(),
                message: "Failed to load table schema, its empty.".to_string(),
            });
        }

        info!(
            table = %properties.table,
            columns = schema.columns.len(),
            "Table schema discovered"
        );
        self.discovered = Some(Discovered {
            properties,
            schema: Arc::new(schema),
        });
        Ok(())
    }

    fn task_configs(&self, max_tasks: usize) -> Result<Vec<TaskConfig>> {
        let discovered = self
            .discovered
            .as_ref()
            .ok_or_else(|| Error::Config("connector must be started first".to_string()))?;
        let properties = &discovered.properties;

        // Each task keeps an independent cursor over the whole table, so
        // more than one would re-emit every row.
        if max_tasks > 1 {
            warn!(
                table = %properties.table,
                max_tasks,
                "Row space is not partitioned; creating a single task"
            );
        }

        let executor: Arc<dyn RowExecutor> = self.session.clone();
        Ok(vec![TaskConfig {
            table: properties.table.clone(),
            fetch_mode: properties.fetch_mode.clone(),
            incrementing_column: properties
                .incrementing_column_name
                .clone()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_ID_COLUMN.to_string()),
            timestamp_column: properties
                .timestamp_column_name
                .clone()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_UPDATED_AT_COLUMN.to_string()),
            max_rows: properties.max_poll_count,
            custom_query: properties.custom_query.clone(),
            init_timestamp: properties.init_timestamp.clone(),
            timestamp_delay_seconds: properties.timestamp_delay_seconds,
            qualify_columns: properties.qualify_columns,
            quote_style: properties.quote_style,
            table_schema: discovered.schema.clone(),
            executor,
        }])
    }

    async fn stop(&mut self) -> Result<()> {
        info!("Closing source session");
        self.session.close().await
    }
}
