use async_trait::async_trait;
use std::time::Duration;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config, NoTls};
use tracing::{debug, error, info};

use super::params::bind_named;
use crate::config::{PostgresConfig, SslMode};
use crate::source::{Row, RowExecutor, SchemaDiscovery, SourceSession, Statement, TableSchema};
use crate::{Error, Result};

const DISCOVER_COLUMNS: &str = "SELECT column_name::text, udt_name::text \
     FROM information_schema.columns \
     WHERE table_schema::text = $1 AND table_name::text = $2 \
     ORDER BY ordinal_position";

/// A single PostgreSQL connection shared by the connector and its task.
pub struct PgSession {
    client: Client,
    connection_task: tokio::task::JoinHandle<()>,
}

impl PgSession {
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        if config.ssl_mode != SslMode::Disable {
            return Err(Error::Config(format!(
                "ssl_mode {:?} is not supported, use disable",
                config.ssl_mode
            )));
        }

        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "Connecting to PostgreSQL"
        );

        let mut pg_config = Config::new();
        pg_config
            .host(&config.host)
            .port(config.port)
            .dbname(&config.database)
            .user(&config.username)
            .password(&config.password)
            .application_name("pg-poll-source")
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs));

        let (client, connection) = pg_config
            .connect(NoTls)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let connection_task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("Connection error: {}", e);
            }
        });

        Ok(Self {
            client,
            connection_task,
        })
    }
}

/// Split `schema.table`; a bare name lives in `public`.
fn split_table(table: &str) -> (&str, &str) {
    match table.split_once('.') {
        Some((schema, name)) => (schema, name),
        None => ("public", table),
    }
}

/// Wrap a statement so every row comes back as one JSON object, keeping
/// the column order of the result set.
fn as_json_rows(sql: &str) -> String {
    format!("SELECT row_to_json(poll_batch)::text FROM ({}) AS poll_batch", sql)
}

#[async_trait]
impl RowExecutor for PgSession {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>> {
        let bound = bind_named(&statement.sql, &statement.parameters);
        let sql = as_json_rows(&bound.sql);
        debug!(sql = %sql, params = ?bound.values, "Executing poll statement");

        let params: Vec<&(dyn ToSql + Sync)> = bound
            .values
            .iter()
            .map(|v| v as &(dyn ToSql + Sync))
            .collect();

        let rows = self
            .client
            .query(sql.as_str(), &params)
            .await
            .map_err(|e| Error::QueryExecution {
                message: e.to_string(),
            })?;

        rows.iter()
            .map(|row| {
                let text: String = row.try_get(0).map_err(|e| Error::QueryExecution {
                    message: e.to_string(),
                })?;
                serde_json::from_str::<Row>(&text).map_err(Error::from)
            })
            .collect()
    }
}

#[async_trait]
impl SchemaDiscovery for PgSession {
    async fn discover(&self, table: &str) -> Result<TableSchema> {
        let (schema_name, table_name) = split_table(table);
        let rows = self
            .client
            .query(DISCOVER_COLUMNS, &[&schema_name, &table_name])
            .await
            .map_err(|e| Error::SchemaDiscovery {
                table: table.to_string(),
                message: e.to_string(),
            })?;

        let mut schema = TableSchema::new(table);
        for row in rows {
            let name: String = row.try_get(0)?;
            let data_type: String = row.try_get(1)?;
            schema = schema.with_column(name, data_type);
        }
        debug!(table = %table, columns = ?schema.columns, "Discovered columns");
        Ok(schema)
    }
}

#[async_trait]
impl SourceSession for PgSession {
    async fn authenticate(&self) -> Result<()> {
        self.client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        info!("Closing PostgreSQL connection");
        self.connection_task.abort();
        Ok(())
    }
}
