//! Seams to the database driver.
//!
//! The polling engine never opens connections itself; it hands built
//! statements to a [`RowExecutor`] and asks a [`SchemaDiscovery`] for the
//! table's columns once at connector start.

use async_trait::async_trait;

use super::query::Statement;
use super::types::{Row, TableSchema};
use crate::Result;

#[async_trait]
pub trait RowExecutor: Send + Sync {
    /// Run one statement and return its rows in result order.
    ///
    /// Failures are reported as [`crate::Error::QueryExecution`]. Timeouts
    /// and cancellation are up to the implementation.
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>>;
}

#[async_trait]
pub trait SchemaDiscovery: Send + Sync {
    /// Column names and declared types of `table`, in ordinal order.
    async fn discover(&self, table: &str) -> Result<TableSchema>;
}

/// A connection or session shared by a connector and the tasks it configures.
#[async_trait]
pub trait SourceSession: RowExecutor + SchemaDiscovery {
    async fn authenticate(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;
}
