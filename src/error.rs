//! Error types and result handling for pg-poll-source.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! # Example
//!
//! ```rust
//! use pg_poll_source::{Error, Result};
//!
//! fn discover_users() -> Result<()> {
//!     Err(Error::SchemaDiscovery {
//!         table: "users".to_string(),
//!         message: "no columns returned".to_string(),
//!     })
//! }
//!
//! match discover_users() {
//!     Ok(()) => println!("Discovered"),
//!     Err(Error::SchemaDiscovery { table, .. }) => eprintln!("Schema missing for {}", table),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for pg-poll-source operations.
///
/// Source-side failures surface with the cursor left exactly as it was
/// before the failed call, so a caller-driven retry is always safe.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error, e.g. a non-positive `max_poll_count`.
    #[error("Configuration error: {0}")]
    Config(String),

    /// PostgreSQL client or protocol error.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Kafka client or producer error.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// JSON serialization error when encoding records or checkpoints.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error, typically from checkpoint file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication or connection failure against the data source.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The configured table's schema came back empty or could not be read.
    #[error("Schema discovery failed for table '{table}': {message}")]
    SchemaDiscovery {
        /// Table that was being discovered
        table: String,
        /// Description of the failure
        message: String,
    },

    /// Unrecognized fetch mode string.
    #[error("Incorrect fetch mode - {mode}, available: [increment, timestamp]")]
    InvalidFetchMode {
        /// The rejected mode
        mode: String,
    },

    /// The row-execution collaborator failed to run a statement.
    #[error("Query execution error: {message}")]
    QueryExecution {
        /// Description of the failure
        message: String,
    },

    /// A fetched row has no usable value in the incrementing column.
    #[error("Row is missing a usable key in incrementing column '{column}'")]
    MissingKey {
        /// The incrementing column that was looked up
        column: String,
    },

    /// The task was stopped, or a graceful shutdown was requested.
    ///
    /// This is not really an error but uses the error mechanism
    /// to cleanly exit the polling loop.
    #[error("Shutdown requested")]
    Shutdown,
}

/// A convenient Result type alias for pg-poll-source operations.
///
/// This is equivalent to `std::result::Result<T, pg_poll_source::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
