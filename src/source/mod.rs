pub mod collaborator;
pub mod connector;
pub mod cursor;
pub mod executor;
pub mod query;
pub mod quote;
pub mod task;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use collaborator::{RowExecutor, SchemaDiscovery, SourceSession};
pub use connector::{SourceConnector, TableSourceConnector};
pub use cursor::Cursor;
pub use executor::{PollExecutor, PollState, PollStats};
pub use query::{Parameter, QueryBuilder, Statement};
pub use quote::{QuoteIdentifier, QuoteStyle};
pub use task::{SourceTask, TableSourceTask};
pub use types::*;
