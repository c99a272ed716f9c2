//! Identifier quoting strategies.
//!
//! Quoting is a stateless value handed to the query builder, so building a
//! statement never needs a live connection.

use postgres_protocol::escape::escape_identifier;
use serde::{Deserialize, Serialize};

pub trait QuoteIdentifier: Send + Sync {
    /// Quote a single identifier segment.
    fn quote_segment(&self, segment: &str) -> String;

    /// Quote a possibly `table.column` identifier segment by segment.
    fn quote_identifier(&self, identifier: &str) -> String {
        identifier
            .split('.')
            .map(|segment| self.quote_segment(segment))
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStyle {
    /// ANSI / PostgreSQL: `"name"`
    #[default]
    DoubleQuote,
    /// MySQL: `` `name` ``
    Backtick,
    /// SQL Server: `[name]`
    Bracket,
}

impl QuoteIdentifier for QuoteStyle {
    fn quote_segment(&self, segment: &str) -> String {
        match self {
            QuoteStyle::DoubleQuote => escape_identifier(segment),
            QuoteStyle::Backtick => format!("`{}`", segment.replace('`', "``")),
            QuoteStyle::Bracket => format!("[{}]", segment.replace(']', "]]")),
        }
    }
}
