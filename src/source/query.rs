//! Statement templates for the two fetch modes.
//!
//! A template carries named placeholders (`:limit`, `:offset`, `:lastid`,
//! `:timestamp`) that the row executor binds from a [`Statement`]'s
//! parameters. Templates depend only on configuration, so the same cursor
//! always yields the same statement.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::quote::QuoteIdentifier;
use super::types::{FetchMode, DEFAULT_ID_COLUMN, DEFAULT_UPDATED_AT_COLUMN};

pub const PARAM_LIMIT: &str = "limit";
pub const PARAM_OFFSET: &str = "offset";
pub const PARAM_LAST_ID: &str = "lastid";
pub const PARAM_TIMESTAMP: &str = "timestamp";

/// Trailing clauses that would clash with the mode-specific suffix.
static TRAILING_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\b(ORDER\s+BY|GROUP\s+BY|LIMIT|OFFSET)\b.*$").expect("valid regex")
});

static WHERE_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bWHERE\b").expect("valid regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: &'static str,
    pub value: Value,
    /// Declared column type the value is compared against, when known.
    pub declared_type: Option<String>,
}

/// A template plus the values bound to its placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub parameters: Vec<Parameter>,
}

impl Statement {
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.parameter(name).map(|p| &p.value)
    }
}

pub struct QueryBuilder {
    mode: FetchMode,
    table: String,
    incrementing_column: String,
    timestamp_column: String,
    custom_query: Option<String>,
    qualify_columns: bool,
    quoter: Box<dyn QuoteIdentifier>,
}

impl QueryBuilder {
    pub fn new(mode: FetchMode, table: impl Into<String>, quoter: impl QuoteIdentifier + 'static) -> Self {
        Self {
            mode,
            table: table.into(),
            incrementing_column: DEFAULT_ID_COLUMN.to_string(),
            timestamp_column: DEFAULT_UPDATED_AT_COLUMN.to_string(),
            custom_query: None,
            qualify_columns: true,
            quoter: Box::new(quoter),
        }
    }

    pub fn with_incrementing_column(mut self, column: impl Into<String>) -> Self {
        self.incrementing_column = column.into();
        self
    }

    pub fn with_timestamp_column(mut self, column: impl Into<String>) -> Self {
        self.timestamp_column = column.into();
        self
    }

    pub fn with_custom_query(mut self, query: Option<String>) -> Self {
        self.custom_query = query.filter(|q| !q.trim().is_empty());
        self
    }

    /// Use `table.column` (true) or bare column names (false).
    pub fn with_qualified_columns(mut self, qualify: bool) -> Self {
        self.qualify_columns = qualify;
        self
    }

    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    /// Build the parameterized statement template.
    pub fn build(&self) -> String {
        let (condition, tail) = match self.mode {
            FetchMode::Increment => (None, self.increment_tail()),
            FetchMode::Timestamp => (Some(self.timestamp_condition()), self.timestamp_tail()),
        };

        let base = match &self.custom_query {
            Some(custom) => strip_trailing_clauses(custom),
            None => format!("SELECT * FROM {}", self.quoter.quote_identifier(&self.table)),
        };

        match condition {
            Some(condition) => {
                let connective = if WHERE_CLAUSE.is_match(&top_level(&base)) {
                    "AND"
                } else {
                    "WHERE"
                };
                format!("{} {} {} {}", base, connective, condition, tail)
            }
            None => format!("{} {}", base, tail),
        }
    }

    fn column(&self, column: &str) -> String {
        if self.qualify_columns {
            self.quoter
                .quote_identifier(&format!("{}.{}", self.table, column))
        } else {
            self.quoter.quote_identifier(column)
        }
    }

    fn increment_tail(&self) -> String {
        format!(
            "ORDER BY {} LIMIT :{} OFFSET :{}",
            self.column(&self.incrementing_column),
            PARAM_LIMIT,
            PARAM_OFFSET
        )
    }

    // Rows past the watermark timestamp, plus rows tied on it with a higher key.
    fn timestamp_condition(&self) -> String {
        let inc = self.column(&self.incrementing_column);
        let ts = self.column(&self.timestamp_column);
        format!(
            "(({ts} = :{t} AND {inc} > :{id}) OR {ts} > :{t})",
            ts = ts,
            inc = inc,
            t = PARAM_TIMESTAMP,
            id = PARAM_LAST_ID
        )
    }

    fn timestamp_tail(&self) -> String {
        format!(
            "ORDER BY {}, {} LIMIT :{} OFFSET :{}",
            self.column(&self.timestamp_column),
            self.column(&self.incrementing_column),
            PARAM_LIMIT,
            PARAM_OFFSET
        )
    }
}

/// Drop everything from the first top-level ORDER BY, GROUP BY, LIMIT or
/// OFFSET on, along with a trailing semicolon.
pub fn strip_trailing_clauses(query: &str) -> String {
    let end = TRAILING_CLAUSE
        .find(&top_level(query))
        .map_or(query.len(), |m| m.start());
    query[..end]
        .trim_end()
        .trim_end_matches(';')
        .trim_end()
        .to_string()
}

/// Blank out quoted text and parenthesized sub-expressions, keeping byte
/// offsets, so keyword matches only land in the outer statement.
fn top_level(query: &str) -> String {
    let mut masked = String::with_capacity(query.len());
    let mut quote: Option<char> = None;
    let mut depth = 0_usize;

    for c in query.chars() {
        let hidden = match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                true
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    true
                }
                '(' => {
                    depth += 1;
                    true
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    true
                }
                _ => depth > 0,
            },
        };

        if hidden {
            masked.extend(std::iter::repeat(' ').take(c.len_utf8()));
        } else {
            masked.push(c);
        }
    }
    masked
}
