//! Named placeholder binding for tokio-postgres.
//!
//! tokio-postgres only understands positional `$n` parameters, and a typed
//! parameter has to match the column it is compared against. Every named
//! placeholder is therefore sent as text and cast to the declared column
//! type on the server: `:lastid` becomes `CAST($1::text AS "int4")`.

use postgres_protocol::escape::escape_identifier;
use serde_json::Value;

use crate::source::Parameter;

pub struct BoundStatement {
    pub sql: String,
    pub values: Vec<Option<String>>,
}

/// Rewrite `:name` placeholders into positional text parameters.
///
/// String literals, quoted identifiers and `::type` casts are left alone, as
/// are placeholders with no matching parameter. A name used twice binds once.
pub fn bind_named(sql: &str, parameters: &[Parameter]) -> BoundStatement {
    let mut out = String::with_capacity(sql.len() + 32);
    let mut order: Vec<&Parameter> = Vec::new();
    let mut chars = sql.char_indices().peekable();
    let mut quote: Option<char> = None;

    while let Some((i, c)) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
            }
            ':' if matches!(chars.peek(), Some((_, ':'))) => {
                out.push_str("::");
                chars.next();
            }
            ':' => {
                let start = i + 1;
                let mut end = start;
                while let Some(&(j, n)) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        end = j + n.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let name = &sql[start..end];
                match parameters.iter().find(|p| !name.is_empty() && p.name == name) {
                    Some(parameter) => {
                        let index = match order.iter().position(|p| p.name == parameter.name) {
                            Some(existing) => existing + 1,
                            None => {
                                order.push(parameter);
                                order.len()
                            }
                        };
                        out.push_str(&format!(
                            "CAST(${}::text AS {})",
                            index,
                            escape_identifier(&cast_type(parameter))
                        ));
                    }
                    None => {
                        out.push(':');
                        out.push_str(name);
                    }
                }
            }
            _ => out.push(c),
        }
    }

    BoundStatement {
        sql: out,
        values: order.iter().map(|p| to_text(&p.value)).collect(),
    }
}

fn cast_type(parameter: &Parameter) -> String {
    if let Some(declared) = &parameter.declared_type {
        return declared.clone();
    }
    match &parameter.value {
        Value::Number(n) if n.is_i64() || n.is_u64() => "int8".to_string(),
        Value::Number(_) => "float8".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Array(_) | Value::Object(_) => "jsonb".to_string(),
        _ => "text".to_string(),
    }
}

fn to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
