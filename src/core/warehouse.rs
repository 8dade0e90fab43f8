//! Read-only query access to the data warehouse

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// A positional bind value for a query placeholder (`?`).
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Fixed(i64),
    Text(String),
}

/// One result row. Column names are matched case-insensitively since the
/// warehouse reports them upper-cased.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: HashMap<String, Value>,
}

impl Row {
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: AsRef<str>,
    {
        Row {
            values: cells
                .into_iter()
                .map(|(name, value)| (name.as_ref().to_uppercase(), value))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(&column.to_uppercase())
    }

    /// Text content of a column; numbers are rendered as their JSON text.
    pub fn text(&self, column: &str) -> Option<String> {
        match self.get(column)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn query(&self, statement: &str, bindings: &[Binding]) -> Result<Vec<Row>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_lookup_is_case_insensitive() {
        let row = Row::new([
            ("TRADE_TIME", json!("1700000000.000000000")),
            ("avg_price", json!(25000.5)),
            ("URL", Value::Null),
        ]);
        assert_eq!(
            row.text("trade_time").as_deref(),
            Some("1700000000.000000000")
        );
        assert_eq!(row.text("AVG_PRICE").as_deref(), Some("25000.5"));
        assert_eq!(row.text("url"), None);
        assert!(row.get("missing").is_none());
    }
}
