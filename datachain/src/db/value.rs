use serde::Serialize;
use std::fmt;

/// a single cell, decoded into the small set of shapes every engine can produce
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
            Value::Blob(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<Option<&str>> for Value {
    fn from(value: Option<&str>) -> Self {
        value.map_or(Value::Null, |s| Value::Text(s.to_string()))
    }
}

/// rows returned by a successful statement
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// more rows were available than the fetch cap allowed
    pub truncated: bool,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            truncated: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// pipe-separated text table, used in prompts and in degraded answers
    pub fn to_text_table(&self) -> String {
        let mut lines = Vec::with_capacity(self.rows.len() + 2);
        lines.push(self.columns.join(" | "));
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            lines.push(cells.join(" | "));
        }
        if self.truncated {
            lines.push(format!("... (truncated after {} rows)", self.rows.len()));
        }
        lines.join("\n")
    }
}
