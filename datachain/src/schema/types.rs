use serde::{Deserialize, Serialize};
use std::fmt;

/// engine-agnostic column type vocabulary used in prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Blob,
    Boolean,
    Date,
    Timestamp,
    Other,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Real => "real",
            ColumnType::Text => "text",
            ColumnType::Blob => "blob",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Other => "other",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// map an engine-declared type name onto the shared vocabulary.
///
/// sqlite affinity order is applied first (int, then char/clob/text, then
/// blob, then real/floa/doub) so that sqlite's loose declarations land where
/// sqlite itself would store them; the date/time/boolean names the other
/// engines use are checked before that so `tinyint(1)` and `datetime` are
/// not swallowed by the int and text rules.
pub fn normalize_type(declared: &str) -> ColumnType {
    let lowered = declared.trim().to_lowercase();

    if lowered.is_empty() {
        // no declared type means blob affinity in sqlite
        return ColumnType::Blob;
    }

    if lowered.starts_with("tinyint(1)") || lowered.starts_with("bool") {
        return ColumnType::Boolean;
    }

    // strip length/precision arguments, e.g. varchar(20), numeric(10,2)
    let base = lowered.split('(').next().unwrap_or(&lowered).trim();

    if base.contains("timestamp") || base.contains("datetime") {
        return ColumnType::Timestamp;
    }
    if base == "date" {
        return ColumnType::Date;
    }
    if base.contains("interval") || base.starts_with("time") {
        return ColumnType::Text;
    }
    if base.contains("int") || base.contains("serial") {
        return ColumnType::Integer;
    }
    if base.contains("char")
        || base.contains("clob")
        || base.contains("text")
        || base.contains("uuid")
        || base.contains("json")
        || base.contains("enum")
        || base == "set"
        || base == "name"
    {
        return ColumnType::Text;
    }
    if base.contains("blob") || base.contains("bytea") || base.contains("binary") {
        return ColumnType::Blob;
    }
    if base.contains("real")
        || base.contains("floa")
        || base.contains("doub")
        || base.contains("numeric")
        || base.contains("decimal")
        || base == "money"
    {
        return ColumnType::Real;
    }

    ColumnType::Other
}
