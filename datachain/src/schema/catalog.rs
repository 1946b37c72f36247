use super::types::ColumnType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    /// type name as the engine reported it
    pub declared_type: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    /// one-line prompt form: `orders(id integer not null, amount real, customer text)`
    pub fn render(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                if c.nullable {
                    format!("{} {}", c.name, c.column_type)
                } else {
                    format!("{} {} not null", c.name, c.column_type)
                }
            })
            .collect();
        format!("{}({})", self.name, columns.join(", "))
    }

    /// names only, for the table selection prompt
    pub fn render_names(&self) -> String {
        let columns: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        format!("{}({})", self.name, columns.join(", "))
    }
}

/// snapshot of every queryable table, keyed by table name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaCatalog {
    tables: BTreeMap<String, TableSchema>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: TableSchema) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    /// case-insensitive lookup returning the catalog's own spelling
    pub fn resolve(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.tables.get_key_value(name) {
            return Some(key.as_str());
        }
        self.tables
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// full schema text for exactly the named tables, one table per line.
    /// unknown names are skipped.
    pub fn render_tables(&self, names: &[String]) -> String {
        names
            .iter()
            .filter_map(|name| self.tables.get(name))
            .map(TableSchema::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// table and column names only, no types and no data
    pub fn render_names(&self) -> String {
        self.tables
            .values()
            .map(TableSchema::render_names)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
