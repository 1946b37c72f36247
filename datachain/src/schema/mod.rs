pub mod catalog;
pub mod inspector;
pub mod types;

pub use catalog::{ColumnSchema, SchemaCatalog, TableSchema};
pub use inspector::{build_catalog, inspect};
pub use types::{normalize_type, ColumnType};
