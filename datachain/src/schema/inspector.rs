use super::catalog::{ColumnSchema, SchemaCatalog, TableSchema};
use super::types::normalize_type;
use crate::db::{Database, RawColumn};
use crate::error::Result;

/// enumerate every table and column the connection can see
#[tracing::instrument(skip(db), fields(engine = %db.kind()))]
pub async fn inspect(db: &dyn Database) -> Result<SchemaCatalog> {
    let raw = db.describe().await?;
    let catalog = build_catalog(raw);

    tracing::info!(
        tables = catalog.len(),
        "schema inspected"
    );
    Ok(catalog)
}

/// group raw column rows by table, keeping column order as reported
pub fn build_catalog(raw: Vec<RawColumn>) -> SchemaCatalog {
    let mut current: Option<TableSchema> = None;
    let mut catalog = SchemaCatalog::new();

    for column in raw {
        let same_table = current
            .as_ref()
            .map(|t| t.name == column.table)
            .unwrap_or(false);

        if !same_table {
            if let Some(table) = current.take() {
                merge_into(&mut catalog, table);
            }
            current = Some(TableSchema {
                name: column.table.clone(),
                columns: Vec::new(),
            });
        }

        if let Some(table) = current.as_mut() {
            table.columns.push(ColumnSchema {
                column_type: normalize_type(&column.declared_type),
                name: column.name,
                declared_type: column.declared_type,
                nullable: column.nullable,
            });
        }
    }

    if let Some(table) = current.take() {
        merge_into(&mut catalog, table);
    }

    catalog
}

/// drivers report rows grouped by table, but tolerate interleaving anyway
fn merge_into(catalog: &mut SchemaCatalog, table: TableSchema) {
    match catalog.get(&table.name).cloned() {
        Some(mut existing) => {
            existing.columns.extend(table.columns);
            catalog.insert(existing);
        }
        None => catalog.insert(table),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteDatabase;
    use crate::schema::types::ColumnType;

    fn raw(table: &str, name: &str, declared: &str, nullable: bool) -> RawColumn {
        RawColumn {
            table: table.to_string(),
            name: name.to_string(),
            declared_type: declared.to_string(),
            nullable,
        }
    }

    #[test]
    fn test_build_catalog_groups_columns() {
        let catalog = build_catalog(vec![
            raw("orders", "id", "integer", false),
            raw("orders", "amount", "numeric(10,2)", true),
            raw("customers", "name", "character varying", true),
        ]);

        assert_eq!(catalog.table_names(), vec!["customers", "orders"]);
        let orders = catalog.get("orders").unwrap();
        assert_eq!(orders.columns.len(), 2);
        assert_eq!(orders.columns[1].column_type, ColumnType::Real);
        assert_eq!(orders.columns[1].declared_type, "numeric(10,2)");
    }

    #[test]
    fn test_build_catalog_tolerates_interleaving() {
        let catalog = build_catalog(vec![
            raw("a", "x", "int", true),
            raw("b", "y", "text", true),
            raw("a", "z", "text", true),
        ]);
        let a = catalog.get("a").unwrap();
        let names: Vec<&str> = a.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["x", "z"]);
    }

    #[tokio::test]
    async fn test_inspect_sqlite() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, amount REAL, customer TEXT);
             CREATE TABLE notes (body);",
        )
        .unwrap();
        let db = SqliteDatabase::from_connection(conn);

        let catalog = inspect(&db).await.unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.get("orders").unwrap().render(),
            "orders(id integer, amount real, customer text)"
        );
        assert_eq!(
            catalog.get("notes").unwrap().columns[0].column_type,
            ColumnType::Blob
        );
    }
}
