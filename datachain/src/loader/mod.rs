pub mod inference;

pub use inference::{infer_cell, infer_columns, merge_types, CellType};

use crate::error::{DataChainError, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedTable {
    pub name: String,
    pub source: PathBuf,
    pub columns: Vec<(String, CellType)>,
    pub rows: usize,
}

/// import a csv file, or every `*.csv` file directly inside a directory, into
/// the sqlite database at `db_path`. one table per file, one transaction per
/// table.
#[tracing::instrument(skip_all, fields(db = %db_path.display(), source = %source.display()))]
pub fn load_csv(db_path: &Path, source: &Path) -> Result<Vec<LoadedTable>> {
    let files = csv_files(source)?;
    let mut conn = Connection::open(db_path)
        .map_err(|e| DataChainError::Load(format!("{}: {}", db_path.display(), e)))?;

    let mut used_names = HashSet::new();
    let mut loaded = Vec::with_capacity(files.len());
    for file in files {
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = unique_name(sanitize_identifier(&stem, "table"), &mut used_names);
        let table = load_file(&mut conn, &file, name)?;
        tracing::info!(
            table = %table.name,
            rows = table.rows,
            columns = table.columns.len(),
            "csv file loaded"
        );
        loaded.push(table);
    }

    Ok(loaded)
}

fn csv_files(source: &Path) -> Result<Vec<PathBuf>> {
    if source.is_file() {
        return Ok(vec![source.to_path_buf()]);
    }
    if !source.is_dir() {
        return Err(DataChainError::Load(format!(
            "{}: no such file or directory",
            source.display()
        )));
    }

    let entries = std::fs::read_dir(source)
        .map_err(|e| DataChainError::Load(format!("{}: {}", source.display(), e)))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(DataChainError::Load(format!(
            "{}: no csv files found",
            source.display()
        )));
    }
    Ok(files)
}

fn load_file(conn: &mut Connection, path: &Path, name: String) -> Result<LoadedTable> {
    let load_err = |e: &dyn std::fmt::Display| DataChainError::Load(format!("{}: {}", path.display(), e));

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| load_err(&e))?;

    let headers = reader.headers().map_err(|e| load_err(&e))?.clone();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(load_err(&"missing header row"));
    }

    let records = reader
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| load_err(&e))?;

    let mut used_columns = HashSet::new();
    let column_names: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            let fallback = format!("column_{}", i + 1);
            unique_name(sanitize_identifier(header, &fallback), &mut used_columns)
        })
        .collect();
    let types = infer_columns(column_names.len(), records.iter().map(|r| r.iter()));

    let columns_sql = column_names
        .iter()
        .zip(&types)
        .map(|(column, ty)| format!("\"{}\" {}", column, ty.as_sql()))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; column_names.len()].join(", ");

    let tx = conn.transaction().map_err(|e| load_err(&e))?;
    tx.execute(&format!("DROP TABLE IF EXISTS \"{}\"", name), [])
        .map_err(|e| load_err(&e))?;
    tx.execute(&format!("CREATE TABLE \"{}\" ({})", name, columns_sql), [])
        .map_err(|e| load_err(&e))?;
    {
        let mut insert = tx
            .prepare(&format!("INSERT INTO \"{}\" VALUES ({})", name, placeholders))
            .map_err(|e| load_err(&e))?;
        for record in &records {
            let values = types
                .iter()
                .enumerate()
                .map(|(i, ty)| to_sql_value(record.get(i).unwrap_or(""), *ty));
            insert
                .execute(rusqlite::params_from_iter(values))
                .map_err(|e| load_err(&e))?;
        }
    }
    tx.commit().map_err(|e| load_err(&e))?;

    Ok(LoadedTable {
        name,
        source: path.to_path_buf(),
        columns: column_names.into_iter().zip(types).collect(),
        rows: records.len(),
    })
}

fn to_sql_value(cell: &str, ty: CellType) -> SqlValue {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return SqlValue::Null;
    }
    match ty {
        CellType::Integer => trimmed
            .parse::<i64>()
            .map(SqlValue::Integer)
            .unwrap_or_else(|_| SqlValue::Text(cell.to_string())),
        CellType::Real => trimmed
            .parse::<f64>()
            .map(SqlValue::Real)
            .unwrap_or_else(|_| SqlValue::Text(cell.to_string())),
        CellType::Text => SqlValue::Text(cell.to_string()),
    }
}

/// identifiers safe to use unquoted: ascii alphanumerics and `_`, never
/// starting with a digit
pub fn sanitize_identifier(raw: &str, fallback: &str) -> String {
    let mut name: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.chars().all(|c| c == '_') {
        return fallback.to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

fn unique_name(base: String, used: &mut HashSet<String>) -> String {
    let mut name = base.clone();
    let mut suffix = 2;
    while !used.insert(name.to_lowercase()) {
        name = format!("{}_{}", base, suffix);
        suffix += 1;
    }
    name
}
