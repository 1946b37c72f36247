use serde::Serialize;

/// storage class inferred for a csv column. variants are ordered so that
/// merging two inferences keeps the wider one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Integer,
    Real,
    Text,
}

impl CellType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CellType::Integer => "INTEGER",
            CellType::Real => "REAL",
            CellType::Text => "TEXT",
        }
    }
}

/// type of a single cell; `None` for an empty cell, which says nothing
pub fn infer_cell(cell: &str) -> Option<CellType> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    if cell.parse::<i64>().is_ok() {
        return Some(CellType::Integer);
    }
    // "nan" and "inf" parse as floats but are text in a spreadsheet
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(CellType::Real),
        _ => Some(CellType::Text),
    }
}

pub fn merge_types(lhs: Option<CellType>, rhs: Option<CellType>) -> Option<CellType> {
    match (lhs, rhs) {
        (Some(l), Some(r)) => Some(l.max(r)),
        (l, None) => l,
        (None, r) => r,
    }
}

/// fold every cell of every column; all-empty columns fall back to text
pub fn infer_columns<'a, R, C>(width: usize, rows: R) -> Vec<CellType>
where
    R: IntoIterator<Item = C>,
    C: IntoIterator<Item = &'a str>,
{
    let mut types: Vec<Option<CellType>> = vec![None; width];
    for row in rows {
        for (slot, cell) in types.iter_mut().zip(row) {
            *slot = merge_types(*slot, infer_cell(cell));
        }
    }
    types
        .into_iter()
        .map(|t| t.unwrap_or(CellType::Text))
        .collect()
}
