use crate::error::{DataChainError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static FENCE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*\s*\n?(.*?)```").unwrap()
});

static LIST_MARKER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[-*•]\s*|\d+[.)]\s*)").unwrap()
});

fn strip_fences(text: &str) -> &str {
    match FENCE_REGEX.captures(text) {
        Some(captures) => captures.get(1).map(|m| m.as_str()).unwrap_or(text),
        None => text,
    }
}

/// pull one sql statement out of a completion
pub fn extract_sql(text: &str) -> Result<String> {
    let text = text.trim();

    if text.is_empty() {
        return Err(DataChainError::Generation(
            "model returned empty output".to_string(),
        ));
    }

    let text = strip_fences(text).trim();

    let text = match text.find("SQLQuery:") {
        Some(idx) => &text[idx + "SQLQuery:".len()..],
        None => text,
    };

    let end = text
        .find("SQLResult:")
        .or_else(|| text.find("Answer:"))
        .unwrap_or(text.len());

    let sql = text[..end].trim();
    let sql = sql.strip_suffix(';').unwrap_or(sql).trim();

    if sql.is_empty() {
        return Err(DataChainError::Generation(
            "model output did not contain a sql statement".to_string(),
        ));
    }

    Ok(sql.to_string())
}

/// candidate table names from a selection completion, in the order given
pub fn parse_table_names(text: &str) -> Vec<String> {
    strip_fences(text.trim())
        .split(|c: char| c == '\n' || c == ',')
        .map(|item| LIST_MARKER_REGEX.replace(item.trim(), "").into_owned())
        .map(|item| {
            item.trim_matches(|c: char| c.is_whitespace() || "`'\"[];".contains(c))
                .to_string()
        })
        .filter(|item| !item.is_empty())
        .collect()
}
