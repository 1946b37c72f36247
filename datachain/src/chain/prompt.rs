use super::generator::Correction;
use crate::db::EngineKind;

pub const SELECT_TABLES_SYSTEM_PROMPT: &str =
    "you choose which database tables are needed to answer a question. \
     reply with table names only, one per line, most relevant first. \
     use only names from the list. no markdown, no commentary.";

pub const ANSWER_SYSTEM_PROMPT: &str =
    "you answer questions using only the sql result you are given. \
     be concise and state the numbers or values from the result. \
     never invent rows, columns or values that are not in the result.";

pub fn sql_system_prompt(dialect: EngineKind) -> String {
    format!(
        "you translate questions into a single {} query. \
         use only the tables and columns listed in the schema. \
         output only the sql statement. no markdown, no commentary, no explanation.",
        dialect
    )
}

pub fn build_selection_prompt(tables_text: &str, question: &str) -> String {
    format!(
        "tables:\n{}\n\nquestion: {}\n\nrelevant tables:",
        tables_text, question
    )
}

pub fn build_query_prompt(
    dialect: EngineKind,
    schema_text: &str,
    question: &str,
    max_rows: usize,
    correction: Option<&Correction>,
) -> String {
    let prompt = format!(
        "write a {} query that answers the question.\n\
         - query only the tables below.\n\
         - unless the question asks for a specific number of rows, return at most {} rows.\n\
         - select only the columns needed to answer.\n\
         - output only the sql statement.\n\n\
         schema:\n{}\n\nquestion: {}",
        dialect, max_rows, schema_text, question
    );

    match correction {
        None => prompt,
        Some(correction) => format!(
            "{}\n\nyour previous query failed.\n\
             previous query:\n{}\n\
             error:\n{}\n\
             return one corrected {} statement. no notes.",
            prompt, correction.sql, correction.error, dialect
        ),
    }
}

pub fn build_answer_prompt(question: &str, sql: &str, result_text: &str) -> String {
    format!(
        "question: {}\n\nsql query:\n{}\n\nsql result:\n{}\n\nanswer:",
        question, sql, result_text
    )
}
