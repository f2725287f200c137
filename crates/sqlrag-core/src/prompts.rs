//! Prompt builders for the three model calls of a run.
//!
//! Each builder returns the full text of a single user message. Output
//! formats are strict JSON so the callers can parse without extraction
//! heuristics.

use crate::sql::SqlDialect;

/// Ask the model which columns of the retrieved tables matter for the
/// question. Expected output: `{"table": ["column", ...], ...}`.
pub fn column_selection_prompt(table_context: &str, question: &str) -> String {
    format!(
        r#"
You are given a user question and a set of table schemas from a SQL database. Return the names of the columns that are most related to the user question.
Use **only** the information in the schemas provided. Do not introduce columns that don't exist in the table.

Question: {question}
Tables information:
{table_context}

Guidelines to generate the output:
- Review the user question and the table schemas carefully.
- Select the columns that are most related to the question based on the column names and the overall table schema.
- You don't have to use every table or every column. Pick the ones that can possibly contain information that answers the question.
- Output must be JSON with no leading or trailing characters outside the opening and closing curly brackets.
- Use the table name as the key and the list of column names as the value.
- Copy table and column names exactly as they appear in the schema above. Do not change upper or lower case. Do not add or remove symbols.
- Put table and column names in double quotes.

Example of the output shape (table names are keys, lists of column names are values):
{{
"table 2": ["column 1", "column 5"],
"table 5": ["column 2", "column 3"]
}}
"#
    )
}

/// Ask the model for a first SQL draft. Expected output:
/// `{"query": ..., "confidence": ..., "explanation": ...}`.
pub fn generation_prompt(dialect: SqlDialect, context: &str, question: &str) -> String {
    format!(
        r#"
Given an input question, create a syntactically correct {dialect} query to run (use double quotes instead of backticks for identifiers).

Never query for all the columns from a specific table, only ask for a few relevant columns given the question.

Use only the table and column names that you can see in the schema description below. Do not query for columns that do not exist. Pay attention to which column is in which table. Qualify column names with the table name when needed.

Only use the tables listed below.
{context}

Question: {question}

Guidelines to generate the output:
- Output must be JSON in the shape shown below with no leading or trailing characters outside the opening and closing curly brackets.
- Review the input question and compare it with the tables information above.
{{
"query": "the SQL query to run",
"confidence": 0.0,
"explanation": "one sentence on how the query answers the question"
}}
"#,
        dialect = dialect.display_name()
    )
}

/// Ask the model to confirm or correct an existing SQL query.
pub fn refinement_prompt(
    dialect: SqlDialect,
    table_context: &str,
    question: &str,
    sql: &str,
) -> String {
    format!(
        r#"
You are given a user question, a SQL query that was previously generated to answer it, and a schema description showing the available tables and columns.

Review the SQL query against:
- The user question: does it answer the question fully and correctly?
- The schema: does it reference only existing tables and columns, and qualify columns where needed?
- Relevance: does it select only relevant columns (not all columns), with appropriate filters or joins?

If the SQL query is correct and optimal, return it as-is. Otherwise refine it to better meet the user's intent. The result must be a syntactically correct {dialect} query (use double quotes instead of backticks for identifiers).

Use **only** the information in the schema provided. Do not introduce columns or tables that don't exist.

Question: {question}
Previously generated SQL query: {sql}
Tables information:
{table_context}

Guidelines to generate the output:
- Output must be JSON in the shape shown below with no leading or trailing characters outside the opening and closing curly brackets.
{{
"query": "the final SQL query to run",
"confidence": 0.0,
"explanation": "what changed, or why the query was kept"
}}
"#,
        dialect = dialect.display_name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_prompt_carries_inputs() {
        let p = generation_prompt(SqlDialect::Duckdb, "- sales table", "total revenue?");
        assert!(p.contains("syntactically correct DuckDB query"));
        assert!(p.contains("- sales table"));
        assert!(p.contains("Question: total revenue?"));
        assert!(p.contains("\"query\":"));
    }

    #[test]
    fn test_refinement_prompt_includes_current_sql() {
        let p = refinement_prompt(SqlDialect::Sqlite, "- t", "q", "SELECT a FROM t");
        assert!(p.contains("Previously generated SQL query: SELECT a FROM t"));
        assert!(p.contains("SQLite"));
    }

    #[test]
    fn test_column_prompt_example_is_literal_json() {
        let p = column_selection_prompt("- t", "q");
        assert!(p.contains("\"table 2\": [\"column 1\", \"column 5\"]"));
        assert!(!p.contains("{{"));
    }
}
