//! SQL dialects and statement validation.
//!
//! The target dialect is fixed per deployment and resolved once from
//! configuration into a [`SqlDialect`]. Syntax validity means "the
//! `sqlparser` parser for that dialect accepts the text and it contains at
//! least one statement".

use serde::{Deserialize, Serialize};
use sqlparser::ast::{Query, Select, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::{
    AnsiDialect, Dialect, DuckDbDialect, GenericDialect, MySqlDialect, PostgreSqlDialect,
    SQLiteDialect,
};
use sqlparser::parser::{Parser, ParserError};
use std::fmt;
use std::str::FromStr;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    Sqlite,
    #[serde(alias = "postgresql")]
    Postgres,
    Duckdb,
    Mysql,
    Ansi,
    Generic,
}

impl SqlDialect {
    /// Name used inside prompts ("create a syntactically correct ... query").
    pub fn display_name(&self) -> &'static str {
        match self {
            SqlDialect::Sqlite => "SQLite",
            SqlDialect::Postgres => "PostgreSQL",
            SqlDialect::Duckdb => "DuckDB",
            SqlDialect::Mysql => "MySQL",
            SqlDialect::Ansi => "ANSI SQL",
            SqlDialect::Generic => "SQL",
        }
    }

    fn parser_dialect(&self) -> Box<dyn Dialect> {
        match self {
            SqlDialect::Sqlite => Box::new(SQLiteDialect {}),
            SqlDialect::Postgres => Box::new(PostgreSqlDialect {}),
            SqlDialect::Duckdb => Box::new(DuckDbDialect {}),
            SqlDialect::Mysql => Box::new(MySqlDialect {}),
            SqlDialect::Ansi => Box::new(AnsiDialect {}),
            SqlDialect::Generic => Box::new(GenericDialect {}),
        }
    }

    /// Parse `sql` into statements.
    pub fn parse(&self, sql: &str) -> Result<Vec<Statement>, ParserError> {
        let dialect = self.parser_dialect();
        Parser::parse_sql(dialect.as_ref(), sql)
    }

    /// True if `sql` parses and is not empty.
    pub fn is_valid(&self, sql: &str) -> bool {
        matches!(self.parse(sql), Ok(statements) if !statements.is_empty())
    }

    /// Check that `sql` is made only of read queries.
    ///
    /// Writes nested inside a query are refused too: data-modifying CTEs,
    /// `WITH ... INSERT` bodies, and `SELECT ... INTO`. Returns the parser
    /// error or the offending statement kind on failure.
    pub fn ensure_read_only(&self, sql: &str) -> Result<(), String> {
        let statements = self.parse(sql).map_err(|e| e.to_string())?;
        if statements.is_empty() {
            return Err("empty statement".to_string());
        }
        for stmt in &statements {
            match stmt {
                Statement::Query(query) => check_query(query)?,
                other => return Err(not_a_read_query(&other.to_string())),
            }
        }
        Ok(())
    }
}

fn not_a_read_query(text: &str) -> String {
    let keyword = text.split_whitespace().next().unwrap_or("statement");
    format!("{} is not a read query", keyword.to_uppercase())
}

fn check_query(query: &Query) -> Result<(), String> {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            check_query(&cte.query)?;
        }
    }
    check_set_expr(&query.body)
}

fn check_set_expr(expr: &SetExpr) -> Result<(), String> {
    match expr {
        SetExpr::Select(select) => check_select(select),
        SetExpr::Query(query) => check_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            check_set_expr(left)?;
            check_set_expr(right)
        }
        SetExpr::Values(_) | SetExpr::Table(_) => Ok(()),
        // INSERT / UPDATE and any other statement used as a query body
        other => Err(not_a_read_query(&other.to_string())),
    }
}

fn check_select(select: &Select) -> Result<(), String> {
    if select.into.is_some() {
        return Err("SELECT INTO is not a read query".to_string());
    }
    for table in &select.from {
        check_table_with_joins(table)?;
    }
    Ok(())
}

fn check_table_with_joins(table: &TableWithJoins) -> Result<(), String> {
    check_table_factor(&table.relation)?;
    for join in &table.joins {
        check_table_factor(&join.relation)?;
    }
    Ok(())
}

fn check_table_factor(factor: &TableFactor) -> Result<(), String> {
    match factor {
        TableFactor::Derived { subquery, .. } => check_query(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => check_table_with_joins(table_with_joins),
        _ => Ok(()),
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(SqlDialect::Sqlite),
            "postgres" | "postgresql" => Ok(SqlDialect::Postgres),
            "duckdb" => Ok(SqlDialect::Duckdb),
            "mysql" => Ok(SqlDialect::Mysql),
            "ansi" => Ok(SqlDialect::Ansi),
            "generic" => Ok(SqlDialect::Generic),
            other => Err(format!(
                "unknown SQL dialect '{}'. Must be sqlite, postgres, duckdb, mysql, ansi, or generic.",
                other
            )),
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
