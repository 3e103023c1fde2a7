//! SQL parser wrapper

use crate::dialect::{DuckDbDialect, MySqlDialect, SqlDialect};
use crate::error::{SqlError, SqlResult};
use sqlparser::ast::Statement;
use sqlparser::tokenizer::Token;

/// SQL parser that wraps sqlparser-rs with dialect support
pub struct SqlParser {
    dialect: Box<dyn SqlDialect>,
}

impl SqlParser {
    /// Create a new parser with MySQL dialect
    pub fn mysql() -> Self {
        Self {
            dialect: Box::new(MySqlDialect::new()),
        }
    }

    /// Create a new parser with DuckDB dialect
    pub fn duckdb() -> Self {
        Self {
            dialect: Box::new(DuckDbDialect::new()),
        }
    }

    /// Create a parser from dialect name
    pub fn from_dialect_name(name: &str) -> SqlResult<Self> {
        match name.to_lowercase().as_str() {
            "mysql" => Ok(Self::mysql()),
            "duckdb" => Ok(Self::duckdb()),
            _ => Err(SqlError::UnknownDialect(name.to_string())),
        }
    }

    /// Parse SQL into AST statements
    pub fn parse(&self, sql: &str) -> SqlResult<Vec<Statement>> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(SqlError::EmptySql);
        }

        self.dialect.parse(sql)
    }

    /// Parse SQL and return the only statement
    pub fn parse_single(&self, sql: &str) -> SqlResult<Statement> {
        let mut stmts = self.parse(sql)?;
        match stmts.len() {
            0 => Err(SqlError::EmptySql),
            1 => Ok(stmts.remove(0)),
            n => Err(SqlError::ValidationError(format!(
                "expected a single statement, found {}",
                n
            ))),
        }
    }

    /// Tokenize SQL with this dialect's rules
    pub fn tokenize(&self, sql: &str) -> SqlResult<Vec<Token>> {
        self.dialect.tokenize(sql)
    }

    /// Get the dialect name
    pub fn dialect_name(&self) -> &'static str {
        self.dialect.name()
    }

    /// Quote an identifier for the current dialect
    pub fn quote_ident(&self, ident: &str) -> String {
        self.dialect.quote_ident(ident)
    }
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::mysql()
    }
}

#[cfg(test)]
#[path = "parser_test.rs"]
mod tests;
