//! Error types for shunt-sql

use thiserror::Error;

/// Statement analysis errors
#[derive(Error, Debug)]
pub enum SqlError {
    /// SQL parse error (Q001)
    #[error("[Q001] SQL parse error at line {line}, column {column}: {message}")]
    ParseError {
        message: String,
        line: usize,
        column: usize,
    },

    /// Empty SQL (Q002)
    #[error("[Q002] SQL is empty")]
    EmptySql,

    /// Statement is not a supported schema change (Q003)
    #[error("[Q003] Unsupported statement: {0}")]
    UnsupportedStatement(String),

    /// Statement is well-formed but not acceptable here (Q004)
    #[error("[Q004] SQL validation failed: {0}")]
    ValidationError(String),

    /// Unknown dialect name (Q005)
    #[error("[Q005] Unknown SQL dialect: {0}")]
    UnknownDialect(String),

    /// Tokenizer error (Q006)
    #[error("[Q006] SQL tokenize error: {0}")]
    Tokenize(String),

    /// ALTER clause that cannot be applied to a definition (Q007)
    #[error("[Q007] Cannot apply ALTER clause '{clause}': {reason}")]
    UnsupportedAlter { clause: String, reason: String },

    /// Definition could not be modeled (Q008)
    #[error("[Q008] Invalid definition for '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },
}

/// Result type alias for SqlError
pub type SqlResult<T> = Result<T, SqlError>;
