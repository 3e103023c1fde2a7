//! The statement analyzer: the single entry point the scheduler uses for
//! everything it needs to know about SQL text.

use sqlparser::tokenizer::Token;

use crate::alter;
use crate::ddl::{self, DdlStatement};
use crate::definition::{SchemaObject, TableDefinition};
use crate::diff::{self, ObjectDiff};
use crate::error::{SqlError, SqlResult};
use crate::parser::SqlParser;
use crate::tokens::{render_folded, render_verbatim, significant, trim_semicolons};

/// Dialect-aware DDL analysis.
pub struct StatementAnalyzer {
    parser: SqlParser,
}

impl StatementAnalyzer {
    pub fn new(parser: SqlParser) -> Self {
        Self { parser }
    }

    pub fn mysql() -> Self {
        Self::new(SqlParser::mysql())
    }

    pub fn duckdb() -> Self {
        Self::new(SqlParser::duckdb())
    }

    /// Create an analyzer from a dialect name (`mysql`, `duckdb`)
    pub fn for_dialect(name: &str) -> SqlResult<Self> {
        SqlParser::from_dialect_name(name).map(Self::new)
    }

    pub fn dialect_name(&self) -> &'static str {
        self.parser.dialect_name()
    }

    pub fn quote_ident(&self, ident: &str) -> String {
        self.parser.quote_ident(ident)
    }

    fn quote_char(&self) -> char {
        match self.parser.dialect_name() {
            "mysql" => '`',
            _ => '"',
        }
    }

    /// Split a submission batch at top-level semicolons.
    ///
    /// A single statement is returned as submitted (trimmed); statements of a
    /// multi-statement batch are re-assembled from their tokens.
    pub fn split(&self, batch: &str) -> SqlResult<Vec<String>> {
        let tokens = self.parser.tokenize(batch)?;
        let mut pieces: Vec<Vec<Token>> = vec![Vec::new()];
        for token in tokens {
            match token {
                Token::SemiColon => pieces.push(Vec::new()),
                Token::EOF => {}
                other => {
                    if let Some(last) = pieces.last_mut() {
                        last.push(other);
                    }
                }
            }
        }
        pieces.retain(|p| p.iter().any(|t| !matches!(t, Token::Whitespace(_))));
        match pieces.len() {
            0 => Err(SqlError::EmptySql),
            1 => Ok(vec![batch.trim().trim_end_matches(';').trim().to_string()]),
            _ => Ok(pieces
                .iter()
                .map(|p| render_verbatim(p).trim().to_string())
                .collect()),
        }
    }

    /// Classify and validate one statement.
    pub fn analyze(&self, sql: &str) -> SqlResult<DdlStatement> {
        ddl::analyze(&self.parser, sql)
    }

    /// Comparison form of a statement: case-folded, quoting and spacing
    /// canonicalized, comments and trailing semicolons removed.
    pub fn normalize(&self, sql: &str) -> SqlResult<String> {
        let tokens = significant(self.parser.tokenize(sql)?);
        let tokens = trim_semicolons(&tokens);
        if tokens.is_empty() {
            return Err(SqlError::EmptySql);
        }
        Ok(render_folded(tokens))
    }

    /// Model a `CREATE TABLE` / `CREATE VIEW` statement.
    pub fn definition(&self, create_sql: &str) -> SqlResult<SchemaObject> {
        self.definition_of(&self.classify(create_sql)?)
    }

    pub fn definition_of(&self, stmt: &DdlStatement) -> SqlResult<SchemaObject> {
        SchemaObject::from_statement(stmt)
    }

    /// Classify a statement without running it through the parser. For text
    /// that was already validated, or that [`diff`](Self::diff) generated.
    pub fn classify(&self, sql: &str) -> SqlResult<DdlStatement> {
        ddl::classify(&self.parser, sql)
    }

    /// Apply an ALTER TABLE statement to a table definition.
    pub fn apply_alter(&self, def: &TableDefinition, alter_sql: &str) -> SqlResult<TableDefinition> {
        alter::apply_alter(def, &self.classify(alter_sql)?)
    }

    /// Top-level clauses of an ALTER statement.
    pub fn alter_clauses(&self, alter_sql: &str) -> SqlResult<Vec<String>> {
        alter::alter_clauses(&self.classify(alter_sql)?)
    }

    /// Whether an ALTER only appends or drops columns.
    pub fn is_instant_alter(&self, alter_sql: &str) -> SqlResult<bool> {
        alter::is_instant(&self.classify(alter_sql)?)
    }

    /// Diff a live object against a desired one.
    pub fn diff(&self, current: &SchemaObject, desired: &SchemaObject) -> ObjectDiff {
        diff::diff(current, desired, &|s| self.quote_ident(s))
    }

    /// Deterministic `CREATE` text for a modeled object.
    pub fn render(&self, object: &SchemaObject) -> String {
        object.render(&|s| self.quote_ident(s))
    }

    /// Rewrite the target name of a statement.
    pub fn rename(&self, stmt: &DdlStatement, new_name: &str) -> String {
        stmt.with_name(new_name, self.quote_char())
    }
}

impl Default for StatementAnalyzer {
    fn default() -> Self {
        Self::mysql()
    }
}

#[cfg(test)]
#[path = "analyzer_test.rs"]
mod tests;
