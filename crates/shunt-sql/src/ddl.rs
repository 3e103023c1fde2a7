//! DDL classification.
//!
//! Every accepted statement becomes a [`DdlStatement`]: a tagged
//! [`DdlAction`] with a table/view sub-tag, the target name and the
//! existence qualifiers that declarative mode forbids.

use serde::{Deserialize, Serialize};
use shunt_core::{ObjectKind, TableName};
use sqlparser::ast::Statement;
use sqlparser::tokenizer::Token;
use std::fmt;

use crate::error::{SqlError, SqlResult};
use crate::parser::SqlParser;
use crate::tokens::{ident, is_kw, kw_upper, render, significant, trim_semicolons, word};

/// The three schema-change shapes the scheduler understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DdlAction {
    Create,
    Alter,
    Drop,
}

impl fmt::Display for DdlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DdlAction::Create => "CREATE",
            DdlAction::Alter => "ALTER",
            DdlAction::Drop => "DROP",
        })
    }
}

/// A classified schema-change statement.
#[derive(Debug, Clone)]
pub struct DdlStatement {
    pub action: DdlAction,
    pub object: ObjectKind,
    pub name: TableName,
    pub if_exists: bool,
    pub if_not_exists: bool,
    pub or_replace: bool,
    /// Statement text as submitted, trailing semicolons removed
    pub sql: String,
    tokens: Vec<Token>,
    name_span: (usize, usize),
}

impl DdlStatement {
    /// `ALTER VIEW ...`
    pub fn is_alter_view(&self) -> bool {
        self.action == DdlAction::Alter && self.object == ObjectKind::View
    }

    /// Why this statement cannot be used as a declarative desired state.
    /// Declarative mode computes existence itself, so existence qualifiers
    /// and in-place view rewrites contradict it.
    pub fn declarative_violation(&self) -> Option<String> {
        let reason = if self.if_exists {
            "IF EXISTS"
        } else if self.if_not_exists {
            "IF NOT EXISTS"
        } else if self.or_replace {
            "CREATE OR REPLACE VIEW"
        } else if self.is_alter_view() {
            "ALTER VIEW"
        } else if self.action == DdlAction::Alter {
            "ALTER TABLE"
        } else {
            return None;
        };
        Some(format!(
            "{} is not allowed in declarative migrations; submit the desired CREATE or a DROP",
            reason
        ))
    }

    /// Significant tokens of the statement.
    pub(crate) fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Tokens following the target name.
    pub(crate) fn tokens_after_name(&self) -> &[Token] {
        &self.tokens[self.name_span.1..]
    }

    /// Re-render the statement with its target renamed to `new_name`.
    pub fn with_name(&self, new_name: &str, quote: char) -> String {
        let mut tokens: Vec<Token> = self.tokens[..self.name_span.0].to_vec();
        tokens.push(Token::make_word(new_name, Some(quote)));
        tokens.extend_from_slice(&self.tokens[self.name_span.1..]);
        render(&tokens)
    }
}

impl fmt::Display for DdlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.action, self.object.keyword(), self.name)
    }
}

/// Classify a single statement and validate it with the parser.
pub(crate) fn analyze(parser: &SqlParser, sql: &str) -> SqlResult<DdlStatement> {
    let stmt = classify(parser, sql)?;
    let parsed = parser.parse_single(sql)?;
    let consistent = match (&parsed, stmt.action, stmt.object) {
        (Statement::CreateTable { .. }, DdlAction::Create, ObjectKind::Table) => true,
        (Statement::CreateView { .. }, DdlAction::Create, ObjectKind::View) => true,
        (Statement::AlterTable { .. }, DdlAction::Alter, ObjectKind::Table) => true,
        (Statement::Drop { .. }, DdlAction::Drop, _) => true,
        (_, DdlAction::Alter, ObjectKind::View) => true,
        _ => false,
    };
    if !consistent {
        return Err(SqlError::UnsupportedStatement(format!(
            "'{}' could not be classified as {} {}",
            first_words(stmt.tokens()),
            stmt.action,
            stmt.object.keyword()
        )));
    }
    log::debug!("Classified statement as {}", stmt);
    Ok(stmt)
}

/// Classify a single statement from its tokens alone. Used for text this
/// crate generated itself or that was validated at submission.
pub(crate) fn classify(parser: &SqlParser, sql: &str) -> SqlResult<DdlStatement> {
    let all = significant(parser.tokenize(sql)?);
    let t = trim_semicolons(&all).to_vec();
    if t.is_empty() {
        return Err(SqlError::EmptySql);
    }
    if t.iter().any(|tok| matches!(tok, Token::SemiColon)) {
        return Err(SqlError::ValidationError(
            "expected a single statement; split batches before analysis".to_string(),
        ));
    }

    let head = kw_upper(&t[0]).unwrap_or_default();
    let action = match head.as_str() {
        "CREATE" => DdlAction::Create,
        "ALTER" => DdlAction::Alter,
        "DROP" => DdlAction::Drop,
        _ => {
            return Err(SqlError::UnsupportedStatement(format!(
                "'{}' is not a CREATE, ALTER or DROP statement",
                first_words(&t)
            )))
        }
    };

    let mut i = 1;
    let mut or_replace = false;
    if action == DdlAction::Create && at_kw(&t, i, "OR") && at_kw(&t, i + 1, "REPLACE") {
        or_replace = true;
        i += 2;
    }
    // Skip modifiers such as TEMPORARY, ALGORITHM = MERGE or DEFINER = ...
    while i < t.len() && !at_kw(&t, i, "TABLE") && !at_kw(&t, i, "VIEW") {
        if matches!(t[i], Token::LParen) {
            break;
        }
        i += 1;
    }
    let object = if at_kw(&t, i, "TABLE") {
        ObjectKind::Table
    } else if at_kw(&t, i, "VIEW") {
        ObjectKind::View
    } else {
        return Err(SqlError::UnsupportedStatement(format!(
            "'{}' does not target a table or view",
            first_words(&t)
        )));
    };
    i += 1;

    let mut if_exists = false;
    let mut if_not_exists = false;
    if at_kw(&t, i, "IF") && at_kw(&t, i + 1, "NOT") && at_kw(&t, i + 2, "EXISTS") {
        if_not_exists = true;
        i += 3;
    } else if at_kw(&t, i, "IF") && at_kw(&t, i + 1, "EXISTS") {
        if_exists = true;
        i += 2;
    }

    let (name, name_span) = qualified_name(&t, i)?;
    if action == DdlAction::Drop && matches!(t.get(name_span.1), Some(Token::Comma)) {
        return Err(SqlError::UnsupportedStatement(
            "DROP of multiple objects in one statement".to_string(),
        ));
    }

    Ok(DdlStatement {
        action,
        object,
        name,
        if_exists,
        if_not_exists,
        or_replace,
        sql: sql.trim().trim_end_matches(';').trim_end().to_string(),
        tokens: t,
        name_span,
    })
}

fn at_kw(t: &[Token], i: usize, kw: &str) -> bool {
    t.get(i).is_some_and(|tok| is_kw(tok, kw))
}

/// Parse `name` or `schema.name` at `start`; returns the last part.
fn qualified_name(t: &[Token], start: usize) -> SqlResult<(TableName, (usize, usize))> {
    let mut end = start;
    if t.get(end).and_then(word).is_none() {
        return Err(SqlError::ValidationError(
            "expected an object name".to_string(),
        ));
    }
    while matches!(t.get(end + 1), Some(Token::Period)) && t.get(end + 2).and_then(word).is_some()
    {
        end += 2;
    }
    let raw = ident(&t[end]).unwrap_or_default();
    let name = TableName::try_new(raw).ok_or_else(|| {
        SqlError::ValidationError("object name must not be empty".to_string())
    })?;
    Ok((name, (start, end + 1)))
}

fn first_words(t: &[Token]) -> String {
    render(&t[..t.len().min(3)])
}

#[cfg(test)]
#[path = "ddl_test.rs"]
mod tests;
