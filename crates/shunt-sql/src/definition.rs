//! Schema object definitions.
//!
//! A `CREATE TABLE` is modeled as an ordered list of elements (columns, then
//! keys and constraints) plus trailing table options. Elements keep their
//! rendered text for output and a folded form for comparison, so two
//! definitions that differ only in quoting, case or spacing compare equal.

use shunt_core::{ObjectKind, TableName};
use sqlparser::tokenizer::Token;

use crate::ddl::{DdlAction, DdlStatement};
use crate::error::{SqlError, SqlResult};
use crate::tokens::{ident, is_kw, kw_upper, matching_paren, render, render_folded, split_top_level};

/// Leading words that make a table element a key or constraint.
const KEY_STARTERS: &[&str] = &[
    "PRIMARY",
    "KEY",
    "INDEX",
    "UNIQUE",
    "CONSTRAINT",
    "FOREIGN",
    "FULLTEXT",
    "SPATIAL",
    "CHECK",
];

/// Options that change on their own and never drive a diff.
const VOLATILE_OPTIONS: &[&str] = &["AUTO_INCREMENT"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Column,
    Key,
}

/// One column or key/constraint of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub kind: ElementKind,
    /// Folded identity: column name, key name, or folded text for unnamed keys
    pub name: String,
    /// Display name for generated clauses
    pub display_name: String,
    pub text: String,
    pub folded: String,
    tokens: Vec<Token>,
}

impl Element {
    pub(crate) fn from_tokens(tokens: &[Token]) -> SqlResult<Self> {
        let first = tokens.first().ok_or_else(|| SqlError::InvalidDefinition {
            name: String::new(),
            reason: "empty table element".to_string(),
        })?;
        let text = render(tokens);
        let folded = render_folded(tokens);
        let is_key = kw_upper(first).is_some_and(|w| KEY_STARTERS.contains(&w.as_str()));
        if !is_key {
            let display_name = ident(first).ok_or_else(|| SqlError::InvalidDefinition {
                name: text.clone(),
                reason: "column definition must start with its name".to_string(),
            })?;
            return Ok(Self {
                kind: ElementKind::Column,
                name: display_name.to_lowercase(),
                display_name,
                text,
                folded,
                tokens: tokens.to_vec(),
            });
        }
        let display_name = key_name(tokens).unwrap_or_else(|| folded.clone());
        Ok(Self {
            kind: ElementKind::Key,
            name: display_name.to_lowercase(),
            display_name,
            text,
            folded,
            tokens: tokens.to_vec(),
        })
    }

    /// A column element renamed to `new_name`, keeping its quoting style.
    pub(crate) fn with_column_name(&self, new_name: &str) -> SqlResult<Self> {
        let mut tokens = self.tokens.clone();
        let quote = match tokens.first() {
            Some(Token::Word(w)) => w.quote_style,
            _ => None,
        };
        if let Some(first) = tokens.first_mut() {
            *first = Token::make_word(new_name, quote);
        }
        Self::from_tokens(&tokens)
    }

    /// The `ALTER TABLE` clause that removes this element.
    pub fn drop_clause(&self, quote: &dyn Fn(&str) -> String) -> String {
        if self.kind == ElementKind::Column {
            return format!("DROP COLUMN {}", quote(&self.display_name));
        }
        let upper = self.folded.to_ascii_uppercase();
        if upper.starts_with("PRIMARY") {
            "DROP PRIMARY KEY".to_string()
        } else if upper.starts_with("CONSTRAINT") && upper.contains("FOREIGN KEY") {
            format!("DROP FOREIGN KEY {}", quote(&self.display_name))
        } else if upper.starts_with("CONSTRAINT") && upper.contains("CHECK") {
            format!("DROP CHECK {}", quote(&self.display_name))
        } else {
            format!("DROP KEY {}", quote(&self.display_name))
        }
    }
}

/// Key name: `PRIMARY`, the `CONSTRAINT` symbol, or the index name.
fn key_name(tokens: &[Token]) -> Option<String> {
    let first = kw_upper(tokens.first()?)?;
    match first.as_str() {
        "PRIMARY" => Some("PRIMARY".to_string()),
        "CONSTRAINT" => tokens.get(1).and_then(ident),
        "CHECK" => None,
        _ => {
            // [UNIQUE|FULLTEXT|SPATIAL|FOREIGN] [KEY|INDEX] name (...)
            let mut i = 1;
            while tokens
                .get(i)
                .is_some_and(|t| is_kw(t, "KEY") || is_kw(t, "INDEX"))
            {
                i += 1;
            }
            match tokens.get(i) {
                Some(Token::Word(w)) => Some(w.value.clone()),
                _ => None,
            }
        }
    }
}

/// A `KEY=value` table option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOption {
    /// Upper-cased key words, e.g. `ENGINE` or `DEFAULT CHARSET`
    pub key: String,
    pub value: String,
}

impl TableOption {
    pub fn is_volatile(&self) -> bool {
        VOLATILE_OPTIONS.contains(&self.key.as_str())
    }

    pub fn render(&self) -> String {
        format!("{}={}", self.key, self.value)
    }
}

/// Parse a trailing options list: `ENGINE=InnoDB DEFAULT CHARSET=utf8mb4`.
pub(crate) fn parse_options(tokens: &[Token]) -> Vec<TableOption> {
    let mut options = Vec::new();
    let mut key: Vec<String> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Comma => {}
            Token::Eq => {
                if let Some(value) = tokens.get(i + 1) {
                    options.push(TableOption {
                        key: key.join(" "),
                        value: value.to_string(),
                    });
                    key.clear();
                    i += 1;
                }
            }
            Token::SingleQuotedString(_) | Token::Number(_, _) if !key.is_empty() => {
                options.push(TableOption {
                    key: key.join(" "),
                    value: tokens[i].to_string(),
                });
                key.clear();
            }
            other => key.push(other.to_string().to_ascii_uppercase()),
        }
        i += 1;
    }
    if !key.is_empty() {
        options.push(TableOption {
            key: key.join(" "),
            value: String::new(),
        });
    }
    options
}

/// A modeled `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: TableName,
    pub elements: Vec<Element>,
    pub options: Vec<TableOption>,
}

impl TableDefinition {
    pub(crate) fn from_statement(stmt: &DdlStatement) -> SqlResult<Self> {
        if stmt.action != DdlAction::Create || stmt.object != ObjectKind::Table {
            return Err(SqlError::InvalidDefinition {
                name: stmt.name.to_string(),
                reason: format!("expected CREATE TABLE, got {}", stmt),
            });
        }
        let rest = stmt.tokens_after_name();
        let invalid = |reason: &str| SqlError::InvalidDefinition {
            name: stmt.name.to_string(),
            reason: reason.to_string(),
        };
        if !matches!(rest.first(), Some(Token::LParen)) {
            return Err(invalid("only column-list definitions are supported (no LIKE / AS SELECT)"));
        }
        let close = matching_paren(rest, 0).ok_or_else(|| invalid("unbalanced parentheses"))?;
        let elements = split_top_level(&rest[1..close])
            .into_iter()
            .map(Element::from_tokens)
            .collect::<SqlResult<Vec<_>>>()?;
        if !elements.iter().any(|e| e.kind == ElementKind::Column) {
            return Err(invalid("a table needs at least one column"));
        }
        Ok(Self {
            name: stmt.name.clone(),
            elements,
            options: parse_options(&rest[close + 1..]),
        })
    }

    pub fn columns(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|e| e.kind == ElementKind::Column)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|e| e.kind == ElementKind::Key)
    }

    pub fn column(&self, name: &str) -> Option<&Element> {
        let name = name.to_lowercase();
        self.columns().find(|c| c.name == name)
    }

    pub fn option(&self, key: &str) -> Option<&TableOption> {
        self.options.iter().find(|o| o.key.eq_ignore_ascii_case(key))
    }

    /// Deterministic `CREATE TABLE` text.
    pub fn render(&self, quote: &dyn Fn(&str) -> String) -> String {
        let body: Vec<String> = self
            .elements
            .iter()
            .map(|e| format!("  {}", e.text))
            .collect();
        let mut out = format!(
            "CREATE TABLE {} (\n{}\n)",
            quote(self.name.as_str()),
            body.join(",\n")
        );
        for option in &self.options {
            out.push(' ');
            out.push_str(&option.render());
        }
        out
    }

    /// Same definition under another name.
    pub fn renamed(&self, name: &str) -> Self {
        Self {
            name: TableName::new(name),
            ..self.clone()
        }
    }
}

/// A modeled `CREATE VIEW`: everything after the view name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDefinition {
    pub name: TableName,
    pub body: String,
    pub folded: String,
}

impl ViewDefinition {
    pub(crate) fn from_statement(stmt: &DdlStatement) -> SqlResult<Self> {
        if stmt.object != ObjectKind::View || stmt.action == DdlAction::Drop {
            return Err(SqlError::InvalidDefinition {
                name: stmt.name.to_string(),
                reason: format!("expected CREATE VIEW, got {}", stmt),
            });
        }
        let rest = stmt.tokens_after_name();
        if !rest.iter().any(|t| is_kw(t, "AS")) {
            return Err(SqlError::InvalidDefinition {
                name: stmt.name.to_string(),
                reason: "view definition has no AS clause".to_string(),
            });
        }
        Ok(Self {
            name: stmt.name.clone(),
            body: render(rest),
            folded: render_folded(rest),
        })
    }

    pub fn render(&self, quote: &dyn Fn(&str) -> String) -> String {
        format!("CREATE VIEW {} {}", quote(self.name.as_str()), self.body)
    }

    pub fn renamed(&self, name: &str) -> Self {
        Self {
            name: TableName::new(name),
            ..self.clone()
        }
    }
}

/// A table or a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaObject {
    Table(TableDefinition),
    View(ViewDefinition),
}

impl SchemaObject {
    pub(crate) fn from_statement(stmt: &DdlStatement) -> SqlResult<Self> {
        match stmt.object {
            ObjectKind::Table => TableDefinition::from_statement(stmt).map(SchemaObject::Table),
            ObjectKind::View => ViewDefinition::from_statement(stmt).map(SchemaObject::View),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            SchemaObject::Table(_) => ObjectKind::Table,
            SchemaObject::View(_) => ObjectKind::View,
        }
    }

    pub fn name(&self) -> &TableName {
        match self {
            SchemaObject::Table(t) => &t.name,
            SchemaObject::View(v) => &v.name,
        }
    }

    pub fn render(&self, quote: &dyn Fn(&str) -> String) -> String {
        match self {
            SchemaObject::Table(t) => t.render(quote),
            SchemaObject::View(v) => v.render(quote),
        }
    }

    pub fn renamed(&self, name: &str) -> Self {
        match self {
            SchemaObject::Table(t) => SchemaObject::Table(t.renamed(name)),
            SchemaObject::View(v) => SchemaObject::View(v.renamed(name)),
        }
    }
}

#[cfg(test)]
#[path = "definition_test.rs"]
mod tests;
