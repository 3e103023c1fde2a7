//! Applying `ALTER TABLE` clauses to a [`TableDefinition`].

use sqlparser::tokenizer::Token;

use crate::ddl::{DdlAction, DdlStatement};
use crate::definition::{parse_options, Element, ElementKind, TableDefinition};
use crate::error::{SqlError, SqlResult};
use crate::tokens::{ident, is_kw, kw_upper, render, split_top_level};

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

enum Position {
    Last,
    First,
    After(String),
}

/// Split a trailing `FIRST` / `AFTER col` off a column definition.
fn strip_position(tokens: &[Token]) -> (&[Token], Position) {
    let n = tokens.len();
    if n >= 2 && is_kw(&tokens[n - 1], "FIRST") {
        return (&tokens[..n - 1], Position::First);
    }
    if n >= 3 && is_kw(&tokens[n - 2], "AFTER") {
        if let Some(after) = ident(&tokens[n - 1]) {
            return (&tokens[..n - 2], Position::After(after.to_lowercase()));
        }
    }
    (tokens, Position::Last)
}

fn unsupported(clause: &[Token], reason: &str) -> SqlError {
    SqlError::UnsupportedAlter {
        clause: render(clause),
        reason: reason.to_string(),
    }
}

fn clause_tokens(stmt: &DdlStatement) -> SqlResult<Vec<&[Token]>> {
    if stmt.action != DdlAction::Alter {
        return Err(SqlError::ValidationError(format!(
            "expected ALTER TABLE, got {}",
            stmt
        )));
    }
    Ok(split_top_level(stmt.tokens_after_name()))
}

/// Rendered clauses of an ALTER statement, one per top-level comma.
pub(crate) fn alter_clauses(stmt: &DdlStatement) -> SqlResult<Vec<String>> {
    Ok(clause_tokens(stmt)?.into_iter().map(render).collect())
}

/// Whether every clause appends or drops a column (no rebuild needed).
pub(crate) fn is_instant(stmt: &DdlStatement) -> SqlResult<bool> {
    let clauses = clause_tokens(stmt)?;
    Ok(!clauses.is_empty() && clauses.into_iter().all(|clause| {
        let head = clause.first().and_then(kw_upper).unwrap_or_default();
        let rest = &clause[1..];
        let target = if rest.first().is_some_and(|t| is_kw(t, "COLUMN")) {
            &rest[1..]
        } else {
            rest
        };
        let names_key = target
            .first()
            .and_then(kw_upper)
            .is_some_and(|w| KEY_STARTERS.contains(&w.as_str()));
        match head.as_str() {
            "ADD" => !names_key && matches!(strip_position(target).1, Position::Last),
            "DROP" => !names_key,
            "ALGORITHM" | "LOCK" => true,
            _ => false,
        }
    }))
}

/// Apply an ALTER TABLE to `def`, clause by clause, in order.
pub(crate) fn apply_alter(def: &TableDefinition, stmt: &DdlStatement) -> SqlResult<TableDefinition> {
    let mut out = def.clone();
    for clause in clause_tokens(stmt)? {
        apply_clause(&mut out, clause)?;
    }
    if out.columns().next().is_none() {
        return Err(SqlError::ValidationError(format!(
            "ALTER would leave table '{}' without columns",
            def.name
        )));
    }
    Ok(out)
}

fn column_index(def: &TableDefinition, name: &str) -> Option<usize> {
    def.elements
        .iter()
        .position(|e| e.kind == ElementKind::Column && e.name == name)
}

fn key_index(def: &TableDefinition, name: &str) -> Option<usize> {
    def.elements
        .iter()
        .position(|e| e.kind == ElementKind::Key && e.name == name)
}

fn insert_column(
    def: &mut TableDefinition,
    column: Element,
    position: Position,
    clause: &[Token],
) -> SqlResult<()> {
    let index = match position {
        Position::First => 0,
        Position::After(after) => {
            column_index(def, &after).ok_or_else(|| unsupported(clause, "unknown AFTER column"))?
                + 1
        }
        Position::Last => def
            .elements
            .iter()
            .rposition(|e| e.kind == ElementKind::Column)
            .map(|i| i + 1)
            .unwrap_or(0),
    };
    def.elements.insert(index, column);
    Ok(())
}

fn skip_column_kw(tokens: &[Token]) -> &[Token] {
    match tokens.first() {
        Some(t) if is_kw(t, "COLUMN") => &tokens[1..],
        _ => tokens,
    }
}

fn apply_clause(def: &mut TableDefinition, clause: &[Token]) -> SqlResult<()> {
    let head = clause.first().and_then(kw_upper).unwrap_or_default();
    let rest = &clause[1..];
    match head.as_str() {
        "ADD" => {
            let had_column_kw = rest.first().is_some_and(|t| is_kw(t, "COLUMN"));
            let target = skip_column_kw(rest);
            if matches!(target.first(), Some(Token::LParen)) {
                return Err(unsupported(clause, "parenthesized column lists"));
            }
            let names_key = target
                .first()
                .and_then(kw_upper)
                .is_some_and(|w| KEY_STARTERS.contains(&w.as_str()));
            if names_key && !had_column_kw {
                let key = Element::from_tokens(target)?;
                if key_index(def, &key.name).is_some() {
                    return Err(unsupported(clause, "duplicate key name"));
                }
                def.elements.push(key);
                return Ok(());
            }
            let (body, position) = strip_position(target);
            let column = Element::from_tokens(body)?;
            if column_index(def, &column.name).is_some() {
                return Err(unsupported(clause, "duplicate column name"));
            }
            insert_column(def, column, position, clause)
        }
        "DROP" => {
            let upper = rest.first().and_then(kw_upper).unwrap_or_default();
            let (kind, name) = match upper.as_str() {
                "COLUMN" => (ElementKind::Column, rest.get(1).and_then(ident)),
                "PRIMARY" => (ElementKind::Key, Some("primary".to_string())),
                "KEY" | "INDEX" | "CONSTRAINT" | "CHECK" => {
                    (ElementKind::Key, rest.get(1).and_then(ident))
                }
                "FOREIGN" => (ElementKind::Key, rest.get(2).and_then(ident)),
                _ => (ElementKind::Column, rest.first().and_then(ident)),
            };
            let name = name
                .ok_or_else(|| unsupported(clause, "missing object name"))?
                .to_lowercase();
            let index = match kind {
                ElementKind::Column => column_index(def, &name),
                ElementKind::Key => key_index(def, &name),
            };
            let index = index.ok_or_else(|| {
                unsupported(clause, "check that the column or key exists")
            })?;
            def.elements.remove(index);
            Ok(())
        }
        "MODIFY" => {
            let (body, position) = strip_position(skip_column_kw(rest));
            let column = Element::from_tokens(body)?;
            let index = column_index(def, &column.name)
                .ok_or_else(|| unsupported(clause, "unknown column"))?;
            replace_column(def, index, column, position, clause)
        }
        "CHANGE" => {
            let target = skip_column_kw(rest);
            let old = target
                .first()
                .and_then(ident)
                .ok_or_else(|| unsupported(clause, "missing column name"))?
                .to_lowercase();
            let (body, position) = strip_position(&target[1..]);
            let column = Element::from_tokens(body)?;
            let index =
                column_index(def, &old).ok_or_else(|| unsupported(clause, "unknown column"))?;
            replace_column(def, index, column, position, clause)
        }
        "RENAME" => {
            if !rest.first().is_some_and(|t| is_kw(t, "COLUMN")) {
                return Err(unsupported(clause, "table renames are not online operations"));
            }
            let (Some(from), Some(to)) = (rest.get(1).and_then(ident), rest.get(3).and_then(ident))
            else {
                return Err(unsupported(clause, "expected RENAME COLUMN a TO b"));
            };
            let index = column_index(def, &from.to_lowercase())
                .ok_or_else(|| unsupported(clause, "unknown column"))?;
            def.elements[index] = def.elements[index].with_column_name(&to)?;
            Ok(())
        }
        "ALGORITHM" | "LOCK" | "FORCE" => Ok(()),
        "ALTER" => Err(unsupported(clause, "ALTER COLUMN is not supported")),
        _ => {
            let options = parse_options(clause);
            if options.is_empty() || options.iter().any(|o| o.value.is_empty()) {
                return Err(unsupported(clause, "unrecognized clause"));
            }
            for option in options {
                match def.options.iter_mut().find(|o| o.key == option.key) {
                    Some(existing) => existing.value = option.value,
                    None => def.options.push(option),
                }
            }
            Ok(())
        }
    }
}

fn replace_column(
    def: &mut TableDefinition,
    index: usize,
    column: Element,
    position: Position,
    clause: &[Token],
) -> SqlResult<()> {
    if let Position::Last = position {
        def.elements[index] = column;
        return Ok(());
    }
    def.elements.remove(index);
    insert_column(def, column, position, clause)
}

#[cfg(test)]
#[path = "alter_test.rs"]
mod tests;
