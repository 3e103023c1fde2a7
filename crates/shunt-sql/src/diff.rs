//! Declarative diffs between a live definition and a desired one.

use shunt_core::ObjectKind;

use crate::definition::{Element, SchemaObject, TableDefinition};

/// Outcome of comparing a live object with its desired definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectDiff {
    /// Same definition; nothing to do
    Identical,
    /// Table differs; the ALTER TABLE that converges it
    AlterTable(String),
    /// View differs; views are replaced as a whole
    ReplaceView,
    /// Same name, different object kind
    KindMismatch {
        current: ObjectKind,
        desired: ObjectKind,
    },
}

pub(crate) fn diff(
    current: &SchemaObject,
    desired: &SchemaObject,
    quote: &dyn Fn(&str) -> String,
) -> ObjectDiff {
    match (current, desired) {
        (SchemaObject::Table(cur), SchemaObject::Table(des)) => {
            let clauses = table_clauses(cur, des, quote);
            if clauses.is_empty() {
                ObjectDiff::Identical
            } else {
                ObjectDiff::AlterTable(format!(
                    "ALTER TABLE {} {}",
                    quote(cur.name.as_str()),
                    clauses.join(", ")
                ))
            }
        }
        (SchemaObject::View(cur), SchemaObject::View(des)) => {
            if cur.folded == des.folded {
                ObjectDiff::Identical
            } else {
                ObjectDiff::ReplaceView
            }
        }
        _ => ObjectDiff::KindMismatch {
            current: current.kind(),
            desired: desired.kind(),
        },
    }
}

fn position_clause(prev: Option<&Element>, quote: &dyn Fn(&str) -> String) -> String {
    match prev {
        None => "FIRST".to_string(),
        Some(p) => format!("AFTER {}", quote(&p.display_name)),
    }
}

/// Clauses in application order: drops, column changes in desired order,
/// key additions, then table options.
fn table_clauses(
    cur: &TableDefinition,
    des: &TableDefinition,
    quote: &dyn Fn(&str) -> String,
) -> Vec<String> {
    let mut clauses = Vec::new();

    for key in cur.keys() {
        let unchanged = des
            .keys()
            .any(|d| d.name == key.name && d.folded == key.folded);
        if !unchanged {
            clauses.push(key.drop_clause(quote));
        }
    }
    for column in cur.columns() {
        if des.column(&column.name).is_none() {
            clauses.push(column.drop_clause(quote));
        }
    }

    let desired: Vec<&Element> = des.columns().collect();
    let kept: Vec<&str> = cur
        .columns()
        .filter(|c| des.column(&c.name).is_some())
        .map(|c| c.name.as_str())
        .collect();
    let wanted: Vec<&str> = desired
        .iter()
        .filter(|d| cur.column(&d.name).is_some())
        .map(|d| d.name.as_str())
        .collect();
    let first_moved = kept
        .iter()
        .zip(&wanted)
        .position(|(a, b)| a != b)
        .unwrap_or(wanted.len());
    // New columns from here on are appended in order without a position.
    let append_from = desired
        .iter()
        .rposition(|d| cur.column(&d.name).is_some())
        .map(|i| i + 1)
        .unwrap_or(0);

    let mut common_index = 0;
    for (i, d) in desired.iter().enumerate() {
        let prev = i.checked_sub(1).map(|p| desired[p]);
        match cur.column(&d.name) {
            None if i >= append_from => clauses.push(format!("ADD COLUMN {}", d.text)),
            None => clauses.push(format!(
                "ADD COLUMN {} {}",
                d.text,
                position_clause(prev, quote)
            )),
            Some(c) => {
                if common_index >= first_moved {
                    clauses.push(format!(
                        "MODIFY COLUMN {} {}",
                        d.text,
                        position_clause(prev, quote)
                    ));
                } else if c.folded != d.folded {
                    clauses.push(format!("MODIFY COLUMN {}", d.text));
                }
                common_index += 1;
            }
        }
    }

    for key in des.keys() {
        let unchanged = cur
            .keys()
            .any(|c| c.name == key.name && c.folded == key.folded);
        if !unchanged {
            clauses.push(format!("ADD {}", key.text));
        }
    }

    for option in des.options.iter().filter(|o| !o.is_volatile()) {
        let same = cur
            .option(&option.key)
            .is_some_and(|c| c.value.eq_ignore_ascii_case(&option.value));
        if !same {
            clauses.push(option.render());
        }
    }

    clauses
}

#[cfg(test)]
#[path = "diff_test.rs"]
mod tests;
