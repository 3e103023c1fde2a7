//! Strongly-typed name of the object a migration targets.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

/// Unquoted name of a table or view.
///
/// Quotes (backticks or double quotes) are stripped on construction so that
/// `` `t1` `` and `t1` name the same object; comparison is exact otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableName(String);

impl TableName {
    /// Build a name, stripping one layer of identifier quoting.
    pub fn new(name: impl Into<String>) -> Self {
        Self(unquote(&name.into()))
    }

    /// Return `None` for names that are empty once unquoted.
    pub fn try_new(name: impl Into<String>) -> Option<Self> {
        let name = Self::new(name);
        if name.0.is_empty() {
            None
        } else {
            Some(name)
        }
    }

    /// Return the underlying name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner `String`.
    pub fn into_inner(self) -> String {
        self.0
    }
}

fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    let stripped = ['`', '"']
        .iter()
        .find_map(|q| {
            raw.strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(*q))
                .map(|inner| inner.replace(&format!("{q}{q}"), &q.to_string()))
        });
    stripped.unwrap_or_else(|| raw.to_string())
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for TableName {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TableName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TableName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl PartialEq<str> for TableName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TableName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
