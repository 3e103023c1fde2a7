//! Migration identifiers.
//!
//! A migration UUID is 32 lowercase hex digits grouped `8_4_4_4_12` with
//! underscores, so it can be embedded in table names (artifacts) without
//! quoting.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

/// Globally unique migration identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MigrationUuid(String);

impl MigrationUuid {
    /// Generate a fresh identifier from a random v4 UUID.
    pub fn generate() -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self(group(&hex))
    }

    /// Parse a client-supplied identifier. Hyphens are accepted in place of
    /// underscores and hex digits are lowercased.
    pub fn parse(value: &str) -> CoreResult<Self> {
        let trimmed = value.trim();
        let parts: Vec<&str> = trimmed.split(['_', '-']).collect();
        let well_formed = parts.len() == GROUPS.len()
            && parts
                .iter()
                .zip(GROUPS)
                .all(|(p, len)| p.len() == len && p.chars().all(|c| c.is_ascii_hexdigit()));
        if !well_formed {
            return Err(CoreError::InvalidUuid {
                value: value.to_string(),
            });
        }
        Ok(Self(parts.join("_").to_ascii_lowercase()))
    }

    /// Return the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 32 hex digits without separators.
    pub fn compact(&self) -> String {
        self.0.replace('_', "")
    }
}

fn group(hex: &str) -> String {
    let mut out = String::with_capacity(36);
    let mut start = 0;
    for (i, len) in GROUPS.iter().enumerate() {
        if i > 0 {
            out.push('_');
        }
        out.push_str(&hex[start..start + len]);
        start += len;
    }
    out
}

impl fmt::Display for MigrationUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MigrationUuid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for MigrationUuid {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for MigrationUuid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl PartialEq<str> for MigrationUuid {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for MigrationUuid {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_well_formed() {
        let id = MigrationUuid::generate();
        assert_eq!(id.as_str().len(), 36);
        assert!(MigrationUuid::parse(id.as_str()).is_ok());
        assert_ne!(id, MigrationUuid::generate());
    }

    #[test]
    fn test_parse_normalizes_hyphens_and_case() {
        let id = MigrationUuid::parse("1A2B3C4D-0000-1111-2222-333344445555").unwrap();
        assert_eq!(id, "1a2b3c4d_0000_1111_2222_333344445555");
        assert_eq!(id.compact(), "1a2b3c4d000011112222333344445555");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(MigrationUuid::parse("").is_err());
        assert!(MigrationUuid::parse("not-a-uuid").is_err());
        assert!(MigrationUuid::parse("1a2b3c4d_0000_1111_2222_33334444555z").is_err());
        assert!(MigrationUuid::parse("1a2b3c4d_0000_1111_2222").is_err());
    }
}
