//! Artifact naming.
//!
//! Artifacts are side objects a migration leaves behind: the shadow table it
//! built, or the held pre-image of the object it replaced or dropped. Their
//! names encode the owning migration and the artifact kind so the revert
//! path can find the pre-image without extra bookkeeping.

use crate::migration_uuid::MigrationUuid;
use chrono::{DateTime, Utc};
use std::fmt;

const PREFIX: &str = "_shunt_";

/// What an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// The object as it was before the migration (renamed away, not dropped)
    Held,
    /// The shadow object built during an online migration
    Shadow,
}

impl ArtifactKind {
    fn tag(&self) -> &'static str {
        match self {
            ArtifactKind::Held => "hld",
            ArtifactKind::Shadow => "vrp",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "hld" => Some(ArtifactKind::Held),
            "vrp" => Some(ArtifactKind::Shadow),
            _ => None,
        }
    }
}

/// A parsed artifact name: `_shunt_<kind>_<uuid32>_<yyyymmddhhmmss>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    pub kind: ArtifactKind,
    /// Compact (separator-free) owning migration uuid
    pub owner: String,
    pub stamp: String,
}

impl ArtifactName {
    pub fn new(kind: ArtifactKind, owner: &MigrationUuid, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            owner: owner.compact(),
            stamp: at.format("%Y%m%d%H%M%S").to_string(),
        }
    }

    /// Recognize an artifact name; `None` for ordinary object names.
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(PREFIX)?;
        let mut parts = rest.splitn(3, '_');
        let kind = ArtifactKind::from_tag(parts.next()?)?;
        let owner = parts.next()?;
        let stamp = parts.next()?;
        if owner.len() != 32 || !owner.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self {
            kind,
            owner: owner.to_string(),
            stamp: stamp.to_string(),
        })
    }

    /// Whether this artifact belongs to `uuid`.
    pub fn is_owned_by(&self, uuid: &MigrationUuid) -> bool {
        self.owner == uuid.compact()
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}_{}_{}", PREFIX, self.kind.tag(), self.owner, self.stamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn uuid() -> MigrationUuid {
        MigrationUuid::parse("0a1b2c3d_4e5f_6071_8293_a4b5c6d7e8f9").unwrap()
    }

    #[test]
    fn test_name_layout() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        let name = ArtifactName::new(ArtifactKind::Held, &uuid(), at).to_string();
        assert_eq!(name, "_shunt_hld_0a1b2c3d4e5f60718293a4b5c6d7e8f9_20240301123005");
        assert!(name.len() <= 64);
    }

    #[test]
    fn test_parse_recovers_kind_and_owner() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let name = ArtifactName::new(ArtifactKind::Shadow, &uuid(), at).to_string();
        let parsed = ArtifactName::parse(&name).unwrap();
        assert_eq!(parsed.kind, ArtifactKind::Shadow);
        assert!(parsed.is_owned_by(&uuid()));
    }

    #[test]
    fn test_parse_ignores_ordinary_names() {
        assert!(ArtifactName::parse("t1").is_none());
        assert!(ArtifactName::parse("_shunt_xyz_0a1b_1").is_none());
        assert!(ArtifactName::parse("_shunt_hld_short_20240101").is_none());
    }
}
