use super::*;
use crate::error::CoreError;

#[test]
fn test_parse_valid_identifiers() {
    assert_eq!(Keyspace::parse("commerce").unwrap(), "commerce");
    assert_eq!(Shard::parse("-80").unwrap().as_str(), "-80");
    assert_eq!(
        MigrationContext::parse("migrate:ctx").unwrap().into_inner(),
        "migrate:ctx"
    );
}

#[test]
fn test_parse_rejects_empty() {
    let err = Keyspace::parse("").unwrap_err();
    assert!(matches!(
        err,
        CoreError::InvalidIdentifier {
            kind: "keyspace",
            ..
        }
    ));
}

#[test]
fn test_parse_rejects_whitespace_and_commas() {
    assert!(Shard::parse("0 1").is_err());
    assert!(Shard::parse("0,1").is_err());
    assert!(MigrationContext::parse("ctx\n").is_err());
}

#[test]
fn test_generated_context_is_prefixed() {
    let ctx = MigrationContext::generated("abc");
    assert_eq!(ctx, "shunt:abc");
}

#[test]
fn test_deserialize_validates() {
    let ok: Shard = serde_yaml::from_str("\"80-\"").unwrap();
    assert_eq!(ok, "80-");
    let bad: Result<Shard, _> = serde_yaml::from_str("\"\"");
    assert!(bad.is_err());
}

#[test]
fn test_from_str() {
    let ks: Keyspace = "customer".parse().unwrap();
    assert_eq!(ks.to_string(), "customer");
}
