use super::*;

#[test]
fn test_parse_minimal_config() {
    let config = Config::from_yaml("keyspace: commerce\n").unwrap();
    assert_eq!(config.shards, vec!["0".to_string()]);
    assert_eq!(config.cutover.default_threshold, Duration::from_secs(10));
    assert_eq!(config.artifacts.retain, Duration::from_secs(86_400));
    assert_eq!(config.target.dialect, TargetDialect::Mysql);
    assert!(config.target.path.is_none());
}

#[test]
fn test_parse_full_config() {
    let yaml = r#"
keyspace: customer
shards: ["-80", "80-"]
state_dir: /var/lib/shunt
target:
  dialect: duckdb
  path: ./target.duckdb
scheduler:
  tick_interval: 500ms
  worker_poll_interval: 100ms
  max_transient_retries: 5
artifacts:
  retain: 1h
cutover:
  default_threshold: 12s
  min_threshold: 2s
  max_threshold: 1m
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.keyspace, "customer");
    assert_eq!(config.shards.len(), 2);
    assert_eq!(config.target.dialect, TargetDialect::Duckdb);
    assert_eq!(config.scheduler.tick_interval, Duration::from_millis(500));
    assert_eq!(config.scheduler.max_transient_retries, 5);
    assert_eq!(config.artifacts.retain, Duration::from_secs(3600));
    assert_eq!(config.cutover.max_threshold, Duration::from_secs(60));
    assert_eq!(
        config.store_path("-80"),
        PathBuf::from("/var/lib/shunt/customer--80.duckdb")
    );
}

#[test]
fn test_unknown_field_rejected() {
    assert!(Config::from_yaml("keyspace: a\nbogus: 1\n").is_err());
}

#[test]
fn test_threshold_ordering_validated() {
    let yaml = "cutover:\n  default_threshold: 1m\n  max_threshold: 30s\n";
    let err = Config::from_yaml(yaml).unwrap_err();
    assert!(matches!(err, CoreError::ConfigInvalid { .. }));
}

#[test]
fn test_empty_shards_rejected() {
    assert!(Config::from_yaml("shards: []\n").is_err());
    assert!(Config::from_yaml("shards: [\"a b\"]\n").is_err());
}

#[test]
fn test_zero_tick_rejected() {
    assert!(Config::from_yaml("scheduler:\n  tick_interval: 0s\n").is_err());
}

#[test]
fn test_validate_threshold_range() {
    let cutover = CutOverConfig::default();
    let err = cutover.validate_threshold(Duration::from_secs(2)).unwrap_err();
    assert!(err.contains("cut-over min value"), "{err}");
    let err = cutover
        .validate_threshold(Duration::from_secs(2000))
        .unwrap_err();
    assert!(err.contains("cut-over max value"), "{err}");
    assert_eq!(
        cutover.validate_threshold(Duration::from_millis(12_700)),
        Ok(Duration::from_secs(12))
    );
}

#[test]
fn test_load_missing_and_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shunt.yml");
    assert!(matches!(
        Config::load(&path),
        Err(CoreError::ConfigNotFound { .. })
    ));
    let config = Config::load_or_default(&path).unwrap();
    assert_eq!(config.keyspace, "commerce");

    std::fs::write(&path, "keyspace: other\n").unwrap();
    assert_eq!(Config::load(&path).unwrap().keyspace, "other");
}
