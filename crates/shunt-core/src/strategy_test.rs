use super::*;
use std::time::Duration;

#[test]
fn test_parse_bare_strategies() {
    assert_eq!(
        DdlStrategySetting::parse("online").unwrap().strategy,
        Strategy::Online
    );
    assert_eq!(
        DdlStrategySetting::parse("vitess").unwrap().strategy,
        Strategy::Online
    );
    assert_eq!(
        DdlStrategySetting::parse("MySQL").unwrap().strategy,
        Strategy::Mysql
    );
    assert_eq!(
        DdlStrategySetting::parse("direct").unwrap().options,
        MigrationOptions::default()
    );
}

#[test]
fn test_parse_flags_with_single_and_double_dash() {
    let setting =
        DdlStrategySetting::parse("vitess --singleton-table -postpone-completion --allow-concurrent")
            .unwrap();
    assert!(setting.options.singleton_table);
    assert!(setting.options.postpone_completion);
    assert!(setting.options.allow_concurrent);
    assert!(!setting.options.singleton);
}

#[test]
fn test_parse_duration_flags() {
    let setting = DdlStrategySetting::parse(
        "online --retain-artifacts=1s --force-cut-over-after=2m --cutover-threshold=15s",
    )
    .unwrap();
    assert_eq!(setting.options.retain_artifacts, Some(Duration::from_secs(1)));
    assert_eq!(
        setting.options.force_cut_over_after,
        Some(Duration::from_secs(120))
    );
    assert_eq!(
        setting.options.cutover_threshold,
        Some(Duration::from_secs(15))
    );
}

#[test]
fn test_aliases_map_to_same_flag() {
    let a = DdlStrategySetting::parse("online --retain-artifacts-duration=1h").unwrap();
    let b = DdlStrategySetting::parse("online --retain-artifacts=1h").unwrap();
    assert_eq!(a.options, b.options);
    assert_ne!(a.raw, b.raw);
}

#[test]
fn test_cutover_threshold_truncates_sub_second() {
    let setting = DdlStrategySetting::parse("online --cutover-threshold=12s500ms").unwrap();
    assert_eq!(
        setting.options.cutover_threshold,
        Some(Duration::from_secs(12))
    );
}

#[test]
fn test_unknown_flag_rejected() {
    let err = DdlStrategySetting::parse("online --no-such-flag").unwrap_err();
    assert!(matches!(err, CoreError::UnknownOption { option } if option == "no-such-flag"));
}

#[test]
fn test_unknown_strategy_rejected() {
    assert!(matches!(
        DdlStrategySetting::parse("gh-ost --singleton"),
        Err(CoreError::InvalidStrategy { .. })
    ));
    assert!(DdlStrategySetting::parse("   ").is_err());
}

#[test]
fn test_mysql_rejects_postpone_completion() {
    let err = DdlStrategySetting::parse("mysql --postpone-completion").unwrap_err();
    assert!(matches!(err, CoreError::UnsupportedOption { .. }));
    assert!(err.to_string().contains("postpone-completion"));
    assert!(DdlStrategySetting::parse("direct --cutover-threshold=10s").is_err());
    assert!(DdlStrategySetting::parse("mysql --declarative --singleton").is_ok());
}

#[test]
fn test_value_rules() {
    assert!(matches!(
        DdlStrategySetting::parse("online --retain-artifacts"),
        Err(CoreError::InvalidOptionValue { .. })
    ));
    assert!(matches!(
        DdlStrategySetting::parse("online --singleton=yes"),
        Err(CoreError::InvalidOptionValue { .. })
    ));
    assert!(matches!(
        DdlStrategySetting::parse("online --retain-artifacts=soon"),
        Err(CoreError::InvalidOptionValue { .. })
    ));
    assert!(DdlStrategySetting::parse("online singleton").is_err());
}

#[test]
fn test_display_renders_canonical_flags() {
    let setting = DdlStrategySetting::parse("vitess -postpone-launch --singleton").unwrap();
    assert_eq!(setting.to_string(), "online --singleton --postpone-launch");
}

#[test]
fn test_raw_keeps_submitted_text() {
    let setting = DdlStrategySetting::parse("  vitess   -postpone-launch\t--singleton ").unwrap();
    assert_eq!(setting.raw, "vitess -postpone-launch --singleton");
    assert_eq!(setting.strategy, Strategy::Online);
}

#[test]
fn test_option_table_lookup() {
    assert_eq!(OptionFlag::lookup("declarative"), Some(OptionFlag::Declarative));
    assert_eq!(OptionFlag::lookup("Declarative"), None);
    assert!(OptionFlag::RetainArtifacts.takes_value());
    assert!(!OptionFlag::Singleton.takes_value());
    assert_eq!(OptionFlag::CutoverThreshold.name(), "cutover-threshold");
}
