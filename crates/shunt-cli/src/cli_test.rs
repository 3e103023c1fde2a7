use super::*;
use clap::CommandFactory;

#[test]
fn verify_cli_args() {
    // Validates the entire command tree: short flag conflicts,
    // duplicate args, and other clap definition errors.
    Cli::command().debug_assert();
}

#[test]
fn test_submit_defaults() {
    let cli = Cli::try_parse_from(["shunt", "submit", "ALTER TABLE t1 ADD COLUMN c int"]).unwrap();
    match cli.command {
        Commands::Submit(args) => {
            assert_eq!(args.strategy, "online");
            assert!(args.context.is_none());
            assert!(args.uuid.is_none());
        }
        other => panic!("unexpected command {:?}", other),
    }
    assert!(!cli.global.verbose);
}

#[test]
fn test_strategy_with_flags() {
    let cli = Cli::try_parse_from([
        "shunt",
        "-v",
        "submit",
        "ALTER TABLE t1 ADD COLUMN c int",
        "--strategy",
        "online --postpone-completion --cutover-threshold=15s",
        "--context",
        "deploy-7",
    ])
    .unwrap();
    assert!(cli.global.verbose);
    let Commands::Submit(args) = cli.command else {
        panic!("expected submit");
    };
    assert_eq!(args.strategy, "online --postpone-completion --cutover-threshold=15s");
    assert_eq!(args.context.as_deref(), Some("deploy-7"));
}

#[test]
fn test_command_with_shards() {
    let cli = Cli::try_parse_from(["shunt", "launch", "abc", "--shards", "-80,80-"]).unwrap();
    let Commands::Launch(args) = cli.command else {
        panic!("expected launch");
    };
    assert_eq!(args.uuid, "abc");
    assert_eq!(args.shards.shards.as_deref(), Some("-80,80-"));
}

#[test]
fn test_threshold_parses_duration() {
    let cli = Cli::try_parse_from(["shunt", "set-cutover-threshold", "abc", "1m30s"]).unwrap();
    let Commands::SetCutoverThreshold(args) = cli.command else {
        panic!("expected set-cutover-threshold");
    };
    assert_eq!(args.threshold, Duration::from_secs(90));

    assert!(Cli::try_parse_from(["shunt", "set-cutover-threshold", "abc", "soon"]).is_err());
}

#[test]
fn test_show_output() {
    let cli = Cli::try_parse_from(["shunt", "show", "--output", "json"]).unwrap();
    let Commands::Show(args) = cli.command else {
        panic!("expected show");
    };
    assert!(args.pattern.is_none());
    assert_eq!(args.output, ShowOutput::Json);
}

#[test]
fn test_run_until_idle() {
    let cli = Cli::try_parse_from(["shunt", "run", "--until-idle"]).unwrap();
    let Commands::Run(args) = cli.command else {
        panic!("expected run");
    };
    assert!(args.until_idle);
}
