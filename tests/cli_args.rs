use check_core::SamplingMode;
use clap::Parser;
use mongo_check::{CheckArgs, SamplingModeArg};
use std::time::Duration;

#[derive(Parser)]
struct TestCli {
    #[command(flatten)]
    args: CheckArgs,
}

fn parse(extra: &[&str]) -> CheckArgs {
    let mut argv = vec![
        "mongo-check",
        "--src",
        "mongodb://a:27017",
        "--dst",
        "mongodb://b:27017",
        "--db",
        "shop",
    ];
    argv.extend_from_slice(extra);
    TestCli::try_parse_from(argv).unwrap().args
}

#[test]
fn test_defaults() {
    let args = parse(&[]);
    assert_eq!(args.count, 100);
    assert_eq!(args.rate, 0.1);
    assert_eq!(args.mode, SamplingModeArg::Skip);
    assert!(!args.check_index);
    assert!(!args.tolerate_missing);

    let config = args.to_config().unwrap();
    assert_eq!(config.database, "shop");
    assert_eq!(config.collection, None);
    assert_eq!(config.call_timeout, Duration::from_secs(60));
    assert_eq!(config.mode, SamplingMode::Skip);
    assert!(config.validate().is_ok());

    let opts = args.connect_opts().unwrap();
    assert_eq!(opts.connect_timeout, Duration::from_secs(10));
    assert_eq!(opts.call_timeout, Duration::from_secs(60));
}

#[test]
fn test_all_flags() {
    let args = parse(&[
        "--coll",
        "orders",
        "--count",
        "500",
        "--rate",
        "0.25",
        "--mode",
        "sampleRate",
        "--check-index",
        "--tolerate-missing",
        "--timeout",
        "30s",
        "--seed",
        "9",
        "--report-file",
        "report.json",
    ]);
    let config = args.to_config().unwrap();
    assert_eq!(config.collection.as_deref(), Some("orders"));
    assert_eq!(config.requested_count, 500);
    assert_eq!(config.requested_rate, 0.25);
    assert_eq!(config.mode, SamplingMode::SampleRate);
    assert!(config.check_indexes);
    assert!(config.tolerate_missing);
    assert_eq!(config.call_timeout, Duration::from_secs(30));
    assert_eq!(config.seed, Some(9));
    assert_eq!(
        args.report_file.as_deref(),
        Some(std::path::Path::new("report.json"))
    );
}

#[test]
fn test_continue_not_exist_alias() {
    let args = parse(&["--continue-not-exist"]);
    assert!(args.tolerate_missing);
}

#[test]
fn test_unknown_mode_rejected() {
    let result = TestCli::try_parse_from([
        "mongo-check",
        "--src",
        "a",
        "--dst",
        "b",
        "--db",
        "shop",
        "--mode",
        "random",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_bad_timeout_reported() {
    let args = parse(&["--timeout", "soon"]);
    let err = args.to_config().unwrap_err();
    assert!(format!("{err:#}").contains("Invalid --timeout value: soon"));
}

#[test]
fn test_out_of_range_rate_fails_validation() {
    let args = parse(&["--rate", "1.5"]);
    assert!(args.to_config().unwrap().validate().is_err());
}
