//! Tests for CLI subcommand parsing.

mod helpers;

use clap::Parser;
use dbq::app::{build_query, run, Outcome};
use dbq::config::{BackendKind, Cli, Command, LogFormat, LogLevel};
use dbq::{ConfigurationError, ScanLimits};
use helpers::{kv_objects, kv_store, read_json_lines};
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).expect("arguments should parse")
}

#[test]
fn test_get_parses_keys_and_output() {
    let cli = parse(&[
        "dbq",
        "get",
        "--source",
        "users.jsonl",
        "--pks",
        "a,b,c",
        "--select",
        "pk,name",
        "--batch-size",
        "2",
        "--save-file",
        "out.csv",
        "--save-format",
        "csv",
    ]);

    let Command::Get(args) = cli.command else {
        panic!("expected get");
    };
    assert_eq!(
        args.pks,
        Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
    );
    assert_eq!(args.pk_file, None);
    assert_eq!(args.batch_size, 2);
    assert_eq!(args.workers, 1);
    assert_eq!(args.query.select, vec!["pk", "name"]);
    assert_eq!(args.query.source.backend, BackendKind::Kv);
    assert_eq!(args.output.save_file, Some(PathBuf::from("out.csv")));
    assert_eq!(args.output.save_format, "csv");
}

#[test]
fn test_scan_defaults_and_sentinels() {
    let cli = parse(&["dbq", "scan", "--source", "users.jsonl"]);
    let Command::Scan(args) = cli.command else {
        panic!("expected scan");
    };
    assert_eq!(args.limits(), ScanLimits::default());
    assert!(matches!(cli.log_level, LogLevel::Info));
    assert!(matches!(cli.log_format, LogFormat::Plain));

    let cli = parse(&[
        "dbq",
        "scan",
        "--source",
        "users.jsonl",
        "--max-records",
        "-1",
        "--max-scans",
        "-1",
        "--log-level",
        "debug",
    ]);
    let Command::Scan(args) = cli.command else {
        panic!("expected scan");
    };
    assert_eq!(args.limits(), ScanLimits::unbounded());
    assert!(matches!(cli.log_level, LogLevel::Debug));
}

#[test]
fn test_repeated_filters_and_descending_sort() {
    let cli = parse(&[
        "dbq",
        "count",
        "--backend",
        "search",
        "--source",
        "users.jsonl",
        "--set",
        "people",
        "--filter",
        "status=active",
        "--filter",
        "age__gte=18",
        "--sort",
        "-age,name",
    ]);
    let Command::Count(args) = cli.command else {
        panic!("expected count");
    };
    assert_eq!(args.source.backend, BackendKind::Search);
    assert_eq!(args.source.set, "people");
    assert_eq!(args.filters, vec!["status=active", "age__gte=18"]);
    assert_eq!(args.sort, vec!["-age", "name"]);
}

#[test]
fn test_invalid_arguments_are_rejected() {
    assert!(Cli::try_parse_from(["dbq", "scan"]).is_err());
    assert!(Cli::try_parse_from(["dbq", "get", "--source", "x", "--batch-size", "many"]).is_err());
    assert!(Cli::try_parse_from(["dbq", "count", "--source", "x", "--backend", "sql"]).is_err());
    assert!(Cli::try_parse_from(["dbq", "drop", "--source", "x"]).is_err());
}

#[test]
fn test_build_query_rejects_sort_on_key_value() {
    let cli = parse(&["dbq", "count", "--source", "x", "--sort", "age"]);
    let mut users = kv_objects(kv_store());
    let err = build_query(&mut users, cli.command.query()).unwrap_err();
    assert!(matches!(err, ConfigurationError::MissingCapability { .. }));
}

fn write_source(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("users.jsonl");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, r#"{{"id": "a", "name": "Asha", "age": 31}}"#).unwrap();
    writeln!(file, r#"{{"id": "b", "name": "Ben", "age": 17}}"#).unwrap();
    writeln!(file, r#"{{"id": "c", "name": "Chen", "age": 45}}"#).unwrap();
    path
}

#[tokio::test]
async fn test_run_scan_on_search_backend() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let source = write_source(&temp_dir);
    let source = source.to_str().unwrap();

    let cli = parse(&[
        "dbq", "scan", "--backend", "search", "--source", source, "--filter", "age__gte=18",
        "--select", "pk", "--sort", "-age",
    ]);
    let Outcome::Records(retrieval) = run(cli.command).await.unwrap() else {
        panic!("expected records");
    };
    assert_eq!(retrieval.records, vec![json!("c"), json!("a")]);
}

#[tokio::test]
async fn test_run_get_exports_to_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let source = write_source(&temp_dir);
    let out = temp_dir.path().join("out.json");

    let cli = parse(&[
        "dbq",
        "get",
        "--source",
        source.to_str().unwrap(),
        "--pks",
        "c,b",
        "--select",
        "pk,age",
        "--save-file",
        out.to_str().unwrap(),
    ]);
    let Outcome::Records(retrieval) = run(cli.command).await.unwrap() else {
        panic!("expected records");
    };
    assert_eq!(retrieval.stats.written, 2);
    assert_eq!(
        read_json_lines(&out),
        vec![json!({"pk": "c", "age": 45}), json!({"pk": "b", "age": 17})]
    );
}

#[tokio::test]
async fn test_run_count_on_key_value_backend() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let source = write_source(&temp_dir);

    let cli = parse(&["dbq", "count", "--source", source.to_str().unwrap()]);
    assert!(matches!(run(cli.command).await.unwrap(), Outcome::Count(3)));
}

#[tokio::test]
async fn test_run_reports_missing_source_file() {
    let cli = parse(&["dbq", "count", "--source", "/nonexistent/users.jsonl"]);
    let err = run(cli.command).await.unwrap_err();
    assert!(err.to_string().contains("/nonexistent/users.jsonl"));
}
