use clap::{CommandFactory, Parser};
use csi_migrate::config::MigratorConfig;
use csi_migrate::tooling::cli::{Cli, CliContext, RunReport};
use std::path::PathBuf;
use tempfile::TempDir;

use super::support::{self, ebs_volume};

#[test]
fn parse_valid_flag_matrix() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["csi-migrate"],
        vec!["csi-migrate", "--context", "prod", "--patched-api", "10.0.0.1", "-f", "b.json"],
        vec!["csi-migrate", "--dry-run", "--timeout", "5m", "--backup-file", "b.json"],
        vec!["csi-migrate", "--rollback", "-f", "b.json"],
        vec!["csi-migrate", "--pv", "pv-1"],
        vec!["csi-migrate", "--pvc", "apps/data", "--namespace", "apps"],
        vec!["csi-migrate", "--format", "json", "--log-level", "debug"],
        vec!["csi-migrate", "--log-output", "file", "--log-file", "/tmp/m.log"],
    ];

    for args in cases {
        let parsed = Cli::try_parse_from(args.clone());
        assert!(parsed.is_ok(), "expected valid parse for args: {args:?}");
    }
}

#[test]
fn parse_rejects_malformed_values() {
    assert!(Cli::try_parse_from(["csi-migrate", "--timeout", "soon"]).is_err());
    assert!(Cli::try_parse_from(["csi-migrate", "--pvc", "a/b/c"]).is_err());
    assert!(Cli::try_parse_from(["csi-migrate", "--format", "yaml"]).is_err());
    assert!(Cli::try_parse_from(["csi-migrate", "--page-size", "-1"]).is_err());
}

#[test]
fn help_lists_every_flag() {
    let help = Cli::command().render_long_help().to_string();
    for flag in [
        "--kubeconfig",
        "--context",
        "--patched-api",
        "--dry-run",
        "--timeout",
        "--namespace",
        "--pv",
        "--pvc",
        "--rollback",
        "--backup-file",
        "--config",
        "--log-level",
        "--format",
    ] {
        assert!(help.contains(flag), "help is missing {flag}");
    }
}

#[test]
fn pvc_flag_becomes_claim_selection() {
    let cli = Cli::try_parse_from(["csi-migrate", "--pvc", "apps/data"]).unwrap();
    let claim = cli.selection().claim.unwrap();
    assert_eq!(claim.namespace.as_deref(), Some("apps"));
    assert_eq!(claim.name, "data");
}

#[test]
fn missing_backup_file_is_a_configuration_error() {
    let cli = Cli::try_parse_from([
        "csi-migrate",
        "--rollback",
        "--context",
        "prod",
        "--patched-api",
        "10.0.0.1",
    ])
    .unwrap();
    let mut config = MigratorConfig::default();
    cli.apply_overrides(&mut config);
    assert!(config.validate(cli.rollback).is_err());
}

#[tokio::test]
async fn context_runs_dry_run_against_store() {
    let temp = TempDir::new().unwrap();
    let backup: PathBuf = temp.path().join("backup.json");
    let config_file = temp.path().join("config.json");
    std::fs::write(&config_file, r#"{"page_size": 10}"#).unwrap();
    let backup_arg = backup.to_string_lossy().to_string();
    let config_arg = config_file.to_string_lossy().to_string();
    let cli = Cli::try_parse_from([
        "csi-migrate",
        "--dry-run",
        "--config",
        config_arg.as_str(),
        "-f",
        backup_arg.as_str(),
    ])
    .unwrap();
    let context = CliContext::new(&cli).unwrap();
    assert_eq!(context.config().page_size, 10);

    let store = support::store();
    store.insert_volume(ebs_volume("pv-1"));
    let report = context
        .run_with(store.clone(), support::translator())
        .await
        .unwrap();

    match report {
        RunReport::Migration(report) => {
            assert_eq!(report.processed, 1);
            assert_eq!(report.migrated, 1);
        }
        other => panic!("unexpected report {other:?}"),
    }
    assert_eq!(store.calls().update, 0);
    assert!(backup.exists());
}
