use std::fs;

use clap::Parser;
use stagededupe::cli::Cli;
use stagededupe::config::Config;
use stagededupe::duplicates::ScanResult;
use stagededupe::error::ExitCode;
use tempfile::tempdir;

use super::support::{closed_port_url, document, record};

fn run(args: &[&str]) -> anyhow::Result<ExitCode> {
    let mut argv = vec!["stagededupe", "-q"];
    argv.extend_from_slice(args);
    stagededupe::run_app(Cli::parse_from(argv))
}

#[test]
fn test_analyze_writes_json_report() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("records.json");
    let output = dir.path().join("report.json");
    let records = vec![
        record("a", "same", "text/plain", 0, 40),
        record("b", "same", "text/plain", 5, 40),
        document("c", 0),
    ];
    fs::write(&input, serde_json::to_string(&records).unwrap()).unwrap();

    let code = run(&[
        "analyze",
        input.to_str().unwrap(),
        "--no-content",
        "-o",
        "json",
        "--output-file",
        output.to_str().unwrap(),
    ])
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    let result: ScanResult = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(result.total_files, 3);
    assert_eq!(result.size_saved, 40);
    assert!(!result.scan_options.enable_content_scanning);
}

#[test]
fn test_analyze_without_duplicates() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("records.json");
    let output = dir.path().join("report.csv");
    fs::write(
        &input,
        serde_json::to_string(&vec![document("a", 0), document("b", 0)]).unwrap(),
    )
    .unwrap();

    let code = run(&[
        "analyze",
        input.to_str().unwrap(),
        "--no-content",
        "-o",
        "csv",
        "--output-file",
        output.to_str().unwrap(),
    ])
    .unwrap();

    assert_eq!(code, ExitCode::NoDuplicates);
    assert!(fs::read_to_string(&output).unwrap().is_empty());
}

#[test]
fn test_unreachable_oracle_is_partial_success() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("records.json");
    let output = dir.path().join("report.txt");
    fs::write(
        &input,
        serde_json::to_string(&vec![document("a", 0), document("b", 0)]).unwrap(),
    )
    .unwrap();
    let url = closed_port_url();

    let code = run(&[
        "analyze",
        input.to_str().unwrap(),
        "--oracle-url",
        &url,
        "--oracle-timeout",
        "2",
        "--output-file",
        output.to_str().unwrap(),
    ])
    .unwrap();

    assert_eq!(code, ExitCode::PartialSuccess);
    let report = fs::read_to_string(&output).unwrap();
    assert!(report.contains("oracle unavailable"));
}

#[test]
fn test_scan_directory() {
    let dir = tempdir().unwrap();
    let files = dir.path().join("files");
    fs::create_dir(&files).unwrap();
    fs::write(files.join("a.txt"), b"same bytes").unwrap();
    fs::write(files.join("b.txt"), b"same bytes").unwrap();
    let output = dir.path().join("report.json");

    let code = run(&[
        "scan",
        files.to_str().unwrap(),
        "--no-content",
        "-o",
        "json",
        "--output-file",
        output.to_str().unwrap(),
    ])
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    let result: ScanResult = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(result.groups.len(), 1);
    assert!(result.groups[0].keep_file.path.is_some());
}

#[test]
fn test_invalid_threshold_is_an_error() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("records.json");
    fs::write(&input, serde_json::to_string(&vec![document("a", 0)]).unwrap()).unwrap();

    let err = run(&["analyze", input.to_str().unwrap(), "-t", "0.3"]).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
    assert!(format!("{err:#}").contains("0.3"));
}

#[test]
fn test_missing_records_file_is_an_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.json");
    assert!(run(&["analyze", missing.to_str().unwrap(), "--no-content"]).is_err());
}

#[test]
fn test_missing_directory_is_an_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope");
    assert!(run(&["scan", missing.to_str().unwrap(), "--no-content"]).is_err());
}

#[test]
fn test_save_config_writes_effective_settings() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("records.json");
    let saved = dir.path().join("conf").join("stagededupe.toml");
    fs::write(
        &input,
        serde_json::to_string(&vec![document("a", 0), document("b", 0)]).unwrap(),
    )
    .unwrap();

    run(&[
        "analyze",
        input.to_str().unwrap(),
        "-t",
        "0.92",
        "--no-content",
        "--oracle-url",
        "http://ml:9000",
        "--save-config",
        saved.to_str().unwrap(),
        "--output-file",
        dir.path().join("report.txt").to_str().unwrap(),
    ])
    .unwrap();

    let config = Config::load(Some(&saved)).unwrap();
    assert_eq!(config.similarity_threshold, 0.92);
    assert!(!config.enable_content_scanning);
    assert_eq!(config.oracle.url, "http://ml:9000");
}

#[test]
fn test_invalid_threshold_is_not_saved() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("records.json");
    let saved = dir.path().join("stagededupe.toml");
    fs::write(&input, serde_json::to_string(&vec![document("a", 0)]).unwrap()).unwrap();

    assert!(run(&[
        "analyze",
        input.to_str().unwrap(),
        "-t",
        "0.2",
        "--save-config",
        saved.to_str().unwrap(),
    ])
    .is_err());
    assert!(!saved.exists());
}
