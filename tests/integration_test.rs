//! Integration tests for the statement-mailer CLI.
//!
//! These tests run the actual binary in one-shot mode and inspect the outbox
//! and store it writes.

use assert_cmd::Command;
use chrono::{Datelike, Local};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Get path to test data file
fn test_data_path(filename: &str) -> String {
    format!("tests/data/{}", filename)
}

/// Binary with a clean environment pointing its outbox into `dir`
fn command(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("statement-mailer").unwrap();
    cmd.env_clear()
        .env("OUTBOX_DIRECTORY", dir.join("outbox"))
        .env("LOG_LEVEL", "warn");
    cmd
}

fn outbox_messages(dir: &Path) -> Vec<String> {
    let outbox = dir.join("outbox");
    if !outbox.exists() {
        return Vec::new();
    }
    let mut paths: Vec<PathBuf> = fs::read_dir(outbox)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    paths.sort();
    paths
        .iter()
        .map(|p| fs::read_to_string(p).unwrap())
        .collect()
}

#[test]
fn test_sample_file_is_mailed() {
    let dir = TempDir::new().unwrap();
    command(dir.path())
        .arg(test_data_path("sample.csv"))
        .arg("someone@example.com")
        .assert()
        .success();

    let messages = outbox_messages(dir.path());
    assert_eq!(messages.len(), 1);

    let message = &messages[0];
    let year = Local::now().year();
    assert!(message.contains("To: someone@example.com"));
    assert!(message.contains("$54.99"));
    assert!(message.contains(&format!(
        "Number of transactions in July {}: <strong>3</strong>",
        year
    )));
    assert!(message.contains(&format!(
        "Number of transactions in August {}: <strong>2</strong>",
        year
    )));
    assert!(message.contains("+$28.58"));
    assert!(message.contains("-$15.38"));
}

#[test]
fn test_recipient_defaults_to_config() {
    let dir = TempDir::new().unwrap();
    command(dir.path())
        .env("RECIPIENT_EMAIL", "ops@example.com")
        .arg(test_data_path("sample.csv"))
        .assert()
        .success();

    let messages = outbox_messages(dir.path());
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("To: ops@example.com"));
}

#[test]
fn test_malformed_rows_are_skipped() {
    let dir = TempDir::new().unwrap();
    command(dir.path())
        .arg(test_data_path("mixed.csv"))
        .arg("someone@example.com")
        .assert()
        .success();

    let messages = outbox_messages(dir.path());
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("$29.74"));
    assert!(messages[0].contains("Number of transactions in July 2024: <strong>2</strong>"));
    assert!(messages[0].contains("Number of transactions in August 2024: <strong>1</strong>"));
}

#[test]
fn test_store_receives_batch() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("store.json");

    command(dir.path())
        .env("STORE_PATH", &store)
        .arg(test_data_path("sample.csv"))
        .arg("someone@example.com")
        .assert()
        .success();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&store).unwrap()).unwrap();
    let account = json["accounts"]["default@statement-mailer.local"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(json["rows"][&account].as_array().unwrap().len(), 5);
}

#[test]
fn test_unusable_store_does_not_block_delivery() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("store.json");
    fs::write(&store, "not json").unwrap();

    command(dir.path())
        .env("STORE_PATH", &store)
        .arg(test_data_path("sample.csv"))
        .arg("someone@example.com")
        .assert()
        .success();

    assert_eq!(outbox_messages(dir.path()).len(), 1);
}

#[test]
fn test_bad_header_fails() {
    let dir = TempDir::new().unwrap();
    command(dir.path())
        .arg(test_data_path("bad_header.csv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid file format"));

    assert!(outbox_messages(dir.path()).is_empty());
}

#[test]
fn test_file_without_valid_rows_fails() {
    let dir = TempDir::new().unwrap();
    command(dir.path())
        .arg(test_data_path("all_invalid.csv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no transactions found"));

    assert!(outbox_messages(dir.path()).is_empty());
}

#[test]
fn test_missing_file_error() {
    let dir = TempDir::new().unwrap();
    command(dir.path())
        .arg("nonexistent.csv")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_invalid_recipient_is_delivery_failure() {
    let dir = TempDir::new().unwrap();
    command(dir.path())
        .arg(test_data_path("sample.csv"))
        .arg("not-an-address")
        .assert()
        .failure()
        .stderr(predicate::str::contains("email delivery failed"));
}

#[test]
fn test_smtp_host_replaces_outbox() {
    let dir = TempDir::new().unwrap();
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    command(dir.path())
        .env("SMTP_HOST", "127.0.0.1")
        .env("SMTP_PORT", port.to_string())
        .arg(test_data_path("sample.csv"))
        .arg("someone@example.com")
        .assert()
        .failure()
        .stderr(predicate::str::contains("email delivery failed"));

    assert!(outbox_messages(dir.path()).is_empty());
}

#[test]
fn test_overflowing_file_fails_without_mail() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("overflow.csv");
    fs::write(
        &input,
        "Id,Date,Transaction\n1,7/15,+79228162514264337593543950335\n2,7/16,+1\n",
    )
    .unwrap();

    command(dir.path())
        .arg(&input)
        .arg("someone@example.com")
        .assert()
        .failure()
        .stderr(predicate::str::contains("overflow"));

    assert!(outbox_messages(dir.path()).is_empty());
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    command(dir.path())
        .env("LOG_LEVEL", "loud")
        .env("POLL_INTERVAL_MS", "-1")
        .arg(test_data_path("sample.csv"))
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("LOG_LEVEL")
                .and(predicate::str::contains("POLL_INTERVAL_MS")),
        );
}
