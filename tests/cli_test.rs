use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

#[test]
fn test_check_config_accepts_valid_file() {
    let file = config_file(
        r#"{
            "otp": { "ttl_secs": 300, "max_attempts": 3 },
            "providers": [
                { "name": "primary", "kind": "sms_gateway", "endpoint": "https://sms.example.com/bulk", "credential": "top-secret-key" },
                { "name": "mail", "kind": "email_api", "endpoint": "https://mail.example.com/send", "credential": "", "sender": "otp@example.com" }
            ],
            "payments": { "commission_rate": 5 }
        }"#,
    );

    let mut cmd = Command::new(cargo_bin!("arena-wallet"));
    cmd.arg("check-config").arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("configuration ok: 2 provider(s)"))
        .stdout(predicate::str::contains("top-secret-key").not())
        .stderr(predicate::str::contains("top-secret-key").not());
}

#[test]
fn test_check_config_rejects_unknown_keys() {
    let file = config_file(r#"{ "otp": { "ttl_seconds": 300 } }"#);

    let mut cmd = Command::new(cargo_bin!("arena-wallet"));
    cmd.arg("check-config").arg(file.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_check_config_rejects_out_of_range_commission() {
    let file = config_file(r#"{ "payments": { "commission_rate": 101 } }"#);

    let mut cmd = Command::new(cargo_bin!("arena-wallet"));
    cmd.arg("check-config").arg(file.path());

    cmd.assert().failure();
}

#[test]
fn test_check_config_missing_file() {
    let mut cmd = Command::new(cargo_bin!("arena-wallet"));
    cmd.arg("check-config").arg("does/not/exist.json");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn test_serve_fails_on_bad_config_before_binding() {
    let file = config_file("not json");

    let mut cmd = Command::new(cargo_bin!("arena-wallet"));
    cmd.arg("serve").arg("--config").arg(file.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}
