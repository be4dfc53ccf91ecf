
use predicates::prelude::*;
use serial_test::serial;
use std::fs;
use tempfile::tempdir;
use test_helpers::base_sealdoc_command;

#[test]
fn test_cli_help() {
    base_sealdoc_command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("open"))
        .stdout(predicate::str::contains("seal"))
        .stdout(predicate::str::contains("unseal"));
}

#[test]
fn test_cli_requires_subcommand() {
    base_sealdoc_command().assert().failure();
}

#[test]
#[serial]
fn test_cli_seal_and_unseal_roundtrip() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("plans.txt");
    fs::write(&input, "meet at noon\n").unwrap();

    base_sealdoc_command()
        .arg("seal")
        .arg(&input)
        .assert()
        .success();

    let sealed = dir.path().join("plans.txt.enc");
    let armored = fs::read_to_string(&sealed).unwrap();
    assert!(!armored.contains("meet at noon"));
    assert!(armored.lines().all(|line| line.len() <= 64));

    base_sealdoc_command()
        .arg("unseal")
        .arg(&sealed)
        .assert()
        .success()
        .stdout("meet at noon\n");
}

#[test]
#[serial]
fn test_cli_unseal_wrong_passphrase_fails() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("plans.txt");
    fs::write(&input, "meet at noon\n").unwrap();

    base_sealdoc_command()
        .arg("seal")
        .arg(&input)
        .assert()
        .success();

    base_sealdoc_command()
        .env("SEALDOC_TEST_PASSPHRASE", "not the passphrase")
        .arg("unseal")
        .arg(dir.path().join("plans.txt.enc"))
        .assert()
        .failure()
        .stdout(predicate::str::is_empty());
}

#[test]
#[serial]
fn test_cli_seal_custom_output() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("plans.txt");
    let output = dir.path().join("elsewhere.enc");
    fs::write(&input, "x").unwrap();

    base_sealdoc_command()
        .arg("seal")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    assert!(output.exists());
    assert!(!dir.path().join("plans.txt.enc").exists());
}

#[test]
fn test_cli_open_rejects_unmanaged_path() {
    let dir = tempdir().unwrap();

    base_sealdoc_command()
        .arg("open")
        .arg(dir.path().join("notes.txt"))
        .assert()
        .failure();
}

#[test]
fn test_cli_invalid_backend() {
    let dir = tempdir().unwrap();

    base_sealdoc_command()
        .env("SEALDOC_BACKEND", "rot13")
        .arg("unseal")
        .arg(dir.path().join("x.enc"))
        .assert()
        .failure();
}

#[test]
fn test_cli_rejects_editor_with_metacharacters() {
    let dir = tempdir().unwrap();

    base_sealdoc_command()
        .env("SEALDOC_EDITOR", "vim;rm")
        .arg("open")
        .arg(dir.path().join("x.enc"))
        .assert()
        .failure();
}

#[cfg(unix)]
#[test]
#[serial]
fn test_cli_open_creates_encrypted_document() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let script = dir.path().join("append-editor.sh");
    fs::write(&script, "#!/bin/sh\nprintf 'written in editor\\n' >> \"$1\"\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    let document = dir.path().join("journal.enc");

    base_sealdoc_command()
        .env("SEALDOC_EDITOR", &script)
        .arg("open")
        .arg(&document)
        .assert()
        .success();

    let armored = fs::read_to_string(&document).unwrap();
    assert!(!armored.contains("written in editor"));

    base_sealdoc_command()
        .arg("unseal")
        .arg(&document)
        .assert()
        .success()
        .stdout("written in editor\n");
}

#[test]
#[ignore = "requires gpg on PATH"]
fn test_cli_gpg_backend_roundtrip() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("plans.txt");
    fs::write(&input, "via gpg\n").unwrap();

    base_sealdoc_command()
        .env("SEALDOC_BACKEND", "gpg")
        .arg("seal")
        .arg(&input)
        .assert()
        .success();

    base_sealdoc_command()
        .env("SEALDOC_BACKEND", "gpg")
        .arg("unseal")
        .arg(dir.path().join("plans.txt.enc"))
        .assert()
        .success()
        .stdout("via gpg\n");
}

#[test]
#[serial]
fn test_cli_json_logs_are_structured() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("plans.txt");
    fs::write(&input, "x").unwrap();

    let output = base_sealdoc_command()
        .args(["--log-format", "json"])
        .arg("seal")
        .arg(&input)
        .output()
        .unwrap();

    assert!(output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    assert!(!lines.is_empty(), "expected log output on stderr");
    for line in lines {
        let entry: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(entry.get("timestamp").is_some());
        assert!(entry.get("level").is_some());
        assert!(entry.get("fields").is_some());
    }
}

#[test]
#[serial]
fn test_cli_log_level_hides_info() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("plans.txt");
    fs::write(&input, "x").unwrap();

    base_sealdoc_command()
        .args(["--log-level", "warn"])
        .arg("seal")
        .arg(&input)
        .assert()
        .success()
        .stderr(predicate::str::contains("Sealed").not());
}
