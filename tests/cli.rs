mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn damfal(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("damfal").unwrap();
    cmd.env("NO_COLOR", "1")
        .arg("--library")
        .arg(dir)
        .arg("--config")
        .arg(dir);
    cmd
}

#[test]
fn test_ls_root() {
    let dir = common::library_dir();
    damfal(dir.path())
        .arg("ls")
        .assert()
        .success()
        .stdout(predicate::str::contains("folder#F1"))
        .stdout(predicate::str::contains("F: Marketing"))
        .stdout(predicate::str::contains("A: Logos"));
}

#[test]
fn test_ls_album_lists_files() {
    let dir = common::library_dir();
    damfal(dir.path())
        .args(["ls", "album#A1", "--sort", "size", "--reverse", "-n", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("photo-3.jpg"))
        .stdout(predicate::str::contains("photo-2.jpg"))
        .stdout(predicate::str::contains("photo-1.jpg").not());
}

#[test]
fn test_ls_empty_album() {
    let dir = common::library_dir();
    damfal(dir.path())
        .args(["ls", "album#missing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No items found."));
}

#[test]
fn test_tree() {
    let dir = common::library_dir();
    damfal(dir.path())
        .arg("tree")
        .assert()
        .success()
        .stdout(predicate::str::contains("Canto"))
        .stdout(predicate::str::contains("A: Fair"))
        .stdout(predicate::str::contains("(3 files)"));
}

#[test]
fn test_stat_json_fields() {
    let dir = common::library_dir();
    damfal(dir.path())
        .args(["stat", "image#logo", "--fields", "name,mimetype", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""name": "logo.png""#))
        .stdout(predicate::str::contains(r#""mimetype": "image/png""#))
        .stdout(predicate::str::contains("size").not());
}

#[test]
fn test_stat_unknown_field_fails() {
    let dir = common::library_dir();
    damfal(dir.path())
        .args(["stat", "image#logo", "--fields", "colour"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("colour"));
}

#[test]
fn test_url() {
    let dir = common::library_dir();
    damfal(dir.path())
        .args(["url", "image#logo#mdc"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "https://acme.canto.com/direct/image/logo-S4000x3000",
        ));
}

#[test]
fn test_fetch_writes_file() {
    let dir = common::library_dir();
    let out = dir.path().join("copy.pdf");
    damfal(dir.path())
        .args(["fetch", "document#doc1", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 17 B"));
    assert_eq!(std::fs::read(&out).unwrap(), b"%PDF-1.7 brochure");
}

#[test]
fn test_search() {
    let dir = common::library_dir();
    damfal(dir.path())
        .args(["search", "PHOTO", "-n", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("image#img1"))
        .stdout(predicate::str::contains("image#img2"))
        .stdout(predicate::str::contains("image#img3").not());
}

#[test]
fn test_info_reports_misconfiguration() {
    let dir = common::library_dir();
    common::write_config(dir.path(), "other");
    damfal(dir.path())
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("Canto"))
        .stdout(predicate::str::contains("Authorization failed"));
}

#[test]
fn test_missing_library_fails() {
    let dir = tempfile::tempdir().unwrap();
    damfal(dir.path())
        .arg("ls")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no library snapshot"));
}
