//! CLI test cases.
//!
//! Most of these use the `echo` engine, which "recognizes" each image as its
//! own file name. Tests that need a real `tesseract` install are ignored by
//! default.

use std::{fs, path::Path, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;

/// Create a new `Command` with our binary.
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("isil-ocr").unwrap();
    cmd.env_remove("ISIL_OCR_LANG")
        .env_remove("ISIL_OCR_CACHE_DIR")
        .env_remove("ISIL_OCR_ORIGIN");
    cmd
}

/// Write some fake input files into `dir`. Only the names matter to the
/// `echo` engine.
fn write_inputs(dir: &Path) {
    fs::write(dir.join("a.png"), b"\x89PNG\r\n\x1a\nnot really").unwrap();
    fs::write(dir.join("b.jpg"), b"\xff\xd8\xffnot really").unwrap();
    fs::write(dir.join("notes.txt"), b"not an image").unwrap();
}

#[test]
fn test_help() {
    cmd().arg("--help").assert().success();
}

#[test]
fn test_version() {
    cmd().arg("--version").assert().success();
}

#[test]
fn test_ocr_prints_combined_text() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    cmd()
        .current_dir(dir.path())
        .args(["ocr", "--engine", "echo", "--text"])
        .args(["a.png", "notes.txt", "b.jpg"])
        .assert()
        .success()
        .stdout("a.png\n\nb.jpg\n");
}

#[test]
fn test_ocr_exclude_removes_by_position() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    cmd()
        .current_dir(dir.path())
        .args(["ocr", "--engine", "echo", "--text", "--exclude", "0"])
        .args(["a.png", "b.jpg"])
        .assert()
        .success()
        .stdout("b.jpg\n");
}

#[test]
fn test_ocr_writes_every_export() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let out_dir = dir.path().join("out");

    cmd()
        .current_dir(dir.path())
        .args(["ocr", "--engine", "echo", "--export", "xlsx,pdf", "-e", "docx"])
        .arg("--out-dir")
        .arg(&out_dir)
        .args(["a.png", "b.jpg"])
        .assert()
        .success();

    for ext in ["xlsx", "pdf", "docx"] {
        let path = out_dir.join(format!("IŞIL_OCR_Sonuçları.{}", ext));
        let bytes = fs::read(&path).unwrap();
        assert!(!bytes.is_empty(), "{} is empty", path.display());
    }
    assert!(fs::read(out_dir.join("IŞIL_OCR_Sonuçları.pdf"))
        .unwrap()
        .starts_with(b"%PDF"));
}

#[test]
fn test_ocr_json_output() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    cmd()
        .current_dir(dir.path())
        .args(["ocr", "--engine", "echo", "--json", "-", "a.png", "b.jpg"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""file_name":"a.png""#))
        .stdout(predicate::str::contains(r#""file_name":"b.jpg""#))
        .stdout(predicate::str::contains(r#""confidence":100.0"#));
}

#[test]
fn test_ocr_without_images_does_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    cmd()
        .current_dir(dir.path())
        .args(["ocr", "--engine", "echo", "--text", "--export", "pdf", "notes.txt"])
        .assert()
        .success()
        .stdout("");
    assert!(!dir.path().join("IŞIL_OCR_Sonuçları.pdf").exists());
}

#[test]
fn test_ocr_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .current_dir(dir.path())
        .args(["ocr", "--engine", "echo", "missing.png"])
        .assert()
        .failure();
}

#[test]
fn test_ocr_does_not_read_non_image_paths() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    // `missing.txt` doesn't exist, but its name already rules it out.
    cmd()
        .current_dir(dir.path())
        .args(["ocr", "--engine", "echo", "--text", "missing.txt", "a.png"])
        .assert()
        .success()
        .stdout("a.png\n");
}

#[test]
fn test_ocr_recognition_failure_is_reported_once() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    // Either `tesseract` is missing, or it can't read our fake PNG.
    cmd()
        .current_dir(dir.path())
        .env("RUST_LOG", "info")
        .env("PATH", dir.path())
        .args(["ocr", "--engine", "tesseract", "a.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("recognition failed"))
        .stderr(predicate::function(|stderr: &str| {
            stderr.matches("failed to recognize").count() == 1
        }));
}

#[test]
fn test_schema() {
    cmd()
        .args(["schema", "RecognitionResult"])
        .assert()
        .success()
        .stdout(predicate::str::contains("file_name"))
        .stdout(predicate::str::contains("confidence"));
}

#[test]
fn test_cache_list_and_activate_offline() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("cache");

    // Activation with no buckets is fine, and needs no network.
    cmd()
        .args(["cache", "--cache-dir"])
        .arg(&cache_dir)
        .arg("activate")
        .assert()
        .success();

    cmd()
        .args(["cache", "--cache-dir"])
        .arg(&cache_dir)
        .arg("list")
        .assert()
        .success()
        .stdout("");
}

#[test]
#[ignore = "Needs tesseract installed"]
fn test_ocr_tesseract() {
    let dir = tempfile::tempdir().unwrap();
    fs::copy("tests/fixtures/images/merhaba.png", dir.path().join("merhaba.png")).unwrap();

    cmd()
        .current_dir(dir.path())
        .args(["ocr", "--lang", "eng", "--text", "merhaba.png"])
        .assert()
        .success()
        .stdout(predicate::str::contains("MERHABA"));
}
