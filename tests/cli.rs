//! CLI end-to-end tests
//!
//! Exercise the liveheic binary against real files in temp directories.
//! `--engine none` keeps outcomes deterministic on machines without
//! ImageMagick; the one test that needs a discovered engine is ignored.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the liveheic binary.
#[allow(deprecated)]
fn liveheic_cmd() -> Command {
    Command::cargo_bin("liveheic").unwrap()
}

fn write_file(dir: &Path, name: &str, bytes: &[u8]) {
    fs::write(dir.join(name), bytes).unwrap();
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = liveheic_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = liveheic_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("liveheic"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_flag() {
    let mut cmd = liveheic_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("liveheic"));
}

#[test]
fn test_cli_gen_config_is_valid_toml() {
    let mut cmd = liveheic_cmd();
    let temp = tempdir().unwrap();
    let assert = cmd.current_dir(temp.path()).arg("gen-config").assert().success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let value: toml::Value = toml::from_str(&stdout).expect("gen-config output must parse");
    assert!(value.get("convert").is_some());
    assert!(value.get("engine").is_some());
    assert!(value.get("processing").is_some());
}

#[test]
fn test_cli_pair_previews_grouping() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("import");
    fs::create_dir(&input).unwrap();
    write_file(&input, "IMG_0001.HEIC", &[1, 1, 1]);
    write_file(&input, "IMG_0001.MOV", &[2, 2]);
    write_file(&input, "beach.png", &[3]);
    write_file(&input, "notes.txt", b"not media");

    let mut cmd = liveheic_cmd();
    cmd.current_dir(temp.path())
        .args(["pair", "import"])
        .assert()
        .success()
        .stdout(predicate::str::contains("IMG_0001.HEIC (live pair"))
        .stdout(predicate::str::contains("beach.png (image"))
        .stdout(predicate::str::contains("notes.txt").not());
}

#[test]
fn test_cli_pair_nonexistent_input() {
    let temp = tempdir().unwrap();
    let mut cmd = liveheic_cmd();
    cmd.current_dir(temp.path())
        .args(["pair", "missing.heic"])
        .assert()
        .failure();
}

#[test]
fn test_cli_convert_video_only_succeeds_without_engine() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("import");
    fs::create_dir(&input).unwrap();
    write_file(&input, "clip.mov", &[9, 9, 9, 9]);

    let mut cmd = liveheic_cmd();
    cmd.current_dir(temp.path())
        .args(["convert", "--engine", "none", "--out", "out", "import"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 completed"));

    assert_eq!(
        fs::read(temp.path().join("out/clip.mov")).unwrap(),
        vec![9, 9, 9, 9]
    );
}

#[test]
fn test_cli_convert_without_engine_fails_image_units() {
    let temp = tempdir().unwrap();
    write_file(temp.path(), "photo.jpg", &[1, 2, 3]);

    let mut cmd = liveheic_cmd();
    cmd.current_dir(temp.path())
        .args(["convert", "--engine", "none", "--out", "out", "photo.jpg"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains(
            "photo.jpg failed: Conversion engine failed to load",
        ))
        .stdout(predicate::str::contains("1 failed"));
}

#[test]
fn test_cli_convert_retries_still_exit_nonzero_when_engine_missing() {
    let temp = tempdir().unwrap();
    write_file(temp.path(), "photo.jpg", &[1]);

    let mut cmd = liveheic_cmd();
    cmd.current_dir(temp.path())
        .args([
            "convert",
            "--engine",
            "none",
            "--retries",
            "2",
            "--out",
            "out",
            "photo.jpg",
        ])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_cli_convert_json_report() {
    let temp = tempdir().unwrap();
    write_file(temp.path(), "clip.mov", &[5, 5]);

    let mut cmd = liveheic_cmd();
    let assert = cmd
        .current_dir(temp.path())
        .args(["convert", "--engine", "none", "--json", "--out", "out", "clip.mov"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let report: serde_json::Value = serde_json::from_str(&stdout).expect("must emit JSON");
    assert_eq!(report["totals"]["units"], 1);
    assert_eq!(report["totals"]["completed"], 1);
    assert_eq!(report["units"][0]["kind"], "video");
}

#[test]
fn test_cli_convert_no_recognized_inputs() {
    let temp = tempdir().unwrap();
    write_file(temp.path(), "notes.txt", b"words");

    let mut cmd = liveheic_cmd();
    cmd.current_dir(temp.path())
        .args(["convert", "--engine", "none", "notes.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no image or video inputs"));
}

#[test]
fn test_cli_convert_requires_inputs() {
    let mut cmd = liveheic_cmd();
    cmd.arg("convert")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_config_file_sets_duplicate_policy() {
    let temp = tempdir().unwrap();
    let a = temp.path().join("a");
    let b = temp.path().join("b");
    fs::create_dir(&a).unwrap();
    fs::create_dir(&b).unwrap();
    write_file(&a, "x.jpg", &[1]);
    write_file(&b, "x.jpg", &[2]);

    let config = temp.path().join("strict.toml");
    fs::write(
        &config,
        r#"
[convert]
duplicates = "reject"
"#,
    )
    .unwrap();

    // Both files arrive under the bare name "x.jpg", which reject refuses.
    let mut cmd = liveheic_cmd();
    cmd.current_dir(temp.path())
        .args([
            "convert",
            "--config",
            "strict.toml",
            "--engine",
            "none",
            "a/x.jpg",
            "b/x.jpg",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("duplicate input name: x.jpg"));
}

#[test]
fn test_cli_rejects_unknown_config_key() {
    let temp = tempdir().unwrap();
    write_file(temp.path(), "clip.mov", &[1]);
    fs::write(
        temp.path().join("liveheic.toml"),
        r#"
[convert]
qualty = 90
"#,
    )
    .unwrap();

    let mut cmd = liveheic_cmd();
    cmd.current_dir(temp.path())
        .args(["convert", "--engine", "none", "clip.mov"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown field"));
}

#[test]
#[ignore] // Requires ImageMagick
fn test_cli_convert_passthrough_with_real_engine() {
    let temp = tempdir().unwrap();
    write_file(temp.path(), "photo.png", &[0x89, 0x50, 0x4E, 0x47]);

    let mut cmd = liveheic_cmd();
    cmd.current_dir(temp.path())
        .args(["convert", "--engine", "magick", "--out", "out", "photo.png"])
        .assert()
        .success()
        .stdout(predicate::str::contains("photo.png \u{2192} photo.png"));

    // Passthrough keeps bytes identical.
    assert_eq!(
        fs::read(temp.path().join("out/photo.png")).unwrap(),
        vec![0x89, 0x50, 0x4E, 0x47]
    );
}
