use assert_cmd::Command;
use predicates::prelude::*;

mod common;

fn yolokit() -> Command {
    Command::cargo_bin("yolokit").unwrap()
}

#[test]
fn outputs_tool_name() {
    yolokit()
        .arg("-V")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("yolokit "));
}

#[test]
fn requires_a_subcommand() {
    yolokit().assert().failure();
}

// Prepare subcommand tests

#[test]
fn prepare_prints_summary_and_writes_layout() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let src = temp.path().join("raw");
    let dest = temp.path().join("dataset");
    common::write_source_folder(&src, 10, &[0, 1, 2, 3, 4, 5, 6, 7]);
    common::write_classes(&src, &["cat"]);

    yolokit()
        .args(["prepare", "--src"])
        .arg(&src)
        .arg("--dest")
        .arg(&dest)
        .args(["--val", "0.2", "--seed", "42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total images: 10"))
        .stdout(predicate::str::contains("Images missing label files:"))
        .stdout(predicate::str::contains(" - img_08.jpg"))
        .stdout(predicate::str::contains(" - img_09.jpg"))
        .stdout(predicate::str::contains("Done."));

    for dir in ["images/train", "images/val", "labels/train", "labels/val"] {
        assert!(dest.join(dir).is_dir(), "{dir} missing");
    }
    let data_yaml = std::fs::read_to_string(dest.join("data.yaml")).expect("read data.yaml");
    assert!(data_yaml.contains("nc: 1"));
    assert!(data_yaml.contains("cat"));
}

#[test]
fn prepare_warns_when_classes_file_is_missing() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let src = temp.path().join("raw");
    let dest = temp.path().join("dataset");
    common::write_source_folder(&src, 2, &[0, 1]);

    yolokit()
        .args(["prepare", "--src"])
        .arg(&src)
        .arg("--dest")
        .arg(&dest)
        .assert()
        .success()
        .stderr(predicate::str::contains("classes.txt not found"));

    let data_yaml = std::fs::read_to_string(dest.join("data.yaml")).expect("read data.yaml");
    assert!(data_yaml.contains("nc: 0"));
}

#[test]
fn prepare_empty_source_exits_cleanly_without_destination() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let src = temp.path().join("raw");
    std::fs::create_dir_all(&src).expect("create src");
    let dest = temp.path().join("dataset");

    yolokit()
        .args(["prepare", "--src"])
        .arg(&src)
        .arg("--dest")
        .arg(&dest)
        .assert()
        .success()
        .stdout(predicate::str::contains("No images found in"));

    assert!(!dest.exists());
}

#[test]
fn prepare_json_output() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let src = temp.path().join("raw");
    common::write_source_folder(&src, 4, &[0]);

    yolokit()
        .args(["prepare", "--output", "json", "--src"])
        .arg(&src)
        .arg("--dest")
        .arg(temp.path().join("dataset"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"train_count\": 3"))
        .stdout(predicate::str::contains("\"val_count\": 1"));
}

#[test]
fn prepare_rejects_invalid_fraction() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let src = temp.path().join("raw");
    common::write_source_folder(&src, 2, &[]);

    yolokit()
        .args(["prepare", "--val", "1.5", "--src"])
        .arg(&src)
        .arg("--dest")
        .arg(temp.path().join("dataset"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid split parameters"));
}

// Detect subcommand tests

#[test]
fn detect_requires_image() {
    yolokit()
        .arg("detect")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--image"));
}

#[test]
fn detect_unreadable_image_fails() {
    let temp = tempfile::tempdir().expect("create temp dir");

    yolokit()
        .args(["detect", "-i"])
        .arg(temp.path().join("missing.jpg"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot read image"));

    assert!(!temp.path().join("missing_detected.jpg").exists());
}

#[test]
fn detect_unreachable_url_fails_without_output() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let output = temp.path().join("out.jpg");

    yolokit()
        .args(["detect", "-i", "http://127.0.0.1:9/cat.jpg", "-o"])
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot download image"));

    assert!(!output.exists());
}

#[test]
fn detect_missing_model_fails() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let image = common::write_png(&temp.path().join("scene.png"), 16, 16);

    yolokit()
        .args(["detect", "-i"])
        .arg(&image)
        .arg("-m")
        .arg(temp.path().join("missing.onnx"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load model"));

    assert!(!temp.path().join("scene_detected.png").exists());
}

#[test]
fn detect_rejects_invalid_confidence() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let image = common::write_png(&temp.path().join("scene.png"), 16, 16);

    yolokit()
        .args(["detect", "-c", "1.5", "-i"])
        .arg(&image)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--conf"));
}

#[cfg(unix)]
#[test]
fn prepare_json_fails_for_non_utf8_source() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let temp = tempfile::tempdir().expect("create temp dir");
    let src = temp.path().join(OsStr::from_bytes(b"raw_\xff"));
    common::write_source_folder(&src, 2, &[0, 1]);

    yolokit()
        .args(["prepare", "--output", "json", "--src"])
        .arg(&src)
        .arg("--dest")
        .arg(temp.path().join("dataset"))
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Failed to serialize report"));
}
