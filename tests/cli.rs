use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use xlabel::ir::io_json::to_json_string_pretty;
use xlabel::ir::{Annotation, AnnotationSet, BBox};

mod common;
use common::{pets_set, write_png};

fn xlabel() -> Command {
    let mut cmd = Command::cargo_bin("xlabel").unwrap();
    cmd.env_remove("XLABEL_STRICT")
        .env_remove("XLABEL_FORMAT_VERSION")
        .env_remove("XLABEL_LOG");
    cmd
}

fn write_sidecar(path: &Path, set: &AnnotationSet) {
    fs::write(path, to_json_string_pretty(set).unwrap()).unwrap();
}

/// Writes `pets.png` (300x300) plus its sidecar and embeds them into `tagged.png`.
fn tagged_pets(dir: &Path) -> std::path::PathBuf {
    let image = dir.join("pets.png");
    let sidecar = dir.join("pets.json");
    let tagged = dir.join("tagged.png");
    write_png(&image, 300, 300);
    write_sidecar(&sidecar, &pets_set());

    xlabel()
        .arg("create")
        .arg(&image)
        .arg(&sidecar)
        .arg(&tagged)
        .assert()
        .success();
    tagged
}

#[test]
fn runs() {
    xlabel().assert().success();
}

#[test]
fn outputs_tool_name() {
    xlabel().arg("-V").assert().success().stdout("xlabel 0.2.0\n");
}

#[test]
fn create_then_read_prints_the_annotations() {
    let temp = tempfile::tempdir().unwrap();
    let tagged = tagged_pets(temp.path());

    xlabel()
        .arg("read")
        .arg(&tagged)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"cat\""))
        .stdout(predicate::str::contains("\"width\": 300"));
}

#[test]
fn create_refuses_to_overwrite_without_flag() {
    let temp = tempfile::tempdir().unwrap();
    let tagged = tagged_pets(temp.path());

    xlabel()
        .arg("create")
        .arg(temp.path().join("pets.png"))
        .arg(temp.path().join("pets.json"))
        .arg(&tagged)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    xlabel()
        .arg("create")
        .arg(temp.path().join("pets.png"))
        .arg(temp.path().join("pets.json"))
        .arg(&tagged)
        .arg("--overwrite")
        .assert()
        .success();
}

#[test]
fn read_without_annotation_chunk_fails() {
    let temp = tempfile::tempdir().unwrap();
    let plain = temp.path().join("plain.png");
    write_png(&plain, 8, 8);

    xlabel()
        .arg("read")
        .arg(&plain)
        .assert()
        .failure()
        .stderr(predicate::str::contains("xlDa"));
}

#[test]
fn validate_embedded_annotations_succeeds() {
    let temp = tempfile::tempdir().unwrap();
    let tagged = tagged_pets(temp.path());

    xlabel()
        .arg("validate")
        .arg(&tagged)
        .assert()
        .success()
        .stdout(predicate::str::contains("Validation passed"));
}

#[test]
fn validate_invalid_sidecar_fails_with_json_report() {
    let temp = tempfile::tempdir().unwrap();
    let sidecar = temp.path().join("bad.json");
    let set = pets_set().with_annotation(Annotation::new(7, BBox::from_xywh(1.0, 1.0, 2.0, 2.0)));
    write_sidecar(&sidecar, &set);

    xlabel()
        .args(["validate", "--output", "json"])
        .arg(&sidecar)
        .assert()
        .failure()
        .stdout(predicate::str::contains("ClassIdOutOfRange"))
        .stdout(predicate::str::contains("\"error_count\": 1"));
}

#[test]
fn export_to_yolo_writes_labels_and_class_list() {
    let temp = tempfile::tempdir().unwrap();
    let tagged = tagged_pets(temp.path());
    let labels = temp.path().join("out").join("pets.txt");
    fs::create_dir_all(labels.parent().unwrap()).unwrap();

    xlabel()
        .args(["export", "--to", "yolo", "--report", "text"])
        .arg(&tagged)
        .arg("-o")
        .arg(&labels)
        .assert()
        .success()
        .stdout(predicate::str::contains("Converted"));

    let text = fs::read_to_string(&labels).unwrap();
    assert!(text.starts_with("0 0.333333 0.366667 0.333333 0.400000"), "{text}");
    assert_eq!(
        fs::read_to_string(temp.path().join("out").join("classes.txt")).unwrap(),
        "cat\ndog\n"
    );
}

#[test]
fn export_to_voc_reports_dropped_scores() {
    let temp = tempfile::tempdir().unwrap();
    let tagged = tagged_pets(temp.path());
    let xml = temp.path().join("pets.xml");

    xlabel()
        .args(["export", "--to", "pascal-voc", "--report", "json"])
        .arg(&tagged)
        .arg("-o")
        .arg(&xml)
        .assert()
        .success()
        .stdout(predicate::str::contains("drop_scores"));

    assert!(fs::read_to_string(&xml).unwrap().contains("<name>cat</name>"));
}

#[test]
fn import_yolo_needs_no_dims_on_the_command_line() {
    let temp = tempfile::tempdir().unwrap();
    let image = temp.path().join("img.png");
    let labels = temp.path().join("img.txt");
    let classes = temp.path().join("classes.txt");
    let tagged = temp.path().join("tagged.png");
    write_png(&image, 200, 100);
    fs::write(&labels, "0 0.5 0.5 0.2 0.3\n").unwrap();
    fs::write(&classes, "cat\n").unwrap();

    xlabel()
        .args(["import", "--from", "yolo"])
        .arg(&image)
        .arg("--annotations")
        .arg(&labels)
        .arg("--classes")
        .arg(&classes)
        .arg("-o")
        .arg(&tagged)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 annotation(s)"));

    xlabel()
        .arg("read")
        .arg(&tagged)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"img.png\""));
}

#[test]
fn batch_create_with_missing_sidecar_exits_non_zero() {
    let temp = tempfile::tempdir().unwrap();
    let images = temp.path().join("images");
    let sidecars = temp.path().join("sidecars");
    let out = temp.path().join("tagged");
    write_png(&images.join("a.png"), 300, 300);
    write_png(&images.join("b.png"), 300, 300);
    fs::create_dir_all(&sidecars).unwrap();
    write_sidecar(&sidecars.join("a.json"), &pets_set());

    xlabel()
        .arg("create")
        .arg(&images)
        .arg(&sidecars)
        .arg(&out)
        .assert()
        .failure()
        .stdout(predicate::str::contains("1 succeeded, 1 failed"))
        .stderr(predicate::str::contains("1 of 2 file(s) failed"));

    assert!(out.join("a.png").exists());
    assert!(!out.join("b.png").exists());
}

#[test]
fn unknown_format_is_rejected_by_the_parser() {
    xlabel()
        .args(["export", "--to", "tfrecord", "in.png", "-o", "out"])
        .assert()
        .failure();
}
