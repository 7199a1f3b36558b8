#![cfg(feature = "cli")]

mod common;

use std::path::PathBuf;

use assert_cmd::Command;
use common::*;
use planar_locator::io::save_gray_image;
use planar_locator::{FrameOutput, GrayImage, LocatorConfig, SearchConfig};
use predicates::prelude::*;

fn locator() -> Command {
    Command::new(env!("CARGO_BIN_EXE_planar-locator"))
}

#[test]
fn prints_one_json_line_per_frame() {
    let dir = tempfile::tempdir().expect("tempdir");
    save_gray_image(&small_scene(&[SMALL_CENTER]), dir.path().join("reference.png")).expect("save");
    save_gray_image(&small_scene(&[(176, 128)]), dir.path().join("shifted.png")).expect("save");
    save_gray_image(
        &GrayImage::filled(SMALL_SIZE.0, SMALL_SIZE.1, BACKGROUND),
        dir.path().join("blank.png"),
    )
    .expect("save");

    let config = LocatorConfig {
        calibration: small_calibration_source(),
        reference_image: PathBuf::from("reference.png"),
        roi: SMALL_ROI,
        search: SearchConfig::default(),
        output_path: None,
        log_level: None,
    };
    let config_path = dir.path().join("locator.json");
    config.write_json(&config_path).expect("config");

    let assert = locator()
        .arg("--config")
        .arg(&config_path)
        .arg("--log-level")
        .arg("warn")
        .arg(dir.path().join("shifted.png"))
        .arg(dir.path().join("blank.png"))
        .arg(dir.path().join("missing.png"))
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let frames: Vec<FrameOutput> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).expect("json line"))
        .collect();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].header.frame_id, "shifted");
    assert_eq!(frames[0].records.len(), 1);
    assert_eq!(frames[0].records[0].orientation, [0.0, 0.0, 0.0, 1.0]);
    assert!(frames[1].is_empty());
    assert_eq!(frames[1].header.stamp.secs, 1);
    assert!(frames[2].is_empty());
}

#[test]
fn missing_config_fails_with_the_startup_step() {
    let dir = tempfile::tempdir().expect("tempdir");
    locator()
        .arg("--config")
        .arg(dir.path().join("nope.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("loading configuration"));
}

#[test]
fn log_level_flag_is_parsed() {
    let dir = tempfile::tempdir().expect("tempdir");
    locator()
        .arg("--config")
        .arg(dir.path().join("nope.json"))
        .arg("--log-level")
        .arg("loud")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--log-level"));

    // a valid level gets past argument parsing and fails on the config instead
    locator()
        .arg("--config")
        .arg(dir.path().join("nope.json"))
        .arg("--log-level")
        .arg("debug")
        .assert()
        .failure()
        .stderr(predicate::str::contains("loading configuration"));
}

#[test]
fn unreadable_reference_fails_startup() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = LocatorConfig {
        calibration: small_calibration_source(),
        reference_image: dir.path().join("absent.png"),
        roi: SMALL_ROI,
        search: SearchConfig::default(),
        output_path: None,
        log_level: None,
    };
    let config_path = dir.path().join("locator.json");
    config.write_json(&config_path).expect("config");
    locator()
        .arg("--config")
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("loading reference image"));
}
