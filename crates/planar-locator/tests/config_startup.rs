#![cfg(feature = "image")]

mod common;

use std::path::{Path, PathBuf};

use common::*;
use planar_locator::io::{save_gray_image, start_from_config_file};
use planar_locator::{
    FrameHeader, FrameImage, LocatorConfig, Polarity, SearchConfig, SearchRange, StartupStep,
};

fn write_config(dir: &Path, reference: &str) -> PathBuf {
    let config = LocatorConfig {
        calibration: small_calibration_source(),
        reference_image: PathBuf::from(reference),
        roi: SMALL_ROI,
        search: SearchConfig {
            scale: SearchRange::fixed(1.0),
            polarity: Polarity::IgnoreGlobalPolarity,
            ..SearchConfig::default()
        },
        output_path: None,
        log_level: Some("warn".into()),
    };
    let path = dir.join("locator.json");
    config.write_json(&path).expect("write config");
    path
}

#[test]
fn config_file_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_config(dir.path(), "reference.png");
    let back = LocatorConfig::load_json(&path).expect("load");
    assert_eq!(back.roi, SMALL_ROI);
    assert_eq!(back.calibration, small_calibration_source());
    assert_eq!(back.search.scale, SearchRange::fixed(1.0));
    assert_eq!(back.search.polarity, Polarity::IgnoreGlobalPolarity);
    assert_eq!(back.reference_image, PathBuf::from("reference.png"));
}

#[test]
fn startup_from_config_file_detects_the_reference() {
    let dir = tempfile::tempdir().expect("tempdir");
    let reference = small_scene(&[SMALL_CENTER]);
    save_gray_image(&reference, dir.path().join("reference.png")).expect("save");
    let path = write_config(dir.path(), "reference.png");

    let (config, processor) = start_from_config_file(&path).expect("startup");
    assert_eq!(config.log_level(), Some(log::LevelFilter::Warn));

    let frame = small_scene(&[(248, 312)]);
    let out = processor.process_frame(&FrameImage::mono8(frame.view()), &FrameHeader::default());
    assert_eq!(out.records.len(), 1);
}

#[test]
fn startup_failures_report_their_step() {
    let dir = tempfile::tempdir().expect("tempdir");

    let err = start_from_config_file(dir.path().join("absent.json")).unwrap_err();
    assert_eq!(err.step, StartupStep::LoadConfig);

    let path = write_config(dir.path(), "missing.png");
    let err = start_from_config_file(&path).unwrap_err();
    assert_eq!(err.step, StartupStep::LoadReferenceImage);
    assert!(err.to_string().contains("missing.png"), "{err}");

    std::fs::write(&path, "{ not json").expect("write");
    let err = start_from_config_file(&path).unwrap_err();
    assert_eq!(err.step, StartupStep::LoadConfig);
}
