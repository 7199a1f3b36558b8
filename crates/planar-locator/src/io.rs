//! Image-file helpers (feature `image`).

use std::path::Path;

use planar_locator_core::{GrayImage, GrayImageView};

use crate::config::LocatorConfig;
use crate::error::{LocatorError, StartupError, StartupStep};
use crate::pipeline::{start, FrameProcessor};

/// Borrow an `image::GrayImage` as a core view.
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Load any supported image file and convert it to 8-bit grayscale.
pub fn load_gray_image(path: impl AsRef<Path>) -> Result<GrayImage, LocatorError> {
    let path = path.as_ref();
    let img = ::image::open(path)
        .map_err(|e| LocatorError::Input(format!("cannot read image {}: {e}", path.display())))?
        .to_luma8();
    Ok(GrayImage {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.into_raw(),
    })
}

/// Write a grayscale image (PNG, or whatever the extension selects).
pub fn save_gray_image(img: &GrayImage, path: impl AsRef<Path>) -> Result<(), LocatorError> {
    let path = path.as_ref();
    let buf = ::image::GrayImage::from_raw(img.width as u32, img.height as u32, img.data.clone())
        .ok_or_else(|| LocatorError::Input(format!("image buffer does not match {}x{}", img.width, img.height)))?;
    buf.save(path)
        .map_err(|e| LocatorError::Input(format!("cannot write image {}: {e}", path.display())))
}

/// Full startup from a parsed config: calibration, reference image, model.
/// Relative image paths resolve against `config_dir`.
pub fn start_from_config(
    config: &LocatorConfig,
    config_dir: Option<&Path>,
) -> Result<FrameProcessor, StartupError> {
    let path = config.reference_image_path(config_dir);
    let reference =
        load_gray_image(&path).map_err(|e| StartupError::new(StartupStep::LoadReferenceImage, e))?;
    log::info!(
        "reference image {} ({}x{})",
        path.display(),
        reference.width,
        reference.height
    );
    start(
        config.calibration.clone(),
        &reference.view(),
        &config.roi,
        &config.search,
    )
}

/// [`start_from_config`] for a config file on disk.
pub fn start_from_config_file(
    path: impl AsRef<Path>,
) -> Result<(LocatorConfig, FrameProcessor), StartupError> {
    let path = path.as_ref();
    let config =
        LocatorConfig::load_json(path).map_err(|e| StartupError::new(StartupStep::LoadConfig, e))?;
    let processor = start_from_config(&config, path.parent())?;
    Ok((config, processor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::small_scene;

    #[test]
    fn png_round_trip_preserves_pixels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("scene.png");
        let img = small_scene(&[(320, 240)]);
        save_gray_image(&img, &path).expect("save");
        let back = load_gray_image(&path).expect("load");
        assert_eq!((back.width, back.height), (640, 480));
        assert_eq!(back.data, img.data);
    }

    #[test]
    fn missing_files_are_input_errors() {
        let err = load_gray_image("/definitely/not/here.png").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Input);
    }
}
