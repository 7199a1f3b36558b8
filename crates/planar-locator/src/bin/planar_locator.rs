//! planar-locator CLI: build the template model from a JSON config, then
//! locate the marker in each frame file and print one JSON line per frame.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;
use planar_locator::{
    io as locator_io, FrameHeader, FrameImage, FrameOutput, JsonLinesEmitter, LocatorConfig,
    ResultEmitter, Stamp, StartupError, StartupStep,
};

#[derive(Parser, Debug)]
#[command(name = "planar-locator")]
#[command(about = "Locate a calibrated planar marker in image frames")]
#[command(version)]
struct Cli {
    /// JSON config with calibration, reference image, ROI and search settings.
    #[arg(long)]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace); overrides the config.
    #[arg(long)]
    log_level: Option<LevelFilter>,

    /// Emit structured JSON logs (requires the `tracing` feature).
    #[arg(long)]
    json_logs: bool,

    /// Frame images, processed in order.
    frames: Vec<PathBuf>,
}

#[cfg(feature = "tracing")]
fn init_logging(level: LevelFilter, json: bool) {
    if json {
        planar_locator::core::init_tracing(level, true);
    } else {
        let _ = planar_locator::core::init_with_level(level);
    }
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: LevelFilter, json: bool) {
    if json {
        eprintln!("--json-logs needs the `tracing` feature; using plain logs");
    }
    let _ = planar_locator::core::init_with_level(level);
}

fn frame_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn run(cli: &Cli, config: &LocatorConfig) -> Result<(), Box<dyn std::error::Error>> {
    let processor = locator_io::start_from_config(config, cli.config.parent())?;

    let sink: Box<dyn Write> = match &config.output_path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    let mut emitter = JsonLinesEmitter::new(sink);

    let mut found = 0usize;
    for (i, path) in cli.frames.iter().enumerate() {
        let header = FrameHeader {
            stamp: Stamp::new(i as i64, 0),
            frame_id: frame_id(path),
        };
        let output = match locator_io::load_gray_image(path) {
            Ok(img) => processor.process_frame(&FrameImage::mono8(img.view()), &header),
            Err(err) => {
                log::warn!("frame `{}` skipped: {err}", header.frame_id);
                FrameOutput::empty(header)
            }
        };
        found += output.records.len();
        emitter.emit(&output)?;
    }
    log::info!("{} frames, {found} detections", cli.frames.len());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = LocatorConfig::load_json(&cli.config)
        .map_err(|e| StartupError::new(StartupStep::LoadConfig, e));
    let level = cli
        .log_level
        .or_else(|| config.as_ref().ok().and_then(|c| c.log_level()))
        .unwrap_or(LevelFilter::Info);
    init_logging(level, cli.json_logs);

    let result = config
        .map_err(Box::<dyn std::error::Error>::from)
        .and_then(|config| run(&cli, &config));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
