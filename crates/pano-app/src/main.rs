//! `pano`: bake equirectangular panoramas from captured photos.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p pano-app -- bake --manifest photos.ron` to bake a photo set.
//! Run with `cargo run -p pano-app -- simulate --gpu` for a synthetic end-to-end capture.

mod coverage;
mod error;
mod manifest;
mod pipeline;
mod simulate;
mod synthetic;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use glam::Quat;
use pano_config::{CliArgs, Config, default_config_dir};
use tracing::{error, info};

use crate::error::AppError;
use crate::manifest::Manifest;
use crate::synthetic::SyntheticCamera;

#[derive(Parser, Debug)]
#[command(name = "pano", about = "Guided panorama capture and equirectangular baking")]
struct Args {
    #[command(flatten)]
    cli: CliArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bake the photos listed in a RON manifest.
    Bake {
        /// Manifest listing image paths, orientations and intrinsics.
        #[arg(long)]
        manifest: PathBuf,

        /// Composite on the GPU when an adapter is available.
        #[arg(long)]
        gpu: bool,
    },
    /// Run a full capture session against a synthetic camera, then bake.
    Simulate {
        #[arg(long)]
        gpu: bool,

        /// Width of each synthetic photo in pixels.
        #[arg(long, default_value_t = 640)]
        photo_width: u32,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Resolve config directory
    let config_dir = args
        .cli
        .config
        .clone()
        .or_else(default_config_dir)
        .unwrap_or_else(|| PathBuf::from(".pano"));

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args.cli);

    let log_dir = config_dir.join("logs");
    pano_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    match run(args.command, &config) {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "pano failed");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: &Config) -> Result<PathBuf, AppError> {
    config.bake.validate()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("pano-io")
        .build()?;

    let (photos, use_gpu) = match command {
        Command::Bake { manifest, gpu } => {
            info!(manifest = %manifest.display(), "Loading photo manifest");
            let base_dir = manifest
                .parent()
                .map(PathBuf::from)
                .unwrap_or_default();
            let photos = Manifest::load(&manifest)?.into_photos(&base_dir)?;
            (photos, gpu)
        }
        Command::Simulate { gpu, photo_width } => {
            info!(photo_width, "Simulating capture session");
            let camera = SyntheticCamera::new(photo_width.max(1));
            let photos = runtime.block_on(simulate::run_capture(
                &config.capture,
                &camera,
                Quat::IDENTITY,
            ))?;
            pipeline::write_transport(&photos, &config.export.output_dir.join("poses.json"))?;
            (photos, gpu)
        }
    };
    info!(photos = photos.len(), "Baking");

    let compositor = pipeline::make_compositor(use_gpu);
    let panorama = pipeline::bake_photos(photos, config, compositor)?;
    let file = runtime.block_on(pipeline::export_panorama(&panorama, config))?;
    info!(path = %file.path.display(), bytes = file.bytes, "Done");
    Ok(file.path)
}
