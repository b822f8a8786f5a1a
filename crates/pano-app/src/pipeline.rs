//! Photos in, panorama file out.

use std::path::Path;
use std::time::Duration;

use pano_bake::{BakeWorker, Compositor, CpuCompositor, GpuCompositor, Panorama, PhotoSource};
use pano_capture::{PhotoPoint, PhotoTransport};
use pano_config::Config;
use pano_export::{ExportBridge, FileRef};
use tracing::{info, warn};

use crate::coverage::write_coverage;
use crate::error::AppError;

const BAKE_TIMEOUT: Duration = Duration::from_secs(600);

/// GPU compositor if requested and available, otherwise the CPU one.
pub fn make_compositor(use_gpu: bool) -> Box<dyn Compositor + Send> {
    if use_gpu {
        match GpuCompositor::new_blocking() {
            Ok(gpu) => return Box::new(gpu),
            Err(e) => warn!(error = %e, "GPU compositor unavailable, falling back to CPU"),
        }
    }
    Box::new(CpuCompositor::new())
}

/// Bake on a worker thread and wait for the result.
pub fn bake_photos(
    photos: Vec<PhotoPoint>,
    config: &Config,
    compositor: Box<dyn Compositor + Send>,
) -> Result<Panorama, AppError> {
    if config.debug.dump_weights {
        let sources = PhotoSource::collect(&photos);
        write_coverage(
            &sources,
            &config.bake,
            &config.export.output_dir.join("coverage.png"),
        )?;
    }

    let backend = compositor.name();
    let worker = BakeWorker::spawn(compositor)?;
    let generation = worker.submit(photos, config.bake.clone());
    let outcome = worker
        .wait(BAKE_TIMEOUT)
        .ok_or(AppError::BakeTimeout(BAKE_TIMEOUT.as_secs()))?;
    let panorama = outcome.result?;
    info!(
        generation,
        backend,
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        width = panorama.width,
        height = panorama.height,
        "Bake complete"
    );
    Ok(panorama)
}

/// Encode through the export bridge and write the configured file.
pub async fn export_panorama(panorama: &Panorama, config: &Config) -> Result<FileRef, AppError> {
    let bridge = ExportBridge::spawn(&config.export);
    let file = bridge
        .export(panorama.to_rgba8(), panorama.width, panorama.height)
        .await?;
    Ok(file)
}

/// Photo poses in the transport format, next to the panorama.
pub fn write_transport(photos: &[PhotoPoint], path: &Path) -> Result<(), AppError> {
    let records: Vec<PhotoTransport> = photos.iter().map(PhotoPoint::transport).collect();
    let contents = serde_json::to_string_pretty(&records)?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, contents)?;
    info!(path = %path.display(), photos = records.len(), "Wrote photo poses");
    Ok(())
}
