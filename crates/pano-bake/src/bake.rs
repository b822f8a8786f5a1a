//! Entry points shared by every compositing backend.

use std::time::Instant;

use pano_capture::PhotoPoint;
use pano_config::BakeOptions;

use crate::cpu::CpuCompositor;
use crate::error::BakeError;
use crate::job::BakeTicket;
use crate::panorama::Panorama;
use crate::source::PhotoSource;

/// A backend that turns prepared photos into an equirectangular panorama.
///
/// Implementations run the accumulation, normalization, deghosting and
/// rotation passes in that order and call [`BakeTicket::check`] between
/// photos and between passes.
pub trait Compositor {
    fn name(&self) -> &'static str;

    /// `sources` is never empty and `options` has been validated.
    fn composite(
        &mut self,
        sources: &[PhotoSource],
        options: &BakeOptions,
        ticket: &BakeTicket,
    ) -> Result<Panorama, BakeError>;
}

impl<C: Compositor + ?Sized> Compositor for Box<C> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn composite(
        &mut self,
        sources: &[PhotoSource],
        options: &BakeOptions,
        ticket: &BakeTicket,
    ) -> Result<Panorama, BakeError> {
        (**self).composite(sources, options, ticket)
    }
}

/// Bake on the CPU with a ticket that is never superseded.
pub fn bake(photos: &[PhotoPoint], options: &BakeOptions) -> Result<Panorama, BakeError> {
    bake_with(
        &mut CpuCompositor::new(),
        photos,
        options,
        &BakeTicket::detached(),
    )
}

/// Validate inputs and run `compositor` over every photo that has pixels.
///
/// Photos without pixel data are skipped; if none remain the result is
/// [`BakeError::NoInput`].
pub fn bake_with<C: Compositor + ?Sized>(
    compositor: &mut C,
    photos: &[PhotoPoint],
    options: &BakeOptions,
    ticket: &BakeTicket,
) -> Result<Panorama, BakeError> {
    options.validate()?;
    let sources = PhotoSource::collect(photos);
    if sources.is_empty() {
        tracing::warn!(photos = photos.len(), "No photo has pixel data, nothing to bake");
        return Err(BakeError::NoInput);
    }
    if sources.len() < photos.len() {
        tracing::debug!(
            skipped = photos.len() - sources.len(),
            "Skipping photos without pixel data"
        );
    }

    let start = Instant::now();
    tracing::info!(
        backend = compositor.name(),
        photos = sources.len(),
        width = options.width,
        height = options.height,
        encoding = ?options.encoding,
        "Baking panorama"
    );
    let panorama = compositor.composite(&sources, options, ticket)?;
    tracing::info!(
        backend = compositor.name(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Panorama baked"
    );
    Ok(panorama)
}
