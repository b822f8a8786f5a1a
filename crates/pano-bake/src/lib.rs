//! Equirectangular panorama baking.
//!
//! Captured photos are reprojected onto a full sphere and blended with
//! per-texel weights that favor each photo's center, its frontal incidence
//! and, for horizon photos, its forward direction. The low-frequency band of
//! every photo is blended broadly while the high-frequency detail is taken
//! almost exclusively from the dominant photo. A deghosting pass then pulls
//! luminance outliers toward their local median and an optional rotation
//! corrects the final orientation.
//!
//! Two backends implement [`Compositor`]: [`CpuCompositor`] (scoped worker
//! threads, always available) and [`GpuCompositor`] (headless wgpu). Both
//! share the weight functions in [`weights`] and produce the same layout.

mod bake;
pub mod color;
mod cpu;
mod error;
pub mod gpu;
mod job;
mod panorama;
mod source;
pub mod sphere;
pub mod weights;

pub use bake::{Compositor, bake, bake_with};
pub use cpu::{CpuCompositor, ghost_texel, normalize_texel, sample_wrapped};
pub use error::BakeError;
pub use gpu::{GpuCompositor, GpuContext, init_gpu_context_blocking};
pub use job::{BakeResult, BakeScheduler, BakeTicket, BakeWorker};
pub use panorama::{Panorama, PanoramaPixels};
pub use source::{LOW_PASS_LEVEL, LinearImage, PhotoSource};
pub use weights::{PhotoProjection, TexelWeights, texel_weights};
