//! Sphere sampling graph for guided panorama capture.
//!
//! A [`SphereGrid`] is a fixed set of 29 [`CapturePoint`]s arranged in five
//! bands around a reference orientation. Two relations connect them:
//! `neighbors` (symmetric, for traversal and display) and `unlock_parents`
//! (directed, gating which points may be captured next).

mod band;
mod grid;
mod point;

pub use band::{Band, ParsePointIdError, PointId};
pub use grid::{DEFAULT_SAMPLING_RADIUS, SphereGrid, generate_grid};
pub use point::{CapturePoint, FORWARD};
