//! Readback/export bridge for baked panoramas.
//!
//! Raw RGBA8 frames are mirrored and yaw-shifted as configured, encoded to PNG
//! on a worker task, and written to disk. Every request is correlated by id
//! and bounded by its own timeout; a liveness handshake gates the first one.

mod bridge;
mod encode;
mod error;
mod transform;

pub use bridge::{BridgeEvent, EncodeRequest, EncoderWorker, ExportBridge, FileRef, bridge_channel};
pub use encode::{FrameEncoder, PngEncoder};
pub use error::ExportError;
pub use transform::{
    ExportOptions, TransformReport, apply_transform, flip, shift_columns, yaw_shift_columns,
};
