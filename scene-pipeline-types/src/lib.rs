//! Wire payloads, persisted row types, and small newtypes shared by every
//! component of the scene pipeline.

pub mod coco;
mod ids;
mod rows;
mod scene;
mod wire;

pub use coco::class_name;
pub use ids::{CameraId, RequestId};
pub use rows::{Alert, AnalysisRow, CameraEventRow};
pub use scene::{Detection, SceneContext, SceneMemoryEntry};
pub use wire::{FrameMessage, FrameRequestMessage, MetadataMessage, StatusMessage};

/// Number of microseconds within which a metadata entry and an arriving
/// image are considered to describe the same moment.
pub const CORRELATION_TOLERANCE_US: i64 = 1_000_000;
