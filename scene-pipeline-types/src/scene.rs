use crate::ids::RequestId;
use serde::{Deserialize, Serialize};

/// A single detected object within a metadata event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A scene-memory entry as stored per camera. Mutated in place by
/// `add_frame_image` when a matching image arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMemoryEntry {
    pub timestamp_us: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<i64>,
    #[serde(default)]
    pub motion_score: f64,
    #[serde(default)]
    pub object_count: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_hash: Option<i64>,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub has_image: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
}

impl SceneMemoryEntry {
    pub fn from_metadata_only(
        timestamp_us: i64,
        frame_id: Option<i64>,
        motion_score: f64,
        object_count: i32,
        scene_hash: Option<i64>,
        detections: Vec<Detection>,
    ) -> Self {
        Self {
            timestamp_us,
            frame_id,
            motion_score,
            object_count,
            scene_hash,
            detections,
            has_image: false,
            image_base64: None,
            request_id: None,
        }
    }

    pub fn from_image_only(timestamp_us: i64, request_id: RequestId, image_base64: String) -> Self {
        Self {
            timestamp_us,
            frame_id: None,
            motion_score: 0.0,
            object_count: 0,
            scene_hash: None,
            detections: Vec::new(),
            has_image: true,
            image_base64: Some(image_base64),
            request_id: Some(request_id),
        }
    }
}

/// Aggregate statistics over the most recent scene-memory entries, used
/// both to build the analysis prompt and as the result of `context()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneContext {
    pub frames_available: usize,
    pub frames_with_images: usize,
    pub time_span_seconds: f64,
    pub total_objects_detected: i64,
    pub average_motion_score: f64,
    pub unique_object_classes: usize,
    pub latest_timestamp: Option<i64>,
}

impl SceneContext {
    pub fn empty() -> Self {
        Self {
            frames_available: 0,
            frames_with_images: 0,
            time_span_seconds: 0.0,
            total_objects_detected: 0,
            average_motion_score: 0.0,
            unique_object_classes: 0,
            latest_timestamp: None,
        }
    }
}
