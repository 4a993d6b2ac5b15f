//! JSON payloads exchanged on the bus.

use crate::{ids::RequestId, scene::Detection};
use serde::{Deserialize, Serialize};

/// `axis-is/camera/{id}/metadata`, inbound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataMessage {
    pub timestamp_us: i64,
    #[serde(default)]
    pub sequence: Option<i64>,
    #[serde(default)]
    pub motion_score: Option<f64>,
    #[serde(default)]
    pub object_count: Option<i32>,
    #[serde(default)]
    pub scene_hash: Option<i64>,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// `axis-is/camera/{id}/frame`, inbound. Messages missing any of these
/// three fields are dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMessage {
    pub request_id: RequestId,
    pub timestamp_us: i64,
    pub image_base64: String,
}

/// `axis-is/camera/{id}/status`, inbound. Kept as an opaque JSON map since
/// the edge is free to add fields (state, timestamp, version, …).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StatusMessage {
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// `axis-is/camera/{id}/frame_request`, outbound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRequestMessage {
    pub request_id: RequestId,
    pub reason: String,
    pub timestamp: i64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn metadata_message_parses_minimal_payload() {
        let json = r#"{"timestamp_us": 1000000}"#;
        let msg: MetadataMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.timestamp_us, 1_000_000);
        assert!(msg.detections.is_empty());
        assert_eq!(msg.motion_score, None);
    }

    #[test]
    fn frame_message_requires_all_three_fields() {
        let json = r#"{"timestamp_us": 1000000, "image_base64": "abc"}"#;
        let result: Result<FrameMessage, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn frame_request_message_roundtrips() {
        let msg = FrameRequestMessage {
            request_id: RequestId::new(),
            reason: "high_motion_0.90".to_string(),
            timestamp: 1_000_000,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: FrameRequestMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.reason, msg.reason);
        assert_eq!(back.request_id, msg.request_id);
    }
}
