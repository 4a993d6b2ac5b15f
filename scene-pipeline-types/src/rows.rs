use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `camera_events` row. `id` is server-assigned and monotonically
/// increasing per store; immutable after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraEventRow {
    pub id: i64,
    pub camera_id: String,
    pub timestamp_us: i64,
    pub frame_id: Option<i64>,
    pub metadata: serde_json::Value,
    pub motion_score: Option<f64>,
    pub object_count: Option<i32>,
    pub scene_hash: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// `claude_analyses` row. Nothing about the field layout is
/// provider-specific; the table holds results from either variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRow {
    pub id: i64,
    pub camera_id: String,
    pub trigger_event_id: Option<i64>,
    pub timestamp_us: i64,
    pub summary: String,
    pub full_response: serde_json::Value,
    pub frames_analyzed: i32,
    pub analysis_duration_ms: i32,
    pub created_at: DateTime<Utc>,
}

/// `alerts` row. The schema is bootstrapped by C2 but nothing in the core
/// currently writes to it — the `event`/`alert` topic handlers are
/// placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub camera_id: String,
    pub analysis_id: Option<i64>,
    pub alert_type: String,
    pub severity: i32,
    pub message: String,
    pub metadata: Option<serde_json::Value>,
    pub acknowledged: bool,
    pub created_at: DateTime<Utc>,
}
