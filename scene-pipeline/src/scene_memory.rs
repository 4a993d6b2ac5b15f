//! Scene Memory (C3). Maintains a bounded, timestamp-ordered ring of
//! entries per camera, merging metadata-only and image-bearing entries by
//! timestamp within a 1 second tolerance.

use crate::error::Result;
use crate::kv_store::KvStore;
use scene_pipeline_types::{
    CameraId, Detection, RequestId, SceneContext, SceneMemoryEntry, CORRELATION_TOLERANCE_US,
};
use std::collections::HashSet;
use std::sync::Arc;

pub struct SceneMemory {
    kv: Arc<dyn KvStore>,
    max_entries: usize,
    ttl_secs: u64,
}

impl SceneMemory {
    pub fn new(kv: Arc<dyn KvStore>, max_entries: usize, ttl_secs: u64) -> Self {
        Self {
            kv,
            max_entries,
            ttl_secs,
        }
    }

    /// Requires `timestamp_us > 0`; drops and logs otherwise. Callers are
    /// expected to have already validated `timestamp_us` (the bus router
    /// drops malformed payloads before this is reached); this just encodes
    /// the invariant defensively.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_metadata(
        &self,
        camera_id: &CameraId,
        timestamp_us: i64,
        frame_id: Option<i64>,
        motion_score: f64,
        object_count: i32,
        scene_hash: Option<i64>,
        detections: Vec<Detection>,
    ) -> Result<()> {
        if timestamp_us <= 0 {
            tracing::warn!(camera_id = %camera_id, "dropping metadata with non-positive timestamp");
            return Ok(());
        }
        let entry = SceneMemoryEntry::from_metadata_only(
            timestamp_us,
            frame_id,
            motion_score,
            object_count,
            scene_hash,
            detections,
        );
        self.kv
            .scene_memory_insert(camera_id, entry, self.max_entries, self.ttl_secs)
            .await
    }

    /// Finds the entry with minimum `|ts - entry.ts|` under the 1s
    /// tolerance; upgrades in place, or inserts an image-only entry if
    /// nothing matched (metadata may have been evicted before the image
    /// arrived).
    pub async fn add_frame_image(
        &self,
        camera_id: &CameraId,
        request_id: RequestId,
        timestamp_us: i64,
        image_base64: String,
    ) -> Result<()> {
        let entries = self.kv.scene_memory_all(camera_id).await?;

        let closest = entries
            .iter()
            .filter(|e| (e.timestamp_us - timestamp_us).abs() < CORRELATION_TOLERANCE_US)
            .min_by_key(|e| (e.timestamp_us - timestamp_us).abs());

        let updated = match closest {
            Some(entry) => {
                let mut upgraded = entry.clone();
                upgraded.has_image = true;
                upgraded.image_base64 = Some(image_base64);
                upgraded.request_id = Some(request_id);
                upgraded
            }
            None => SceneMemoryEntry::from_image_only(timestamp_us, request_id, image_base64),
        };

        self.kv
            .scene_memory_insert(camera_id, updated, self.max_entries, self.ttl_secs)
            .await
    }

    /// The `k` most recent entries, optionally filtered to those with
    /// images. Empty for an unknown camera.
    pub async fn recent(
        &self,
        camera_id: &CameraId,
        k: usize,
        with_images: bool,
    ) -> Result<Vec<SceneMemoryEntry>> {
        let mut entries = self.kv.scene_memory_all(camera_id).await?;
        if with_images {
            entries.retain(|e| e.has_image);
        }
        if k > 0 && entries.len() > k {
            entries.drain(0..entries.len() - k);
        }
        Ok(entries)
    }

    /// Aggregates over up to the last `max_entries` entries.
    pub async fn context(&self, camera_id: &CameraId) -> Result<SceneContext> {
        let entries = self.kv.scene_memory_all(camera_id).await?;
        if entries.is_empty() {
            return Ok(SceneContext::empty());
        }

        let frames_available = entries.len();
        let frames_with_images = entries.iter().filter(|e| e.has_image).count();
        let total_objects_detected: i64 = entries.iter().map(|e| e.object_count as i64).sum();
        let average_motion_score =
            entries.iter().map(|e| e.motion_score).sum::<f64>() / entries.len() as f64;

        let time_span_seconds = if entries.len() > 1 {
            (entries.last().unwrap().timestamp_us - entries.first().unwrap().timestamp_us) as f64
                / 1_000_000.0
        } else {
            0.0
        };

        let unique_object_classes: HashSet<u32> = entries
            .iter()
            .flat_map(|e| e.detections.iter().map(|d| d.class_id))
            .collect();

        Ok(SceneContext {
            frames_available,
            frames_with_images,
            time_span_seconds,
            total_objects_detected,
            average_motion_score: (average_motion_score * 1000.0).round() / 1000.0,
            unique_object_classes: unique_object_classes.len(),
            latest_timestamp: entries.last().map(|e| e.timestamp_us),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kv_store::InMemoryKvStore;

    fn memory() -> SceneMemory {
        SceneMemory::new(Arc::new(InMemoryKvStore::new()), 30, 600)
    }

    #[tokio::test]
    async fn scene_memory_size_never_exceeds_max_entries() {
        let memory = SceneMemory::new(Arc::new(InMemoryKvStore::new()), 30, 600);
        let camera = CameraId::new("cam-1");
        for i in 0..50 {
            memory
                .add_metadata(&camera, 1_000_000 + i, None, 0.1, 0, None, Vec::new())
                .await
                .unwrap();
        }
        let ctx = memory.context(&camera).await.unwrap();
        assert_eq!(ctx.frames_available, 30);
    }

    #[tokio::test]
    async fn entries_are_timestamp_ordered() {
        let memory = memory();
        let camera = CameraId::new("cam-1");
        memory
            .add_metadata(&camera, 3_000_000, None, 0.0, 0, None, Vec::new())
            .await
            .unwrap();
        memory
            .add_metadata(&camera, 1_000_000, None, 0.0, 0, None, Vec::new())
            .await
            .unwrap();
        memory
            .add_metadata(&camera, 2_000_000, None, 0.0, 0, None, Vec::new())
            .await
            .unwrap();
        let all = memory.recent(&camera, 0, false).await.unwrap();
        let timestamps: Vec<i64> = all.iter().map(|e| e.timestamp_us).collect();
        assert_eq!(timestamps, vec![1_000_000, 2_000_000, 3_000_000]);
    }

    #[tokio::test]
    async fn round_trip_preserves_metadata_fields() {
        let memory = memory();
        let camera = CameraId::new("cam-1");
        let detections = vec![Detection {
            class_id: 2,
            confidence: 0.9,
            bbox: None,
        }];
        memory
            .add_metadata(&camera, 5_000_000, Some(7), 0.42, 3, Some(99), detections.clone())
            .await
            .unwrap();

        let recent = memory.recent(&camera, 1, false).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].timestamp_us, 5_000_000);
        assert_eq!(recent[0].motion_score, 0.42);
        assert_eq!(recent[0].object_count, 3);
        assert_eq!(recent[0].scene_hash, Some(99));
        assert_eq!(recent[0].detections.len(), detections.len());
    }

    #[tokio::test]
    async fn frame_within_tolerance_merges_into_existing_entry() {
        let memory = memory();
        let camera = CameraId::new("cam-1");
        memory
            .add_metadata(&camera, 5_000_000, None, 0.1, 0, None, Vec::new())
            .await
            .unwrap();

        memory
            .add_frame_image(&camera, RequestId::new(), 5_000_250, "base64data".to_string())
            .await
            .unwrap();

        let all = memory.recent(&camera, 0, false).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].has_image);
        assert_eq!(all[0].timestamp_us, 5_000_000);
    }

    #[tokio::test]
    async fn frame_outside_tolerance_inserts_new_entry() {
        let memory = memory();
        let camera = CameraId::new("cam-1");
        memory
            .add_metadata(&camera, 5_000_000, None, 0.1, 0, None, Vec::new())
            .await
            .unwrap();

        memory
            .add_frame_image(&camera, RequestId::new(), 7_000_000, "base64data".to_string())
            .await
            .unwrap();

        let all = memory.recent(&camera, 0, false).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn context_is_empty_for_unknown_camera() {
        let memory = memory();
        let camera = CameraId::new("never-seen");
        let ctx = memory.context(&camera).await.unwrap();
        assert_eq!(ctx.frames_available, 0);
        assert_eq!(ctx.average_motion_score, 0.0);
    }
}
