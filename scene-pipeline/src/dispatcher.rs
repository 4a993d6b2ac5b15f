//! Analysis Dispatcher (C6). Bounded-concurrency worker that reads
//! image-bearing scene memory, builds the analysis prompt, submits it to
//! the configured provider, and persists the result.

use crate::db_store::{NewAnalysis, RelationalStore};
use crate::provider::{build_analysis_prompt, VisionProvider};
use crate::scene_memory::SceneMemory;
use crate::stats::PipelineStats;
use scene_pipeline_types::CameraId;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

pub struct AnalysisDispatcher {
    scene_memory: Arc<SceneMemory>,
    db: Arc<dyn RelationalStore>,
    provider: Arc<dyn VisionProvider>,
    stats: Arc<PipelineStats>,
    semaphore: Arc<Semaphore>,
    provider_timeout: Duration,
}

impl AnalysisDispatcher {
    pub fn new(
        scene_memory: Arc<SceneMemory>,
        db: Arc<dyn RelationalStore>,
        provider: Arc<dyn VisionProvider>,
        stats: Arc<PipelineStats>,
        max_concurrent: usize,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            scene_memory,
            db,
            provider,
            stats,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            provider_timeout,
        }
    }

    /// Returns the persisted analysis id, or `None` if there was nothing
    /// to analyze or the provider call failed — neither case is an error
    /// the caller needs to propagate.
    pub async fn analyze(
        &self,
        camera_id: &CameraId,
        trigger_event_id: Option<i64>,
        trigger_motion_score: f64,
        trigger_detections: &[scene_pipeline_types::Detection],
    ) -> Option<i64> {
        // 1. acquire semaphore; callers beyond the bound queue rather
        // than being rejected.
        let _permit = self.semaphore.acquire().await.ok()?;
        self.stats.record_analysis_triggered();
        let start = Instant::now();

        // 2. up to 5 most recent image-bearing entries
        let frames = match self.scene_memory.recent(camera_id, 5, true).await {
            Ok(frames) => frames,
            Err(err) => {
                tracing::warn!(camera_id = %camera_id, error = %err, "scene memory read failed");
                return None;
            }
        };
        if frames.is_empty() {
            tracing::warn!(camera_id = %camera_id, "no image-bearing frames available for analysis");
            return None;
        }

        // 3. scene context
        let context = match self.scene_memory.context(camera_id).await {
            Ok(context) => context,
            Err(err) => {
                tracing::warn!(camera_id = %camera_id, error = %err, "scene context read failed");
                return None;
            }
        };

        // 4. build prompt
        let prompt = build_analysis_prompt(
            camera_id.as_str(),
            trigger_motion_score,
            trigger_detections,
            &context,
        );
        let images: Vec<String> = frames.iter().filter_map(|f| f.image_base64.clone()).collect();

        // 5. submit with per-call timeout
        let response = match self.provider.submit(&prompt, &images, self.provider_timeout).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(camera_id = %camera_id, error = %err, "provider call failed");
                return None;
            }
        };

        let duration_ms = start.elapsed().as_millis() as i32;

        // 6. persist
        let result = self
            .db
            .insert_analysis(NewAnalysis {
                camera_id: camera_id.as_str().to_string(),
                trigger_event_id,
                timestamp_us: chrono::Utc::now().timestamp_micros(),
                summary: response.summary,
                full_response: response.full_response,
                frames_analyzed: frames.len() as i32,
                duration_ms,
            })
            .await;

        match result {
            Ok(analysis_id) => {
                self.stats.record_analysis_persisted();
                Some(analysis_id)
            }
            Err(err) => {
                tracing::warn!(camera_id = %camera_id, error = %err, "failed to persist analysis");
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_store::InMemoryRelationalStore;
    use crate::kv_store::InMemoryKvStore;
    use crate::provider::{FakeProvider, ProviderResponse};
    use scene_pipeline_types::RequestId;

    #[tokio::test]
    async fn returns_none_when_no_image_bearing_frames() {
        let scene_memory = Arc::new(SceneMemory::new(Arc::new(InMemoryKvStore::new()), 30, 600));
        let db = Arc::new(InMemoryRelationalStore::new());
        let provider = Arc::new(FakeProvider::new(ProviderResponse {
            summary: "unused".to_string(),
            full_response: serde_json::json!({}),
        }));
        let dispatcher = AnalysisDispatcher::new(
            scene_memory,
            db.clone(),
            provider,
            Arc::new(PipelineStats::new()),
            5,
            Duration::from_secs(1),
        );

        let result = dispatcher
            .analyze(&CameraId::new("cam-1"), Some(1), 0.9, &[])
            .await;
        assert!(result.is_none());
        assert!(db.analyses().is_empty());
    }

    #[tokio::test]
    async fn analyze_persists_result_with_frame_count_and_duration_in_range() {
        let kv = Arc::new(InMemoryKvStore::new());
        let scene_memory = Arc::new(SceneMemory::new(kv, 30, 600));
        let camera_id = CameraId::new("cam-1");
        scene_memory
            .add_metadata(&camera_id, 1_000_000, Some(1), 0.9, 1, Some(42), Vec::new())
            .await
            .unwrap();
        scene_memory
            .add_frame_image(&camera_id, RequestId::new(), 1_000_000, "aGVsbG8=".to_string())
            .await
            .unwrap();

        let db = Arc::new(InMemoryRelationalStore::new());
        let provider = Arc::new(FakeProvider::new(ProviderResponse {
            summary: "nothing unusual".to_string(),
            full_response: serde_json::json!({"ok": true}),
        }));
        let dispatcher = AnalysisDispatcher::new(
            scene_memory,
            db.clone(),
            provider.clone(),
            Arc::new(PipelineStats::new()),
            5,
            Duration::from_secs(1),
        );

        let analysis_id = dispatcher.analyze(&camera_id, Some(1), 0.9, &[]).await;
        assert!(analysis_id.is_some());
        assert_eq!(provider.call_count(), 1);

        let analyses = db.analyses();
        assert_eq!(analyses.len(), 1);
        let stored = &analyses[0];
        assert!((1..=5).contains(&stored.frames_analyzed));
        assert!(stored.analysis_duration_ms >= 0);
    }
}
