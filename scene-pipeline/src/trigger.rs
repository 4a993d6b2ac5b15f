//! Trigger Evaluator (C4). Mostly a pure decision function; step 5
//! (scene-change detection) is the only step with a side effect, which must
//! be observable to subsequent calls even when it doesn't fire a request.

use crate::kv_store::{CameraState, KvStore};
use scene_pipeline_config::Config;
use scene_pipeline_types::{coco::VEHICLE_CLASSES, CameraId, Detection};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerOutcome {
    pub fire: bool,
    pub reason: String,
}

impl TriggerOutcome {
    fn no(reason: &str) -> Self {
        Self {
            fire: false,
            reason: reason.to_string(),
        }
    }

    fn yes(reason: String) -> Self {
        Self { fire: true, reason }
    }
}

pub struct TriggerEvaluator {
    kv: Arc<dyn KvStore>,
    config: Arc<Config>,
}

impl TriggerEvaluator {
    pub fn new(kv: Arc<dyn KvStore>, config: Arc<Config>) -> Self {
        Self { kv, config }
    }

    /// Evaluated in a fixed order; first match wins.
    pub async fn evaluate(
        &self,
        camera_id: &CameraId,
        motion_score: Option<f64>,
        detections: &[Detection],
        scene_hash: Option<i64>,
        cooldown_active: bool,
    ) -> TriggerOutcome {
        // 1. cooldown
        if cooldown_active {
            return TriggerOutcome::no("cooldown");
        }

        // 2. feature disabled
        if !self.config.frame_request_enabled {
            return TriggerOutcome::no("disabled");
        }

        // 3. high motion
        let motion_score = motion_score.unwrap_or(0.0);
        if motion_score > self.config.motion_threshold {
            return TriggerOutcome::yes(format!("high_motion_{motion_score:.2}"));
        }

        // 4. vehicle detection, in order
        for det in detections {
            if VEHICLE_CLASSES.contains(&det.class_id)
                && det.confidence > self.config.vehicle_confidence_threshold
            {
                return TriggerOutcome::yes(format!("vehicle_detected_{}", det.class_id));
            }
        }

        // 5. scene change (the only step with a side effect)
        if self.config.scene_change_enabled {
            if let Some(scene_hash) = scene_hash {
                let state = self.kv.get_camera_state(camera_id).await.unwrap_or(None);
                match state.and_then(|s| s.last_scene_hash) {
                    Some(last) if last != scene_hash => {
                        let _ = self
                            .kv
                            .set_camera_state(
                                camera_id,
                                CameraState {
                                    last_scene_hash: Some(scene_hash),
                                },
                                self.config.camera_state_ttl_secs,
                            )
                            .await;
                        return TriggerOutcome::yes("scene_change".to_string());
                    }
                    Some(_) => {
                        // unchanged, fall through
                    }
                    None => {
                        let _ = self
                            .kv
                            .set_camera_state(
                                camera_id,
                                CameraState {
                                    last_scene_hash: Some(scene_hash),
                                },
                                self.config.camera_state_ttl_secs,
                            )
                            .await;
                    }
                }
            }
        }

        // 6. nothing matched
        TriggerOutcome::no("no_trigger")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kv_store::InMemoryKvStore;

    fn evaluator() -> TriggerEvaluator {
        TriggerEvaluator::new(Arc::new(InMemoryKvStore::new()), Arc::new(Config::default()))
    }

    #[tokio::test]
    async fn high_motion_fires_trigger() {
        let evaluator = evaluator();
        let camera = CameraId::new("cam-1");
        let outcome = evaluator
            .evaluate(&camera, Some(0.9), &[], None, false)
            .await;
        assert!(outcome.fire);
        assert!(outcome.reason.starts_with("high_motion_"));
    }

    #[tokio::test]
    async fn vehicle_detection_fires_trigger() {
        let evaluator = evaluator();
        let camera = CameraId::new("cam-1");
        let detections = vec![Detection {
            class_id: 7,
            confidence: 0.8,
            bbox: None,
        }];
        let outcome = evaluator
            .evaluate(&camera, Some(0.1), &detections, None, false)
            .await;
        assert!(outcome.fire);
        assert_eq!(outcome.reason, "vehicle_detected_7");
    }

    #[tokio::test]
    async fn scene_change_fires_only_on_second_distinct_hash() {
        let evaluator = evaluator();
        let camera = CameraId::new("cam-1");

        let first = evaluator.evaluate(&camera, Some(0.0), &[], Some(1), false).await;
        assert!(!first.fire);

        let second = evaluator.evaluate(&camera, Some(0.0), &[], Some(2), false).await;
        assert!(second.fire);
        assert_eq!(second.reason, "scene_change");
    }

    #[tokio::test]
    async fn cooldown_dominates_regardless_of_other_inputs() {
        let evaluator = evaluator();
        let camera = CameraId::new("cam-1");
        let detections = vec![Detection {
            class_id: 7,
            confidence: 0.99,
            bbox: None,
        }];
        let outcome = evaluator
            .evaluate(&camera, Some(0.99), &detections, Some(123), true)
            .await;
        assert!(!outcome.fire);
        assert_eq!(outcome.reason, "cooldown");
    }

    #[tokio::test]
    async fn deterministic_for_non_mutating_inputs() {
        let evaluator = evaluator();
        let camera = CameraId::new("cam-1");
        let a = evaluator.evaluate(&camera, Some(0.9), &[], None, false).await;
        let b = evaluator.evaluate(&camera, Some(0.9), &[], None, false).await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn no_trigger_when_nothing_matches() {
        let evaluator = evaluator();
        let camera = CameraId::new("cam-1");
        let outcome = evaluator.evaluate(&camera, Some(0.1), &[], None, false).await;
        assert!(!outcome.fire);
        assert_eq!(outcome.reason, "no_trigger");
    }
}
