//! The analysis prompt template shared by both provider variants.

use scene_pipeline_types::{class_name, Detection, SceneContext};

pub fn build_analysis_prompt(
    camera_id: &str,
    motion_score: f64,
    detections: &[Detection],
    context: &SceneContext,
) -> String {
    let detection_summary = if detections.is_empty() {
        "- None".to_string()
    } else {
        detections
            .iter()
            .take(10)
            .map(|d| format!("- {}: {:.2} confidence", class_name(d.class_id), d.confidence))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "You are analyzing surveillance camera footage from {camera_id}.\n\n\
         **Current Scene Trigger:**\n\
         - Motion Score: {motion_score:.2}\n\
         - Objects Detected: {object_count}\n\
         {detection_summary}\n\n\
         **Scene Context (last {frames_available} frames):**\n\
         - Time Span: {time_span:.1} seconds\n\
         - Total Objects: {total_objects}\n\
         - Average Motion: {average_motion:.2}\n\
         - Frames with Visual Data: {frames_with_images}\n\n\
         **Your Task:**\n\
         Provide a concise executive summary (2-3 sentences) of what's happening in this scene. Focus on:\n\
         1. What activity or event is occurring\n\
         2. Any notable objects or people\n\
         3. Whether this appears significant or routine\n\
         4. Any potential security concerns\n\n\
         Be specific and actionable. If nothing significant is happening, state that clearly.\n",
        camera_id = camera_id,
        motion_score = motion_score,
        object_count = detections.len(),
        detection_summary = detection_summary,
        frames_available = context.frames_available,
        time_span = context.time_span_seconds,
        total_objects = context.total_objects_detected,
        average_motion = context.average_motion_score,
        frames_with_images = context.frames_with_images,
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prompt_falls_back_to_none_when_no_detections() {
        let prompt = build_analysis_prompt("cam-1", 0.2, &[], &SceneContext::empty());
        assert!(prompt.contains("- None"));
        assert!(prompt.contains("cam-1"));
    }

    #[test]
    fn prompt_lists_detection_class_names() {
        let detections = vec![Detection {
            class_id: 2,
            confidence: 0.81,
            bbox: None,
        }];
        let prompt = build_analysis_prompt("cam-1", 0.9, &detections, &SceneContext::empty());
        assert!(prompt.contains("car: 0.81 confidence"));
    }

    #[test]
    fn prompt_caps_detection_listing_at_ten() {
        let detections: Vec<Detection> = (0..15)
            .map(|i| Detection {
                class_id: i,
                confidence: 0.5,
                bbox: None,
            })
            .collect();
        let prompt = build_analysis_prompt("cam-1", 0.1, &detections, &SceneContext::empty());
        assert_eq!(prompt.matches("confidence").count(), 10);
    }
}
