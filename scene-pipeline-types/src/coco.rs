//! The fixed 80-class COCO vocabulary used by the edge detector.

const CLASSES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Car, bus, truck — the vehicle classes the trigger evaluator watches for.
pub const VEHICLE_CLASSES: [u32; 3] = [2, 5, 7];

/// Human-readable name for a COCO class id. Unknown or out-of-range ids
/// degrade gracefully to a synthetic `class_{id}` label rather than
/// erroring.
pub fn class_name(class_id: u32) -> String {
    CLASSES
        .get(class_id as usize)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("class_{class_id}"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_ids_resolve() {
        assert_eq!(class_name(0), "person");
        assert_eq!(class_name(7), "truck");
        assert_eq!(class_name(79), "toothbrush");
    }

    #[test]
    fn unknown_ids_fall_back() {
        assert_eq!(class_name(80), "class_80");
        assert_eq!(class_name(9001), "class_9001");
    }
}
