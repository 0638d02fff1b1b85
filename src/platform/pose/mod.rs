// Pose estimation platform integration

pub mod mediapipe_bridge;

pub use mediapipe_bridge::{parse_landmarks_json, NullPoseEstimator, PoseDetection, PoseEstimator};
