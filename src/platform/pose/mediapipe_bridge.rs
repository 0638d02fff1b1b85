// MediaPipe integration bridge
// Landmark detection runs outside the engine; this is where its output comes in

use crate::models::exercise::{EngineError, EngineResult};
use crate::models::pose::{Landmark, LandmarkFrame, POSE_LANDMARK_COUNT};
use serde::{Deserialize, Serialize};

/// Detector response: landmark list plus whether a body was found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseDetection {
    #[serde(default = "detected_by_default")]
    pub landmarks_detected: bool,
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
}

fn detected_by_default() -> bool {
    true
}

impl PoseDetection {
    pub fn into_frame(self) -> EngineResult<LandmarkFrame> {
        if !self.landmarks_detected {
            return Ok(LandmarkFrame::empty());
        }
        LandmarkFrame::new(self.landmarks)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LandmarkPayload {
    List(Vec<Landmark>),
    Detection(PoseDetection),
}

/// Decode MediaPipe-style landmark JSON.
///
/// Accepts either a bare `[{index,x,y,z,visibility}, ...]` list or a detector
/// response `{"landmarks_detected": bool, "landmarks": [...]}`. A response
/// with `landmarks_detected=false` yields an empty frame; a missing flag
/// counts as detected.
pub fn parse_landmarks_json(json: &str) -> EngineResult<LandmarkFrame> {
    let payload: LandmarkPayload = serde_json::from_str(json)
        .map_err(|e| EngineError::InvalidFrame(format!("Cannot decode landmarks: {}", e)))?;

    match payload {
        LandmarkPayload::List(landmarks) => LandmarkFrame::new(landmarks),
        LandmarkPayload::Detection(detection) => detection.into_frame(),
    }
}

/// Pose estimation backend (MediaPipe or any detector with the same topology)
pub trait PoseEstimator: Send + Sync {
    /// Run inference on an RGB frame. `None` means no body was found.
    fn process_frame(
        &self,
        frame_data: &[u8],
        width: u32,
        height: u32,
    ) -> EngineResult<Option<LandmarkFrame>>;

    /// Number of landmarks the backend reports per body
    fn landmark_count(&self) -> usize {
        POSE_LANDMARK_COUNT
    }

    /// Check if models are loaded
    fn is_initialized(&self) -> bool;

    /// Get model info
    fn get_model_info(&self) -> String;
}

// ==============================================================================
// Null Implementation (no in-process inference)
// ==============================================================================

/// Backend used when landmarks are supplied by an external detector
pub struct NullPoseEstimator;

impl PoseEstimator for NullPoseEstimator {
    fn process_frame(
        &self,
        frame_data: &[u8],
        width: u32,
        height: u32,
    ) -> EngineResult<Option<LandmarkFrame>> {
        let expected = width as usize * height as usize * 3;
        if frame_data.len() != expected {
            return Err(EngineError::InvalidFrame(format!(
                "RGB frame {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                frame_data.len()
            )));
        }

        tracing::debug!("No pose backend; {}x{} frame yields no landmarks", width, height);
        Ok(None)
    }

    fn is_initialized(&self) -> bool {
        false
    }

    fn get_model_info(&self) -> String {
        "No in-process pose backend (submit landmark JSON instead)".to_string()
    }
}
