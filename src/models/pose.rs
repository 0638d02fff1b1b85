// Data models for body-pose landmarks and the feature vectors derived from them

use crate::models::exercise::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Number of body landmarks produced by MediaPipe Pose
pub const POSE_LANDMARK_COUNT: usize = 33;

// ==============================================================================
// Landmark
// ==============================================================================

/// A single detected joint, normalized to image width/height
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub index: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(default)]
    pub visibility: f32, // [0, 1]
}

impl Landmark {
    pub fn new(index: u32, x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self {
            index,
            x,
            y,
            z,
            visibility,
        }
    }

    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility >= threshold
    }

    pub fn xy(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}

// ==============================================================================
// Landmark Frame
// ==============================================================================

/// Snapshot of every landmark detected in one processed image.
///
/// Landmarks are kept sorted by index so that flattening a frame always
/// yields the same positional layout. An empty frame means the pose model
/// found nobody in the image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Landmark>", into = "Vec<Landmark>")]
pub struct LandmarkFrame {
    landmarks: Vec<Landmark>,
}

impl LandmarkFrame {
    pub fn new(mut landmarks: Vec<Landmark>) -> EngineResult<Self> {
        let mut seen = HashSet::with_capacity(landmarks.len());
        for lm in &landmarks {
            if !seen.insert(lm.index) {
                return Err(EngineError::InvalidFrame(format!(
                    "duplicate landmark index {}",
                    lm.index
                )));
            }
        }

        landmarks.sort_by_key(|lm| lm.index);
        Ok(Self { landmarks })
    }

    /// Frame with no detection
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    pub fn get(&self, joint: BodyLandmark) -> Option<&Landmark> {
        let index = joint.index();
        self.landmarks
            .binary_search_by_key(&index, |lm| lm.index)
            .ok()
            .map(|pos| &self.landmarks[pos])
    }

    /// True when at least one landmark clears the visibility threshold
    pub fn any_visible(&self, threshold: f32) -> bool {
        self.landmarks.iter().any(|lm| lm.is_visible(threshold))
    }
}

impl TryFrom<Vec<Landmark>> for LandmarkFrame {
    type Error = EngineError;

    fn try_from(landmarks: Vec<Landmark>) -> Result<Self, Self::Error> {
        Self::new(landmarks)
    }
}

impl From<LandmarkFrame> for Vec<Landmark> {
    fn from(frame: LandmarkFrame) -> Self {
        frame.landmarks
    }
}

// ==============================================================================
// Body Landmark ids (33 keypoints)
// ==============================================================================

/// Which side of the body a limb measurement was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodySide {
    Left,
    Right,
}

impl BodySide {
    pub fn opposite(&self) -> Self {
        match self {
            BodySide::Left => BodySide::Right,
            BodySide::Right => BodySide::Left,
        }
    }

    pub fn to_string(&self) -> &'static str {
        match self {
            BodySide::Left => "left",
            BodySide::Right => "right",
        }
    }
}

/// MediaPipe Pose Landmark indices (33 total)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BodyLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl BodyLandmark {
    pub fn index(&self) -> u32 {
        *self as u32
    }

    /// The same joint on the other side of the body. Midline points map to themselves.
    pub fn mirrored(&self) -> Self {
        use BodyLandmark::*;
        match self {
            Nose => Nose,
            LeftEyeInner => RightEyeInner,
            LeftEye => RightEye,
            LeftEyeOuter => RightEyeOuter,
            RightEyeInner => LeftEyeInner,
            RightEye => LeftEye,
            RightEyeOuter => LeftEyeOuter,
            LeftEar => RightEar,
            RightEar => LeftEar,
            MouthLeft => MouthRight,
            MouthRight => MouthLeft,
            LeftShoulder => RightShoulder,
            RightShoulder => LeftShoulder,
            LeftElbow => RightElbow,
            RightElbow => LeftElbow,
            LeftWrist => RightWrist,
            RightWrist => LeftWrist,
            LeftPinky => RightPinky,
            RightPinky => LeftPinky,
            LeftIndex => RightIndex,
            RightIndex => LeftIndex,
            LeftThumb => RightThumb,
            RightThumb => LeftThumb,
            LeftHip => RightHip,
            RightHip => LeftHip,
            LeftKnee => RightKnee,
            RightKnee => LeftKnee,
            LeftAnkle => RightAnkle,
            RightAnkle => LeftAnkle,
            LeftHeel => RightHeel,
            RightHeel => LeftHeel,
            LeftFootIndex => RightFootIndex,
            RightFootIndex => LeftFootIndex,
        }
    }

    pub fn to_string(&self) -> &'static str {
        use BodyLandmark::*;
        match self {
            Nose => "nose",
            LeftEyeInner => "left_eye_inner",
            LeftEye => "left_eye",
            LeftEyeOuter => "left_eye_outer",
            RightEyeInner => "right_eye_inner",
            RightEye => "right_eye",
            RightEyeOuter => "right_eye_outer",
            LeftEar => "left_ear",
            RightEar => "right_ear",
            MouthLeft => "mouth_left",
            MouthRight => "mouth_right",
            LeftShoulder => "left_shoulder",
            RightShoulder => "right_shoulder",
            LeftElbow => "left_elbow",
            RightElbow => "right_elbow",
            LeftWrist => "left_wrist",
            RightWrist => "right_wrist",
            LeftPinky => "left_pinky",
            RightPinky => "right_pinky",
            LeftIndex => "left_index",
            RightIndex => "right_index",
            LeftThumb => "left_thumb",
            RightThumb => "right_thumb",
            LeftHip => "left_hip",
            RightHip => "right_hip",
            LeftKnee => "left_knee",
            RightKnee => "right_knee",
            LeftAnkle => "left_ankle",
            RightAnkle => "right_ankle",
            LeftHeel => "left_heel",
            RightHeel => "right_heel",
            LeftFootIndex => "left_foot_index",
            RightFootIndex => "right_foot_index",
        }
    }
}

// ==============================================================================
// Feature Vector
// ==============================================================================

/// Ordered numeric features handed to a phase classifier.
///
/// `names[i]` labels `values[i]`. Learned classifiers consume the values
/// positionally; rule-based classifiers look them up by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub names: Vec<String>,
    pub values: Vec<f32>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            names: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: f32) {
        self.names.push(name.into());
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::new()
    }
}
