// Data models for exercise profiles, classification results, and session state

use crate::models::pose::{BodyLandmark, BodySide, POSE_LANDMARK_COUNT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ==============================================================================
// Stages and Transitions
// ==============================================================================

/// Discrete exercise phase tracked by the stage machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Unknown,
    StageA,
    StageB,
}

impl Stage {
    pub fn to_string(&self) -> &'static str {
        match self {
            Stage::Unknown => "unknown",
            Stage::StageA => "stage_a",
            Stage::StageB => "stage_b",
        }
    }

    /// Human-facing name of the stage under a given profile ("up", "down", ...)
    pub fn label<'a>(&self, profile: &'a ExerciseProfile) -> &'a str {
        match self {
            Stage::Unknown => "unknown",
            Stage::StageA => &profile.stage_a_label,
            Stage::StageB => &profile.stage_b_label,
        }
    }
}

impl Default for Stage {
    fn default() -> Self {
        Stage::Unknown
    }
}

/// Which stage change completes one repetition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountedTransition {
    AToB,
    BToA,
}

impl CountedTransition {
    pub fn matches(&self, from: Stage, to: Stage) -> bool {
        match self {
            CountedTransition::AToB => from == Stage::StageA && to == Stage::StageB,
            CountedTransition::BToA => from == Stage::StageB && to == Stage::StageA,
        }
    }

    pub fn to_string(&self) -> &'static str {
        match self {
            CountedTransition::AToB => "a_to_b",
            CountedTransition::BToA => "b_to_a",
        }
    }
}

// ==============================================================================
// Exercise Profile
// ==============================================================================

/// Three-joint angle measured by the rule-based classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointAngle {
    Elbow, // shoulder - elbow - wrist
    Knee,  // hip - knee - ankle
    Hip,   // shoulder - hip - knee
}

impl JointAngle {
    /// (a, vertex, c) landmarks for the given side
    pub fn landmarks(&self, side: BodySide) -> [BodyLandmark; 3] {
        let left = match self {
            JointAngle::Elbow => [
                BodyLandmark::LeftShoulder,
                BodyLandmark::LeftElbow,
                BodyLandmark::LeftWrist,
            ],
            JointAngle::Knee => [
                BodyLandmark::LeftHip,
                BodyLandmark::LeftKnee,
                BodyLandmark::LeftAnkle,
            ],
            JointAngle::Hip => [
                BodyLandmark::LeftShoulder,
                BodyLandmark::LeftHip,
                BodyLandmark::LeftKnee,
            ],
        };

        match side {
            BodySide::Left => left,
            BodySide::Right => left.map(|lm| lm.mirrored()),
        }
    }
}

/// Hysteresis band for angle-based phase detection.
///
/// Above `extended_above_deg` the limb is extended, below `flexed_below_deg`
/// it is flexed. Angles inside the band keep the previous label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngleThresholds {
    pub joint: JointAngle,
    pub extended_label: String,
    pub flexed_label: String,
    pub extended_above_deg: f32,
    pub flexed_below_deg: f32,
    #[serde(default = "default_side")]
    pub preferred_side: BodySide,
}

fn default_side() -> BodySide {
    BodySide::Left
}

/// Classifier backing a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierVariant {
    /// Pretrained probabilistic model, looked up by name in the model cache
    Learned { model: String, landmark_count: usize },
    RuleBased { thresholds: AngleThresholds },
}

impl ClassifierVariant {
    pub fn to_string(&self) -> &'static str {
        match self {
            ClassifierVariant::Learned { .. } => "learned",
            ClassifierVariant::RuleBased { .. } => "rule_based",
        }
    }
}

/// Per-exercise configuration of the repetition engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseProfile {
    pub name: String,
    pub classifier_variant: ClassifierVariant,
    pub stage_a_label: String,
    pub stage_b_label: String,
    /// Classifier confidence needed before the stage machine moves (0.0-1.0)
    pub min_confidence: f32,
    pub counted_transition: CountedTransition,
    /// Landmark visibility below this is treated as undetected (0.0-1.0)
    #[serde(default = "default_min_visibility")]
    pub min_visibility: f32,
}

fn default_min_visibility() -> f32 {
    0.5
}

impl ExerciseProfile {
    /// Deadlift: learned classifier over all 33 landmarks, counts on "down" -> "up"
    pub fn deadlift() -> Self {
        Self {
            name: "deadlift".to_string(),
            classifier_variant: ClassifierVariant::Learned {
                model: "deadlift".to_string(),
                landmark_count: POSE_LANDMARK_COUNT,
            },
            stage_a_label: "down".to_string(),
            stage_b_label: "up".to_string(),
            min_confidence: 0.7,
            counted_transition: CountedTransition::AToB,
            min_visibility: 0.5,
        }
    }

    /// Push-up: elbow angle thresholds, counts on "up" -> "down"
    pub fn push_up() -> Self {
        Self {
            name: "push_up".to_string(),
            classifier_variant: ClassifierVariant::RuleBased {
                thresholds: AngleThresholds {
                    joint: JointAngle::Elbow,
                    extended_label: "up".to_string(),
                    flexed_label: "down".to_string(),
                    extended_above_deg: 155.0,
                    flexed_below_deg: 100.0,
                    preferred_side: BodySide::Left,
                },
            },
            stage_a_label: "up".to_string(),
            stage_b_label: "down".to_string(),
            min_confidence: 0.9,
            counted_transition: CountedTransition::AToB,
            min_visibility: 0.5,
        }
    }

    /// Input arity a learned classifier must declare for this profile
    pub fn expected_input_arity(&self) -> Option<usize> {
        match &self.classifier_variant {
            ClassifierVariant::Learned { landmark_count, .. } => Some(landmark_count * 4),
            ClassifierVariant::RuleBased { .. } => None,
        }
    }

    /// Map a classifier label onto a stage
    pub fn stage_for_label(&self, label: &str) -> Option<Stage> {
        if label == self.stage_a_label {
            Some(Stage::StageA)
        } else if label == self.stage_b_label {
            Some(Stage::StageB)
        } else {
            None
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::InvalidProfile(
                "Profile name cannot be empty".to_string(),
            ));
        }

        if self.stage_a_label.is_empty() || self.stage_b_label.is_empty() {
            return Err(EngineError::InvalidProfile(format!(
                "{}: stage labels cannot be empty",
                self.name
            )));
        }

        if self.stage_a_label == self.stage_b_label {
            return Err(EngineError::InvalidProfile(format!(
                "{}: stage labels must differ, both are '{}'",
                self.name, self.stage_a_label
            )));
        }

        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(EngineError::InvalidProfile(format!(
                "{}: min_confidence {} must be between 0.0 and 1.0",
                self.name, self.min_confidence
            )));
        }

        if !(0.0..=1.0).contains(&self.min_visibility) {
            return Err(EngineError::InvalidProfile(format!(
                "{}: min_visibility {} must be between 0.0 and 1.0",
                self.name, self.min_visibility
            )));
        }

        match &self.classifier_variant {
            ClassifierVariant::Learned {
                model,
                landmark_count,
            } => {
                if model.trim().is_empty() {
                    return Err(EngineError::InvalidProfile(format!(
                        "{}: learned profile needs a model name",
                        self.name
                    )));
                }
                if *landmark_count == 0 {
                    return Err(EngineError::InvalidProfile(format!(
                        "{}: landmark_count must be positive",
                        self.name
                    )));
                }
            }
            ClassifierVariant::RuleBased { thresholds } => {
                let t = thresholds;
                let in_range = |deg: f32| deg > 0.0 && deg < 180.0;
                if !in_range(t.extended_above_deg) || !in_range(t.flexed_below_deg) {
                    return Err(EngineError::InvalidProfile(format!(
                        "{}: angle thresholds must lie strictly between 0 and 180 degrees",
                        self.name
                    )));
                }
                // A single cut point would toggle on every jitter across it
                if t.flexed_below_deg >= t.extended_above_deg {
                    return Err(EngineError::InvalidProfile(format!(
                        "{}: flexed_below_deg ({}) must be below extended_above_deg ({})",
                        self.name, t.flexed_below_deg, t.extended_above_deg
                    )));
                }

                let mut labels = [t.extended_label.as_str(), t.flexed_label.as_str()];
                let mut stages = [self.stage_a_label.as_str(), self.stage_b_label.as_str()];
                labels.sort_unstable();
                stages.sort_unstable();
                if labels != stages {
                    return Err(EngineError::InvalidProfile(format!(
                        "{}: threshold labels {:?} must match stage labels {:?}",
                        self.name, labels, stages
                    )));
                }
            }
        }

        Ok(())
    }
}

// ==============================================================================
// Classification
// ==============================================================================

/// Output of a phase classifier for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    pub probabilities: BTreeMap<String, f32>,
    pub confidence: f32,
}

impl ClassificationResult {
    /// Confidence is the largest class probability
    pub fn from_probabilities(label: impl Into<String>, probabilities: BTreeMap<String, f32>) -> Self {
        let confidence = probabilities.values().copied().fold(0.0_f32, f32::max);
        Self {
            label: label.into(),
            probabilities,
            confidence,
        }
    }
}

/// Why a frame did not reach the stage machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoLandmarks,
    FeatureShape,
    ClassifierUnavailable,
    /// The session's exercise has no registered profile
    UnknownProfile,
}

/// Result returned for every observed frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    pub stage: String,
    pub label: String,
    pub confidence: f32,
    pub counter: u32,
    pub detected: bool,
    /// A repetition was completed on this frame
    pub counted: bool,
    pub sets_completed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
}

// ==============================================================================
// Sessions
// ==============================================================================

/// Opaque identifier for one tracked exercise attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for SessionKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counters and last classification of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub exercise: String,
    pub counter: u32,
    pub current_stage: Stage,
    pub last_label: String,
    pub last_confidence: f32,
    pub last_probabilities: BTreeMap<String, f32>,
    pub sets_completed: u32,
    pub frames_observed: u64,
    pub frames_skipped: u64,
    pub started_at: i64,    // unix millis
    pub last_activity: i64, // unix millis
}

impl SessionState {
    pub fn new(exercise: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            exercise: exercise.into(),
            counter: 0,
            current_stage: Stage::Unknown,
            last_label: String::new(),
            last_confidence: 0.0,
            last_probabilities: BTreeMap::new(),
            sets_completed: 0,
            frames_observed: 0,
            frames_skipped: 0,
            started_at: now,
            last_activity: now,
        }
    }
}

/// Stage change reported to feedback emitters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub session_key: SessionKey,
    pub from: Stage,
    pub to: Stage,
    pub to_label: String,
    pub counted: bool,
    pub counter: u32,
    pub sets_completed: u32,
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Required landmark not detected: {joint}")]
    LandmarksMissing { joint: String },

    #[error("Feature shape mismatch: classifier expects {expected} inputs, got {actual}")]
    FeatureShape { expected: usize, actual: usize },

    #[error("No classifier model configured")]
    ClassifierUnavailable,

    #[error("Invalid exercise profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid landmark frame: {0}")]
    InvalidFrame(String),

    #[error("Model loading failed: {0}")]
    ModelLoadFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown exercise profile: {0}")]
    UnknownProfile(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::ModelLoadFailed(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
