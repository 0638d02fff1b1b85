use crate::models::exercise::{ClassificationResult, ExerciseProfile, Stage};
use serde::{Deserialize, Serialize};

/// A stage change produced by one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: Stage,
    pub to: Stage,
    /// This change completes a repetition
    pub counted: bool,
}

/// Debounced exercise phase tracker.
///
/// Starts in `Unknown`. A confident label for either stage moves the machine
/// there; low-confidence frames and labels that name no stage leave it where
/// it is. Only the profile's counted transition, taken between the two real
/// stages, is reported as a repetition. Entering a stage from `Unknown`
/// never counts.
#[derive(Debug, Clone)]
pub struct StageMachine {
    stage: Stage,
    profile: ExerciseProfile,
}

impl StageMachine {
    pub fn new(profile: &ExerciseProfile) -> Self {
        Self {
            stage: Stage::Unknown,
            profile: profile.clone(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn reset(&mut self) {
        self.stage = Stage::Unknown;
    }

    /// Apply one classification. Returns the transition taken, if any.
    pub fn step(&mut self, result: &ClassificationResult) -> Option<Transition> {
        if result.confidence < self.profile.min_confidence {
            return None;
        }

        let target = self.profile.stage_for_label(&result.label)?;

        if target == self.stage {
            return None;
        }

        let from = self.stage;
        self.stage = target;

        Some(Transition {
            from,
            to: target,
            counted: self.profile.counted_transition.matches(from, target),
        })
    }
}
