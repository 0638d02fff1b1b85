use crate::core::feature_extractor::FEATURE_ANGLE;
use crate::core::ml_models::PhaseModel;
use crate::models::exercise::{
    AngleThresholds, ClassificationResult, ClassifierVariant, EngineError, EngineResult,
    ExerciseProfile,
};
use crate::models::pose::FeatureVector;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Turns a feature vector into a phase label with confidence.
///
/// One instance belongs to one session, so implementations may keep state
/// between frames (the rule-based variant remembers its last label).
pub trait PhaseClassifier: Send {
    fn classify(&mut self, features: &FeatureVector) -> EngineResult<ClassificationResult>;

    /// Feature count the classifier requires, if fixed
    fn input_arity(&self) -> Option<usize>;

    fn variant(&self) -> &'static str;

    /// Forget any per-session memory
    fn reset(&mut self) {}
}

// ==============================================================================
// Learned variant
// ==============================================================================

pub struct LearnedClassifier {
    model: Arc<dyn PhaseModel>,
}

impl LearnedClassifier {
    pub fn new(model: Arc<dyn PhaseModel>) -> Self {
        Self { model }
    }
}

impl PhaseClassifier for LearnedClassifier {
    fn classify(&mut self, features: &FeatureVector) -> EngineResult<ClassificationResult> {
        let arity = self.model.input_arity();
        if features.len() != arity {
            return Err(EngineError::FeatureShape {
                expected: arity,
                actual: features.len(),
            });
        }

        let probabilities = self.model.predict_proba(&features.values)?;
        let label = self.model.predict(&features.values)?;

        let probabilities: BTreeMap<String, f32> = self
            .model
            .classes()
            .iter()
            .cloned()
            .zip(probabilities)
            .collect();

        Ok(ClassificationResult::from_probabilities(label, probabilities))
    }

    fn input_arity(&self) -> Option<usize> {
        Some(self.model.input_arity())
    }

    fn variant(&self) -> &'static str {
        "learned"
    }
}

// ==============================================================================
// Rule-based variant
// ==============================================================================

/// Angle thresholds with a hold band between them.
///
/// Probabilities ramp linearly across the band: 1.0 for the extended label at
/// or above `extended_above_deg`, 1.0 for the flexed label at or below
/// `flexed_below_deg`. Inside the band the previous label is kept and its
/// confidence is its share of the ramp.
pub struct RuleBasedClassifier {
    thresholds: AngleThresholds,
    held_label: Option<String>,
}

impl RuleBasedClassifier {
    pub fn new(thresholds: AngleThresholds) -> Self {
        Self {
            thresholds,
            held_label: None,
        }
    }

    fn extended_probability(&self, angle: f32) -> f32 {
        let t = &self.thresholds;
        ((angle - t.flexed_below_deg) / (t.extended_above_deg - t.flexed_below_deg)).clamp(0.0, 1.0)
    }
}

impl PhaseClassifier for RuleBasedClassifier {
    fn classify(&mut self, features: &FeatureVector) -> EngineResult<ClassificationResult> {
        let angle = features.get(FEATURE_ANGLE).ok_or(EngineError::FeatureShape {
            expected: 1,
            actual: 0,
        })?;

        let t = &self.thresholds;
        if angle > t.extended_above_deg {
            self.held_label = Some(t.extended_label.clone());
        } else if angle < t.flexed_below_deg {
            self.held_label = Some(t.flexed_label.clone());
        }

        let p_extended = self.extended_probability(angle);
        let mut probabilities = BTreeMap::new();
        probabilities.insert(t.extended_label.clone(), p_extended);
        probabilities.insert(t.flexed_label.clone(), 1.0 - p_extended);

        // Inside the band before any threshold was crossed there is nothing to hold
        let label = self.held_label.clone().unwrap_or_default();
        let confidence = probabilities.get(&label).copied().unwrap_or(0.0);

        Ok(ClassificationResult {
            label,
            probabilities,
            confidence,
        })
    }

    fn input_arity(&self) -> Option<usize> {
        None
    }

    fn variant(&self) -> &'static str {
        "rule_based"
    }

    fn reset(&mut self) {
        self.held_label = None;
    }
}

// ==============================================================================
// Construction
// ==============================================================================

/// Build the classifier a profile asks for.
///
/// Runs at setup time so configuration mistakes surface before any frame:
/// a learned model whose input arity differs from `landmark_count * 4`
/// fails with `FeatureShape`. A learned profile without a model fails with
/// `ClassifierUnavailable`, which callers may tolerate.
pub fn build_classifier(
    profile: &ExerciseProfile,
    model: Option<Arc<dyn PhaseModel>>,
) -> EngineResult<Box<dyn PhaseClassifier>> {
    profile.validate()?;

    match &profile.classifier_variant {
        ClassifierVariant::Learned { .. } => {
            let model = model.ok_or(EngineError::ClassifierUnavailable)?;

            let expected = profile.expected_input_arity().unwrap_or_default();
            if model.input_arity() != expected {
                return Err(EngineError::FeatureShape {
                    expected,
                    actual: model.input_arity(),
                });
            }

            for label in [&profile.stage_a_label, &profile.stage_b_label] {
                if !model.classes().contains(label) {
                    return Err(EngineError::InvalidProfile(format!(
                        "{}: model has no class '{}' (classes: {:?})",
                        profile.name,
                        label,
                        model.classes()
                    )));
                }
            }

            Ok(Box::new(LearnedClassifier::new(model)))
        }
        ClassifierVariant::RuleBased { thresholds } => {
            Ok(Box::new(RuleBasedClassifier::new(thresholds.clone())))
        }
    }
}
