//! Integration tests for the repetition pipeline
//!
//! Frames go through the full path:
//! LandmarkFrame -> feature extractor -> classifier -> stage machine -> session state

use repcoach_lib::core::feedback::{Cue, CueFeedback, FeedbackEmitter};
use repcoach_lib::core::ml_models::PhaseModel;
use repcoach_lib::core::session_manager::{SessionConfig, SessionManager};
use repcoach_lib::models::exercise::{
    ClassifierVariant, CountedTransition, EngineError, EngineResult, ExerciseProfile,
    SessionKey, SkipReason, Stage, TransitionEvent,
};
use repcoach_lib::models::pose::{Landmark, LandmarkFrame};
use std::sync::{Arc, Mutex};
use std::thread;

/// Two-class model driven by the first landmark: x < 0.5 means "a", otherwise
/// "b"; y is the winning probability.
struct ScriptedModel {
    classes: Vec<String>,
    arity: usize,
}

impl ScriptedModel {
    fn new(arity: usize) -> Arc<dyn PhaseModel> {
        Arc::new(Self {
            classes: vec!["a".to_string(), "b".to_string()],
            arity,
        })
    }
}

impl PhaseModel for ScriptedModel {
    fn predict(&self, features: &[f32]) -> EngineResult<String> {
        let index = if features[0] < 0.5 { 0 } else { 1 };
        Ok(self.classes[index].clone())
    }

    fn predict_proba(&self, features: &[f32]) -> EngineResult<Vec<f32>> {
        let p = features[1];
        if features[0] < 0.5 {
            Ok(vec![p, 1.0 - p])
        } else {
            Ok(vec![1.0 - p, p])
        }
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn input_arity(&self) -> usize {
        self.arity
    }
}

/// Records every event and checks the session can be read while it is delivered
struct RecordingEmitter {
    manager: Mutex<Option<Arc<SessionManager>>>,
    events: Mutex<Vec<TransitionEvent>>,
    resets: Mutex<u32>,
}

impl RecordingEmitter {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            manager: Mutex::new(None),
            events: Mutex::new(Vec::new()),
            resets: Mutex::new(0),
        })
    }
}

impl FeedbackEmitter for RecordingEmitter {
    fn on_transition(&self, event: &TransitionEvent) {
        if let Some(manager) = self.manager.lock().unwrap().as_ref() {
            // The session lock is already released here
            let state = manager.status(&event.session_key).unwrap();
            assert_eq!(state.counter, event.counter);
        }
        self.events.lock().unwrap().push(event.clone());
    }

    fn on_reset(&self, _session_key: &SessionKey) {
        *self.resets.lock().unwrap() += 1;
    }
}

fn ab_profile(counted: CountedTransition) -> ExerciseProfile {
    ExerciseProfile {
        name: "scripted".to_string(),
        classifier_variant: ClassifierVariant::Learned {
            model: "scripted".to_string(),
            landmark_count: 1,
        },
        stage_a_label: "a".to_string(),
        stage_b_label: "b".to_string(),
        min_confidence: 0.7,
        counted_transition: counted,
        min_visibility: 0.5,
    }
}

fn scripted_manager(counted: CountedTransition) -> SessionManager {
    let manager = SessionManager::new(SessionConfig {
        default_exercise: "scripted".to_string(),
        reps_per_set: 3,
        ..SessionConfig::default()
    });
    manager
        .register_profile(ab_profile(counted), Some(ScriptedModel::new(4)))
        .unwrap();
    manager
}

fn labelled(label: &str, confidence: f32) -> LandmarkFrame {
    let x = if label == "a" { 0.1 } else { 0.9 };
    LandmarkFrame::new(vec![Landmark::new(0, x, confidence, 0.0, 1.0)]).unwrap()
}

/// Small deterministic generator so property loops are reproducible
struct Lcg(u64);

impl Lcg {
    fn next_f32(&mut self) -> f32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 40) as f32) / ((1u64 << 24) as f32)
    }
}

#[test]
fn test_scenario_counts_on_a_to_b() {
    let manager = scripted_manager(CountedTransition::AToB);
    let key = SessionKey::from("scenario-1");

    let counters: Vec<u32> = [("a", 0.9), ("a", 0.9), ("b", 0.8), ("a", 0.85)]
        .iter()
        .map(|(label, conf)| manager.observe(&key, &labelled(label, *conf)).counter)
        .collect();

    assert_eq!(counters, vec![0, 0, 1, 1]);
    let state = manager.status(&key).unwrap();
    assert_eq!(state.current_stage, Stage::StageA);
    assert_eq!(state.last_label, "a");
}

#[test]
fn test_scenario_entry_from_unknown() {
    let manager = scripted_manager(CountedTransition::AToB);
    let key = SessionKey::from("scenario-2");

    let first = manager.observe(&key, &labelled("b", 0.9));
    assert_eq!(first.stage, "b");
    assert_eq!(first.counter, 0);

    let second = manager.observe(&key, &labelled("a", 0.9));
    assert_eq!(second.stage, "a");
    assert_eq!(second.counter, 0);

    let third = manager.observe(&key, &labelled("b", 0.85));
    assert_eq!(third.counter, 1);
    assert!(third.counted);
}

#[test]
fn test_scenario_invisible_frame() {
    let manager = scripted_manager(CountedTransition::AToB);
    let key = SessionKey::from("scenario-3");
    manager.observe(&key, &labelled("a", 0.9));
    manager.observe(&key, &labelled("b", 0.9));
    let before = manager.status(&key).unwrap();

    let hidden = LandmarkFrame::new(vec![Landmark::new(0, 0.1, 0.9, 0.0, 0.0)]).unwrap();
    let result = manager.observe(&key, &hidden);
    assert!(!result.detected);
    assert_eq!(result.skip_reason, Some(SkipReason::NoLandmarks));

    let empty = manager.observe(&key, &LandmarkFrame::empty());
    assert!(!empty.detected);

    let after = manager.status(&key).unwrap();
    assert_eq!(after.counter, before.counter);
    assert_eq!(after.current_stage, before.current_stage);
    assert_eq!(after.last_label, before.last_label);
    assert_eq!(after.last_probabilities, before.last_probabilities);
}

#[test]
fn test_scenario_arity_mismatch_at_setup() {
    let manager = SessionManager::new(SessionConfig::default());
    let result = manager.register_profile(
        ab_profile(CountedTransition::AToB),
        Some(ScriptedModel::new(132)),
    );
    assert!(matches!(
        result,
        Err(EngineError::FeatureShape {
            expected: 4,
            actual: 132
        })
    ));
    assert!(manager.profile_names().is_empty());
}

#[test]
fn test_wrong_frame_shape_is_not_counted() {
    let manager = scripted_manager(CountedTransition::AToB);
    let key = SessionKey::from("shape");

    let wide = LandmarkFrame::new(vec![
        Landmark::new(0, 0.1, 0.9, 0.0, 1.0),
        Landmark::new(1, 0.1, 0.9, 0.0, 1.0),
    ])
    .unwrap();
    let result = manager.observe(&key, &wide);
    assert!(!result.detected);
    assert_eq!(result.skip_reason, Some(SkipReason::FeatureShape));
    assert_eq!(manager.status(&key).unwrap().current_stage, Stage::Unknown);
}

#[test]
fn test_low_confidence_never_counts() {
    let manager = scripted_manager(CountedTransition::AToB);
    let key = SessionKey::from("noise");
    let mut rng = Lcg(7);

    for _ in 0..500 {
        let label = if rng.next_f32() < 0.5 { "a" } else { "b" };
        let confidence = 0.5 + rng.next_f32() * 0.19;
        let result = manager.observe(&key, &labelled(label, confidence));
        assert_eq!(result.counter, 0);
    }
    assert_eq!(manager.status(&key).unwrap().current_stage, Stage::Unknown);
}

#[test]
fn test_low_confidence_noise_holds_stage() {
    let manager = scripted_manager(CountedTransition::AToB);
    let key = SessionKey::from("flicker");
    manager.observe(&key, &labelled("a", 0.95));

    for i in 0..50 {
        let label = if i % 2 == 0 { "b" } else { "a" };
        manager.observe(&key, &labelled(label, 0.6));
        assert_eq!(manager.status(&key).unwrap().current_stage, Stage::StageA);
    }
}

#[test]
fn test_counter_matches_counted_transitions() {
    for counted in [CountedTransition::AToB, CountedTransition::BToA] {
        let manager = scripted_manager(counted);
        let key = SessionKey::from("random");
        let mut rng = Lcg(42);
        let mut stage = Stage::Unknown;
        let mut expected = 0;

        for _ in 0..1000 {
            let label = if rng.next_f32() < 0.5 { "a" } else { "b" };
            let confidence = 0.5 + rng.next_f32() * 0.5;
            let result = manager.observe(&key, &labelled(label, confidence));

            if confidence >= 0.7 {
                let target = if label == "a" { Stage::StageA } else { Stage::StageB };
                if counted.matches(stage, target) {
                    expected += 1;
                }
                stage = target;
            }
            assert_eq!(result.counter, expected);
        }

        assert!(expected > 0);
        assert_eq!(manager.status(&key).unwrap().current_stage, stage);
    }
}

#[test]
fn test_reset_is_idempotent() {
    let manager = scripted_manager(CountedTransition::AToB);
    let key = SessionKey::from("reset");
    manager.observe(&key, &labelled("a", 0.9));
    manager.observe(&key, &labelled("b", 0.9));

    for _ in 0..2 {
        assert_eq!(manager.reset(&key).unwrap(), 0);
        let state = manager.status(&key).unwrap();
        assert_eq!(state.counter, 0);
        assert_eq!(state.current_stage, Stage::Unknown);
    }

    // Entering b straight after a reset is not a repetition
    assert_eq!(manager.observe(&key, &labelled("b", 0.9)).counter, 0);
}

#[test]
fn test_sessions_are_independent() {
    let manager = Arc::new(scripted_manager(CountedTransition::AToB));

    thread::scope(|scope| {
        for worker in 0..8u32 {
            let manager = manager.clone();
            scope.spawn(move || {
                let key = SessionKey::new(format!("athlete-{}", worker));
                for _ in 0..=worker {
                    manager.observe(&key, &labelled("a", 0.9));
                    manager.observe(&key, &labelled("b", 0.9));
                    // Readers never block the writer for long
                    manager.status(&key).unwrap();
                }
            });
        }
    });

    assert_eq!(manager.session_count(), 8);
    for worker in 0..8u32 {
        let key = SessionKey::new(format!("athlete-{}", worker));
        let state = manager.status(&key).unwrap();
        assert_eq!(state.counter, worker + 1);
        assert_eq!(state.sets_completed, (worker + 1) / 3);
    }
}

#[test]
fn test_emitters_see_committed_state() {
    let manager = Arc::new(scripted_manager(CountedTransition::AToB));
    let emitter = RecordingEmitter::new();
    *emitter.manager.lock().unwrap() = Some(manager.clone());
    manager.add_emitter(emitter.clone());

    let key = SessionKey::from("feedback");
    for (label, conf) in [("a", 0.9), ("b", 0.9), ("b", 0.9), ("a", 0.9), ("b", 0.4)] {
        manager.observe(&key, &labelled(label, conf));
    }
    manager.reset(&key).unwrap();

    let events = emitter.events.lock().unwrap();
    let summary: Vec<(Stage, Stage, bool)> =
        events.iter().map(|e| (e.from, e.to, e.counted)).collect();
    assert_eq!(
        summary,
        vec![
            (Stage::Unknown, Stage::StageA, false),
            (Stage::StageA, Stage::StageB, true),
            (Stage::StageB, Stage::StageA, false),
        ]
    );
    assert_eq!(events[1].to_label, "b");
    assert_eq!(*emitter.resets.lock().unwrap(), 1);

    // Break the reference cycle between emitter and manager
    emitter.manager.lock().unwrap().take();
}

#[test]
fn test_set_cues_follow_engine_sets() {
    // Three reps per set on the engine side
    let manager = scripted_manager(CountedTransition::AToB);
    let feedback = Arc::new(CueFeedback::new());
    manager.add_emitter(feedback.clone());

    let key = SessionKey::from("sets");
    for _ in 0..4 {
        manager.observe(&key, &labelled("a", 0.9));
        manager.observe(&key, &labelled("b", 0.9));
    }

    let sets: Vec<Cue> = feedback
        .drain()
        .into_iter()
        .map(|(_, cue)| cue)
        .filter(|cue| matches!(cue, Cue::SetCompleted(_)))
        .collect();
    assert_eq!(sets, vec![Cue::SetCompleted(1)]);
    assert_eq!(manager.status(&key).unwrap().sets_completed, 1);
}
