use crate::core::feature_extractor;
use crate::core::feedback::FeedbackEmitter;
use crate::core::ml_models::PhaseModel;
use crate::core::phase_classifier::{build_classifier, PhaseClassifier};
use crate::core::stage_machine::StageMachine;
use crate::models::exercise::{
    EngineError, EngineResult, ExerciseProfile, FrameResult, SessionKey, SessionState,
    SkipReason, TransitionEvent,
};
use crate::models::pose::LandmarkFrame;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

// ==============================================================================
// Configuration
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub default_exercise: String,      // Default: "push_up"
    pub reps_per_set: u32,             // Default: 10
    pub idle_timeout_minutes: u32,     // Default: 30
    pub monitor_interval_secs: u64,    // Default: 30
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_exercise: "push_up".to_string(),
            reps_per_set: 10,
            idle_timeout_minutes: 30,
            monitor_interval_secs: 30,
        }
    }
}

// ==============================================================================
// Session Entries
// ==============================================================================

struct ProfileEntry {
    profile: Arc<ExerciseProfile>,
    model: Option<Arc<dyn PhaseModel>>,
}

/// Everything one session owns. Guarded by its own mutex.
struct SessionEntry {
    profile: Arc<ExerciseProfile>,
    classifier: Option<Box<dyn PhaseClassifier>>,
    machine: StageMachine,
    state: SessionState,
}

impl SessionEntry {
    fn new(profile: Arc<ExerciseProfile>, classifier: Option<Box<dyn PhaseClassifier>>) -> Self {
        Self {
            machine: StageMachine::new(&profile),
            state: SessionState::new(profile.name.clone()),
            profile,
            classifier,
        }
    }

    fn reset(&mut self) {
        self.machine.reset();
        if let Some(classifier) = self.classifier.as_mut() {
            classifier.reset();
        }
        self.state = SessionState::new(self.profile.name.clone());
    }

    /// Run extractor -> classifier -> stage machine for one frame
    fn process(
        &mut self,
        key: &SessionKey,
        frame: &LandmarkFrame,
        reps_per_set: u32,
    ) -> (FrameResult, Option<TransitionEvent>) {
        self.state.frames_observed += 1;
        self.state.last_activity = chrono::Utc::now().timestamp_millis();

        let features = match feature_extractor::extract(frame, &self.profile) {
            Ok(features) => features,
            Err(e) => return (self.skip(key, e), None),
        };

        let classifier = match self.classifier.as_mut() {
            Some(classifier) => classifier,
            None => return (self.skip(key, EngineError::ClassifierUnavailable), None),
        };

        let classification = match classifier.classify(&features) {
            Ok(result) => result,
            Err(e) => return (self.skip(key, e), None),
        };

        self.state.last_label = classification.label.clone();
        self.state.last_confidence = classification.confidence;
        self.state.last_probabilities = classification.probabilities.clone();

        let mut event = None;
        if let Some(transition) = self.machine.step(&classification) {
            self.state.current_stage = transition.to;

            if transition.counted {
                self.state.counter += 1;
                if self.state.counter % reps_per_set.max(1) == 0 {
                    self.state.sets_completed += 1;
                }
                tracing::info!(
                    "Session {}: {} rep {} counted",
                    key,
                    self.profile.name,
                    self.state.counter
                );
            }

            event = Some(TransitionEvent {
                session_key: key.clone(),
                from: transition.from,
                to: transition.to,
                to_label: transition.to.label(&self.profile).to_string(),
                counted: transition.counted,
                counter: self.state.counter,
                sets_completed: self.state.sets_completed,
            });
        }

        let result = FrameResult {
            stage: self.state.current_stage.label(&self.profile).to_string(),
            label: classification.label,
            confidence: classification.confidence,
            counter: self.state.counter,
            detected: true,
            counted: event.as_ref().map(|e| e.counted).unwrap_or(false),
            sets_completed: self.state.sets_completed,
            skip_reason: None,
        };

        (result, event)
    }

    /// Frame produced no classification; counters and stage stay untouched
    fn skip(&mut self, key: &SessionKey, error: EngineError) -> FrameResult {
        self.state.frames_skipped += 1;

        let reason = match error {
            EngineError::LandmarksMissing { joint } => {
                tracing::debug!("Session {}: no usable landmarks ({})", key, joint);
                SkipReason::NoLandmarks
            }
            EngineError::ClassifierUnavailable => {
                tracing::debug!("Session {}: no classifier for {}", key, self.profile.name);
                SkipReason::ClassifierUnavailable
            }
            other => {
                tracing::warn!("Session {}: frame rejected: {}", key, other);
                SkipReason::FeatureShape
            }
        };

        FrameResult {
            stage: self.state.current_stage.label(&self.profile).to_string(),
            label: self.state.last_label.clone(),
            confidence: self.state.last_confidence,
            counter: self.state.counter,
            detected: false,
            counted: false,
            sets_completed: self.state.sets_completed,
            skip_reason: Some(reason),
        }
    }
}

/// A profile paired with the model its learned classifier should use
pub type ProfileBinding = (ExerciseProfile, Option<Arc<dyn PhaseModel>>);

/// Build the classifier once to catch invalid profiles and shape mismatches
fn check_profile(
    profile: &ExerciseProfile,
    model: &Option<Arc<dyn PhaseModel>>,
) -> EngineResult<()> {
    match build_classifier(profile, model.clone()) {
        Ok(_) => Ok(()),
        Err(EngineError::ClassifierUnavailable) => {
            tracing::warn!(
                "Profile {} has no model; its frames will not be classified",
                profile.name
            );
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn profile_entry(profile: ExerciseProfile, model: Option<Arc<dyn PhaseModel>>) -> ProfileEntry {
    tracing::info!(
        "Registered profile {} ({}, counts {})",
        profile.name,
        profile.classifier_variant.to_string(),
        profile.counted_transition.to_string()
    );
    ProfileEntry {
        profile: Arc::new(profile),
        model,
    }
}

// ==============================================================================
// Session Manager
// ==============================================================================

/// Owns the state of every live session, keyed by session id.
///
/// Each session sits behind its own mutex; the session map is only locked
/// long enough to look an entry up. Frames for one session must still be
/// submitted in capture order.
pub struct SessionManager {
    config: SessionConfig,
    profiles: RwLock<HashMap<String, ProfileEntry>>,
    sessions: RwLock<HashMap<SessionKey, Arc<Mutex<SessionEntry>>>>,
    emitters: RwLock<Vec<Arc<dyn FeedbackEmitter>>>,
    monitoring: Arc<tokio::sync::RwLock<bool>>,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            profiles: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            emitters: RwLock::new(Vec::new()),
            monitoring: Arc::new(tokio::sync::RwLock::new(false)),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Register (or replace) an exercise profile.
    ///
    /// Fails on invalid profiles and on model/profile shape mismatches. A
    /// learned profile without a model is accepted; its sessions report
    /// `detected=false` until a model is registered.
    pub fn register_profile(
        &self,
        profile: ExerciseProfile,
        model: Option<Arc<dyn PhaseModel>>,
    ) -> EngineResult<()> {
        check_profile(&profile, &model)?;

        self.profiles
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(profile.name.clone(), profile_entry(profile, model));
        Ok(())
    }

    /// Check a full profile set without applying any of it
    pub fn check_profiles(&self, profiles: &[ProfileBinding]) -> EngineResult<()> {
        for (profile, model) in profiles {
            check_profile(profile, model)?;
        }
        Ok(())
    }

    /// Replace every registered profile with `profiles`.
    ///
    /// All-or-nothing: if any profile fails its check the registered set is
    /// left as it was. Profiles missing from `profiles` are unregistered;
    /// running sessions keep the profile they started with.
    pub fn replace_profiles(&self, profiles: Vec<ProfileBinding>) -> EngineResult<()> {
        self.check_profiles(&profiles)?;

        let replacement: HashMap<String, ProfileEntry> = profiles
            .into_iter()
            .map(|(profile, model)| (profile.name.clone(), profile_entry(profile, model)))
            .collect();

        let mut registered = self.profiles.write().unwrap_or_else(|e| e.into_inner());
        for name in registered.keys().filter(|name| !replacement.contains_key(*name)) {
            tracing::info!("Unregistered profile {}", name);
        }
        *registered = replacement;
        Ok(())
    }

    pub fn profile_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .profiles
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn add_emitter(&self, emitter: Arc<dyn FeedbackEmitter>) {
        self.emitters
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(emitter);
    }

    /// Start a session under a fresh key
    pub fn create_session(&self, exercise: Option<&str>) -> EngineResult<SessionKey> {
        let key = SessionKey::generate();
        self.start_session(&key, exercise.unwrap_or(&self.config.default_exercise))?;
        Ok(key)
    }

    /// Start (or restart) a session under a caller-chosen key
    pub fn start_session(&self, key: &SessionKey, exercise: &str) -> EngineResult<()> {
        let entry = self.new_entry(exercise)?;
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.clone(), Arc::new(Mutex::new(entry)));

        tracing::info!("Started session {} ({})", key, exercise);
        Ok(())
    }

    fn new_entry(&self, exercise: &str) -> EngineResult<SessionEntry> {
        let profiles = self.profiles.read().unwrap_or_else(|e| e.into_inner());
        let registered = profiles
            .get(exercise)
            .ok_or_else(|| EngineError::UnknownProfile(exercise.to_string()))?;

        let classifier = match build_classifier(&registered.profile, registered.model.clone()) {
            Ok(classifier) => Some(classifier),
            Err(EngineError::ClassifierUnavailable) => None,
            Err(e) => return Err(e),
        };

        Ok(SessionEntry::new(registered.profile.clone(), classifier))
    }

    fn entry(&self, key: &SessionKey) -> Option<Arc<Mutex<SessionEntry>>> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn entry_or_start(&self, key: &SessionKey) -> EngineResult<Arc<Mutex<SessionEntry>>> {
        if let Some(entry) = self.entry(key) {
            return Ok(entry);
        }

        let created = Arc::new(Mutex::new(self.new_entry(&self.config.default_exercise)?));
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        // Another caller may have started the session while we built ours
        let entry = sessions.entry(key.clone()).or_insert(created).clone();
        drop(sessions);

        tracing::info!("Started session {} ({})", key, self.config.default_exercise);
        Ok(entry)
    }

    /// Process one landmark frame for a session. Never fails: frames that
    /// cannot be classified come back with `detected=false`.
    pub fn observe(&self, key: &SessionKey, frame: &LandmarkFrame) -> FrameResult {
        let entry = match self.entry_or_start(key) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Session {}: cannot start: {}", key, e);
                let reason = match e {
                    EngineError::UnknownProfile(_) => SkipReason::UnknownProfile,
                    EngineError::ClassifierUnavailable => SkipReason::ClassifierUnavailable,
                    _ => SkipReason::FeatureShape,
                };
                return FrameResult {
                    stage: "unknown".to_string(),
                    label: String::new(),
                    confidence: 0.0,
                    counter: 0,
                    detected: false,
                    counted: false,
                    sets_completed: 0,
                    skip_reason: Some(reason),
                };
            }
        };

        let (result, event) = {
            let mut session = entry.lock().unwrap_or_else(|e| e.into_inner());
            session.process(key, frame, self.config.reps_per_set)
        };

        if let Some(event) = event {
            for emitter in self.emitters.read().unwrap_or_else(|e| e.into_inner()).iter() {
                emitter.on_transition(&event);
            }
        }

        result
    }

    /// Return a session to its initial state. Returns the zeroed counter.
    pub fn reset(&self, key: &SessionKey) -> EngineResult<u32> {
        let entry = self.entry_or_start(key)?;
        let counter = {
            let mut session = entry.lock().unwrap_or_else(|e| e.into_inner());
            session.reset();
            session.state.counter
        };

        for emitter in self.emitters.read().unwrap_or_else(|e| e.into_inner()).iter() {
            emitter.on_reset(key);
        }

        tracing::info!("Reset session {}", key);
        Ok(counter)
    }

    /// Snapshot of a session's state
    pub fn status(&self, key: &SessionKey) -> EngineResult<SessionState> {
        let entry = self
            .entry(key)
            .ok_or_else(|| EngineError::SessionNotFound(key.to_string()))?;
        let session = entry.lock().unwrap_or_else(|e| e.into_inner());
        Ok(session.state.clone())
    }

    /// Drop a session. Returns false if it did not exist.
    pub fn end_session(&self, key: &SessionKey) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
            .is_some();
        if removed {
            tracing::info!("Ended session {}", key);
        }
        removed
    }

    pub fn session_keys(&self) -> Vec<SessionKey> {
        let mut keys: Vec<SessionKey> = self
            .sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Drop sessions with no activity for at least `max_idle`
    pub fn evict_idle(&self, max_idle: Duration) -> Vec<SessionKey> {
        let idle_ms = i64::try_from(max_idle.as_millis()).unwrap_or(i64::MAX);
        let cutoff = chrono::Utc::now().timestamp_millis().saturating_sub(idle_ms);

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let idle: Vec<SessionKey> = sessions
            .iter()
            .filter(|(_, entry)| {
                let session = entry.lock().unwrap_or_else(|e| e.into_inner());
                session.state.last_activity <= cutoff
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in &idle {
            sessions.remove(key);
            tracing::info!("Ended session {} due to idle timeout", key);
        }

        idle
    }

    pub async fn start_monitoring(self: &Arc<Self>) -> EngineResult<()> {
        let mut monitoring = self.monitoring.write().await;
        if *monitoring {
            return Ok(());
        }

        *monitoring = true;

        let manager = Arc::downgrade(self);
        let monitoring_flag = self.monitoring.clone();
        let interval = Duration::from_secs(self.config.monitor_interval_secs.max(1));
        let max_idle = Duration::from_secs(self.config.idle_timeout_minutes as u64 * 60);

        tokio::spawn(async move {
            Self::monitor_loop(manager, monitoring_flag, interval, max_idle).await;
        });

        Ok(())
    }

    async fn monitor_loop(
        manager: Weak<SessionManager>,
        monitoring: Arc<tokio::sync::RwLock<bool>>,
        interval: Duration,
        max_idle: Duration,
    ) {
        loop {
            // Check if still monitoring
            if !*monitoring.read().await {
                break;
            }

            match manager.upgrade() {
                Some(manager) => {
                    let evicted = manager.evict_idle(max_idle);
                    if !evicted.is_empty() {
                        tracing::debug!("Evicted {} idle sessions", evicted.len());
                    }
                }
                None => break,
            }

            tokio::time::sleep(interval).await;
        }
    }

    pub async fn stop_monitoring(&self) -> EngineResult<()> {
        *self.monitoring.write().await = false;
        Ok(())
    }

    pub async fn is_monitoring(&self) -> bool {
        *self.monitoring.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ml_models::SoftmaxModel;
    use crate::models::exercise::{CountedTransition, Stage};
    use crate::models::pose::{BodyLandmark, Landmark};

    fn push_up_manager() -> SessionManager {
        let manager = SessionManager::new(SessionConfig {
            reps_per_set: 2,
            ..SessionConfig::default()
        });
        manager
            .register_profile(ExerciseProfile::push_up(), None)
            .unwrap();
        manager
    }

    /// Left arm with the wrist placed so the elbow angle is `extended` (180) or bent (90)
    fn arm_frame(extended: bool, visibility: f32) -> LandmarkFrame {
        let wrist = if extended { (0.9, 0.5) } else { (0.5, 0.9) };
        LandmarkFrame::new(vec![
            Landmark::new(BodyLandmark::LeftShoulder.index(), 0.1, 0.5, 0.0, visibility),
            Landmark::new(BodyLandmark::LeftElbow.index(), 0.5, 0.5, 0.0, visibility),
            Landmark::new(BodyLandmark::LeftWrist.index(), wrist.0, wrist.1, 0.0, visibility),
        ])
        .unwrap()
    }

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.default_exercise, "push_up");
        assert_eq!(config.reps_per_set, 10);
        assert_eq!(config.idle_timeout_minutes, 30);
    }

    #[test]
    fn test_observe_counts_push_up() {
        let manager = push_up_manager();
        let key = SessionKey::from("athlete");

        let first = manager.observe(&key, &arm_frame(true, 0.9));
        assert!(first.detected);
        assert_eq!(first.stage, "up");
        assert_eq!(first.counter, 0);

        let second = manager.observe(&key, &arm_frame(false, 0.9));
        assert_eq!(second.stage, "down");
        assert_eq!(second.counter, 1);
        assert!(second.counted);

        let state = manager.status(&key).unwrap();
        assert_eq!(state.counter, 1);
        assert_eq!(state.current_stage, Stage::StageB);
        assert_eq!(state.frames_observed, 2);
    }

    #[test]
    fn test_sets_follow_reps_per_set() {
        let manager = push_up_manager();
        let key = SessionKey::from("athlete");

        for _ in 0..4 {
            manager.observe(&key, &arm_frame(true, 0.9));
            manager.observe(&key, &arm_frame(false, 0.9));
        }

        let state = manager.status(&key).unwrap();
        assert_eq!(state.counter, 4);
        assert_eq!(state.sets_completed, 2);
    }

    #[test]
    fn test_invisible_frame_is_skipped() {
        let manager = push_up_manager();
        let key = SessionKey::from("athlete");
        manager.observe(&key, &arm_frame(true, 0.9));
        let before = manager.status(&key).unwrap();

        let result = manager.observe(&key, &arm_frame(false, 0.0));
        assert!(!result.detected);
        assert_eq!(result.skip_reason, Some(SkipReason::NoLandmarks));
        assert_eq!(result.counter, 0);
        assert_eq!(result.stage, "up");

        let after = manager.status(&key).unwrap();
        assert_eq!(after.current_stage, before.current_stage);
        assert_eq!(after.last_label, before.last_label);
        assert_eq!(after.frames_skipped, 1);
    }

    #[test]
    fn test_learned_profile_without_model_degrades() {
        let manager = SessionManager::new(SessionConfig {
            default_exercise: "deadlift".to_string(),
            ..SessionConfig::default()
        });
        manager
            .register_profile(ExerciseProfile::deadlift(), None)
            .unwrap();

        let key = SessionKey::from("lifter");
        let frame = LandmarkFrame::new(
            (0..33)
                .map(|i| Landmark::new(i, 0.5, 0.5, 0.0, 0.9))
                .collect(),
        )
        .unwrap();

        let result = manager.observe(&key, &frame);
        assert!(!result.detected);
        assert_eq!(result.skip_reason, Some(SkipReason::ClassifierUnavailable));
        assert_eq!(result.counter, 0);
    }

    #[test]
    fn test_unknown_default_profile_does_not_panic() {
        let manager = SessionManager::new(SessionConfig::default());
        let result = manager.observe(&SessionKey::from("x"), &arm_frame(true, 0.9));
        assert!(!result.detected);
        assert_eq!(result.skip_reason, Some(SkipReason::UnknownProfile));
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn test_replace_profiles_is_all_or_nothing() {
        let manager = push_up_manager();
        let key = SessionKey::from("athlete");

        let mut flipped = ExerciseProfile::push_up();
        flipped.counted_transition = CountedTransition::BToA;
        let mismatched: Arc<dyn PhaseModel> = Arc::new(
            SoftmaxModel::new(
                vec!["down".to_string(), "up".to_string()],
                vec![vec![0.0; 4], vec![0.0; 4]],
                vec![0.0, 0.0],
            )
            .unwrap(),
        );
        let result = manager.replace_profiles(vec![
            (flipped, None),
            (ExerciseProfile::deadlift(), Some(mismatched)),
        ]);
        assert!(matches!(
            result,
            Err(EngineError::FeatureShape {
                expected: 132,
                actual: 4
            })
        ));
        assert_eq!(manager.profile_names(), vec!["push_up"]);

        // The original up -> down counting is still in force
        manager.observe(&key, &arm_frame(true, 0.9));
        assert_eq!(manager.observe(&key, &arm_frame(false, 0.9)).counter, 1);
    }

    #[test]
    fn test_replace_profiles_unregisters_missing() {
        let manager = push_up_manager();
        manager
            .register_profile(ExerciseProfile::deadlift(), None)
            .unwrap();
        let running = manager.create_session(Some("deadlift")).unwrap();

        manager
            .replace_profiles(vec![(ExerciseProfile::push_up(), None)])
            .unwrap();
        assert_eq!(manager.profile_names(), vec!["push_up"]);
        assert!(matches!(
            manager.create_session(Some("deadlift")),
            Err(EngineError::UnknownProfile(_))
        ));
        // Sessions already running keep their profile
        assert_eq!(manager.status(&running).unwrap().exercise, "deadlift");
    }

    #[test]
    fn test_status_unknown_session() {
        let manager = push_up_manager();
        assert!(matches!(
            manager.status(&SessionKey::from("nobody")),
            Err(EngineError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_create_and_end_session() {
        let manager = push_up_manager();
        let key = manager.create_session(None).unwrap();
        assert_eq!(manager.session_keys(), vec![key.clone()]);
        assert_eq!(manager.status(&key).unwrap().exercise, "push_up");

        assert!(manager.create_session(Some("bench_press")).is_err());

        assert!(manager.end_session(&key));
        assert!(!manager.end_session(&key));
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn test_evict_idle() {
        let manager = push_up_manager();
        manager.observe(&SessionKey::from("a"), &arm_frame(true, 0.9));
        manager.observe(&SessionKey::from("b"), &arm_frame(true, 0.9));

        assert!(manager.evict_idle(Duration::from_secs(3600)).is_empty());
        assert_eq!(manager.session_count(), 2);

        let evicted = manager.evict_idle(Duration::ZERO);
        assert_eq!(evicted.len(), 2);
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn test_evict_idle_with_huge_timeout_keeps_sessions() {
        let manager = push_up_manager();
        let key = SessionKey::from("recent");
        manager.observe(&key, &arm_frame(true, 0.9));

        assert!(manager.evict_idle(Duration::MAX).is_empty());
        assert!(manager
            .evict_idle(Duration::from_millis(i64::MAX as u64 + 10))
            .is_empty());
        assert!(manager
            .evict_idle(Duration::from_millis(i64::MAX as u64))
            .is_empty());
        assert_eq!(manager.session_keys(), vec![key]);
    }

    #[tokio::test]
    async fn test_monitoring_start_stop() {
        let manager = Arc::new(push_up_manager());
        assert!(!manager.is_monitoring().await);

        manager.start_monitoring().await.unwrap();
        manager.start_monitoring().await.unwrap();
        assert!(manager.is_monitoring().await);

        manager.stop_monitoring().await.unwrap();
        assert!(!manager.is_monitoring().await);
    }
}
