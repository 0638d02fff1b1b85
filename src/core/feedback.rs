// Feedback emitted on stage transitions
// Speech and overlay rendering live downstream; this module only decides what to say

use crate::models::exercise::{SessionKey, TransitionEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Receives stage transitions after the session state has been updated.
///
/// Implementations must tolerate the same event being delivered more than once.
pub trait FeedbackEmitter: Send + Sync {
    fn on_transition(&self, event: &TransitionEvent);

    fn on_reset(&self, _session_key: &SessionKey) {}
}

/// Human-facing coaching cue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cue", content = "value", rename_all = "snake_case")]
pub enum Cue {
    StageEntered(String),
    RepCounted(u32),
    SetCompleted(u32),
}

impl Cue {
    /// Stable key for looking up a localized phrase or sound
    pub fn phrase_key(&self) -> &'static str {
        match self {
            Cue::StageEntered(_) => "stage.enter",
            Cue::RepCounted(_) => "rep.count",
            Cue::SetCompleted(_) => "set.complete",
        }
    }

    pub fn text(&self) -> String {
        match self {
            Cue::StageEntered(stage) => format!("Stage: {}", stage),
            Cue::RepCounted(n) => format!("{}!", n),
            Cue::SetCompleted(n) => format!("Set {} complete!", n),
        }
    }
}

/// Turns transitions into cues, never repeating the phrase just spoken.
///
/// Set completion follows the engine's `sets_completed`, so the cue always
/// agrees with the session state.
pub struct CueFeedback {
    last_event: Mutex<HashMap<SessionKey, TransitionEvent>>,
    last_spoken: Mutex<HashMap<SessionKey, String>>,
    pending: Mutex<Vec<(SessionKey, Cue)>>,
}

impl CueFeedback {
    pub fn new() -> Self {
        Self {
            last_event: Mutex::new(HashMap::new()),
            last_spoken: Mutex::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Take every cue emitted since the last drain
    pub fn drain(&self) -> Vec<(SessionKey, Cue)> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *pending)
    }

    fn cues_for(event: &TransitionEvent, previous_sets: u32) -> Vec<Cue> {
        if !event.counted {
            return vec![Cue::StageEntered(event.to_label.clone())];
        }

        let mut cues = vec![Cue::RepCounted(event.counter)];
        if event.sets_completed > previous_sets {
            cues.push(Cue::SetCompleted(event.sets_completed));
        }
        cues
    }
}

impl Default for CueFeedback {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackEmitter for CueFeedback {
    fn on_transition(&self, event: &TransitionEvent) {
        let previous_sets = {
            let mut last_event = self.last_event.lock().unwrap_or_else(|e| e.into_inner());
            if last_event.get(&event.session_key) == Some(event) {
                return;
            }
            last_event
                .insert(event.session_key.clone(), event.clone())
                .map_or(0, |previous| previous.sets_completed)
        };

        let mut last_spoken = self.last_spoken.lock().unwrap_or_else(|e| e.into_inner());
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());

        for cue in Self::cues_for(event, previous_sets) {
            let text = cue.text();
            if last_spoken.get(&event.session_key) == Some(&text) {
                continue;
            }
            tracing::debug!("Cue for {}: {} ({})", event.session_key, text, cue.phrase_key());
            last_spoken.insert(event.session_key.clone(), text);
            pending.push((event.session_key.clone(), cue));
        }
    }

    fn on_reset(&self, session_key: &SessionKey) {
        self.last_event
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_key);
        self.last_spoken
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_key);
    }
}
