// Feeds recorded landmark frames (one JSON document per line) through a session

use crate::core::session_manager::SessionManager;
use crate::models::exercise::{EngineError, EngineResult, FrameResult, SessionKey};
use crate::platform::pose::parse_landmarks_json;
use serde::{Deserialize, Serialize};
use std::io::BufRead;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub frames: u64,
    pub detected_frames: u64,
    pub malformed_lines: u64,
    pub reps: u32,
    pub sets: u32,
}

/// Replay every line of `input` into `session`.
///
/// Blank lines are ignored and undecodable lines are logged and skipped, so
/// one bad record does not end the replay. `on_frame` sees each result in
/// order.
pub fn replay_frames<R, F>(
    manager: &SessionManager,
    session: &SessionKey,
    input: R,
    mut on_frame: F,
) -> EngineResult<ReplaySummary>
where
    R: BufRead,
    F: FnMut(u64, &FrameResult),
{
    let mut summary = ReplaySummary::default();

    for (line_no, line) in input.lines().enumerate() {
        let line = line.map_err(|e| {
            EngineError::InvalidFrame(format!("Read failed at line {}: {}", line_no + 1, e))
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let frame = match parse_landmarks_json(&line) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Skipping line {}: {}", line_no + 1, e);
                summary.malformed_lines += 1;
                continue;
            }
        };

        let result = manager.observe(session, &frame);
        summary.frames += 1;
        if result.detected {
            summary.detected_frames += 1;
        }
        summary.reps = result.counter;
        summary.sets = result.sets_completed;

        on_frame(summary.frames, &result);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session_manager::SessionConfig;
    use crate::models::exercise::ExerciseProfile;
    use std::io::Cursor;

    fn elbow_line(wrist: (f32, f32)) -> String {
        format!(
            r#"[{{"index":11,"x":0.1,"y":0.5,"z":0.0,"visibility":0.9}},{{"index":13,"x":0.5,"y":0.5,"z":0.0,"visibility":0.9}},{{"index":15,"x":{},"y":{},"z":0.0,"visibility":0.9}}]"#,
            wrist.0, wrist.1
        )
    }

    #[test]
    fn test_replay_counts_and_skips_bad_lines() {
        let manager = SessionManager::new(SessionConfig::default());
        manager
            .register_profile(ExerciseProfile::push_up(), None)
            .unwrap();

        let up = elbow_line((0.9, 0.5));
        let down = elbow_line((0.5, 0.9));
        let input = [
            up.as_str(),
            "",
            down.as_str(),
            "{broken",
            up.as_str(),
            r#"{"landmarks_detected": false, "landmarks": []}"#,
            down.as_str(),
        ]
        .join("\n");

        let mut seen = Vec::new();
        let summary = replay_frames(
            &manager,
            &SessionKey::from("replay"),
            Cursor::new(input),
            |n, result| seen.push((n, result.counter)),
        )
        .unwrap();

        assert_eq!(summary.frames, 5);
        assert_eq!(summary.detected_frames, 4);
        assert_eq!(summary.malformed_lines, 1);
        assert_eq!(summary.reps, 2);
        assert_eq!(summary.sets, 0);
        assert_eq!(seen.last(), Some(&(5, 2)));
    }
}
