use crate::models::exercise::{
    AngleThresholds, ClassifierVariant, EngineError, EngineResult, ExerciseProfile,
};
use crate::models::pose::{BodySide, FeatureVector, Landmark, LandmarkFrame};

/// Feature name of the measured joint angle, in degrees
pub const FEATURE_ANGLE: &str = "angle";
/// Vertical distance between the two outer joints, in normalized image units
pub const FEATURE_VERTICAL_SPAN: &str = "vertical_span";
/// 0.0 when measured on the left side, 1.0 on the right
pub const FEATURE_SIDE: &str = "side";

/// Angle at `b` formed by `a` and `c`, in degrees within [0, 180]
pub fn calculate_angle(a: (f32, f32), b: (f32, f32), c: (f32, f32)) -> f32 {
    let radians = (c.1 - b.1).atan2(c.0 - b.0) - (a.1 - b.1).atan2(a.0 - b.0);
    let angle = radians.to_degrees().abs();
    if angle > 180.0 {
        360.0 - angle
    } else {
        angle
    }
}

/// Derive the classifier input for one frame.
///
/// Fails with `LandmarksMissing` when the frame holds no usable detection, and
/// with `FeatureShape` when a learned profile receives a frame whose landmark
/// layout differs from the one the model was trained on.
pub fn extract(frame: &LandmarkFrame, profile: &ExerciseProfile) -> EngineResult<FeatureVector> {
    match &profile.classifier_variant {
        ClassifierVariant::Learned { landmark_count, .. } => {
            extract_flattened(frame, *landmark_count, profile.min_visibility)
        }
        ClassifierVariant::RuleBased { thresholds } => {
            extract_joint_angle(frame, thresholds, profile.min_visibility)
        }
    }
}

/// Flatten `(x, y, z, visibility)` per landmark in index order
fn extract_flattened(
    frame: &LandmarkFrame,
    landmark_count: usize,
    min_visibility: f32,
) -> EngineResult<FeatureVector> {
    if frame.is_empty() || !frame.any_visible(min_visibility) {
        return Err(EngineError::LandmarksMissing {
            joint: "all".to_string(),
        });
    }

    if frame.len() != landmark_count {
        return Err(EngineError::FeatureShape {
            expected: landmark_count * 4,
            actual: frame.len() * 4,
        });
    }

    let mut features = FeatureVector::with_capacity(landmark_count * 4);
    for (position, lm) in frame.landmarks().iter().enumerate() {
        // Columns are positional, so a gap in the indices shifts every later joint
        if lm.index as usize != position {
            return Err(EngineError::FeatureShape {
                expected: landmark_count * 4,
                actual: frame.len() * 4,
            });
        }

        let n = position + 1;
        features.push(format!("x{}", n), lm.x);
        features.push(format!("y{}", n), lm.y);
        features.push(format!("z{}", n), lm.z);
        features.push(format!("v{}", n), lm.visibility);
    }

    Ok(features)
}

fn extract_joint_angle(
    frame: &LandmarkFrame,
    thresholds: &AngleThresholds,
    min_visibility: f32,
) -> EngineResult<FeatureVector> {
    let preferred = thresholds.preferred_side;

    let (side, [a, b, c]) = match limb_on_side(frame, thresholds, preferred, min_visibility) {
        Ok(points) => (preferred, points),
        Err(preferred_err) => {
            match limb_on_side(frame, thresholds, preferred.opposite(), min_visibility) {
                Ok(points) => {
                    tracing::debug!(
                        "Falling back to {} side: {}",
                        preferred.opposite().to_string(),
                        preferred_err
                    );
                    (preferred.opposite(), points)
                }
                Err(_) => return Err(preferred_err),
            }
        }
    };

    let mut features = FeatureVector::with_capacity(3);
    features.push(FEATURE_ANGLE, calculate_angle(a.xy(), b.xy(), c.xy()));
    features.push(FEATURE_VERTICAL_SPAN, (a.y - c.y).abs());
    features.push(
        FEATURE_SIDE,
        match side {
            BodySide::Left => 0.0,
            BodySide::Right => 1.0,
        },
    );

    Ok(features)
}

fn limb_on_side(
    frame: &LandmarkFrame,
    thresholds: &AngleThresholds,
    side: BodySide,
    min_visibility: f32,
) -> EngineResult<[Landmark; 3]> {
    let joints = thresholds.joint.landmarks(side);
    let mut points = [Landmark::new(0, 0.0, 0.0, 0.0, 0.0); 3];

    for (slot, joint) in points.iter_mut().zip(joints.iter()) {
        match frame.get(*joint) {
            Some(lm) if lm.is_visible(min_visibility) => *slot = *lm,
            _ => {
                return Err(EngineError::LandmarksMissing {
                    joint: joint.to_string().to_string(),
                })
            }
        }
    }

    Ok(points)
}
