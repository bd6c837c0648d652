//! Per-frame feature computation
//!
//! This module derives motion and angle features from raw keypoints:
//! - per-joint velocity and acceleration magnitudes (12 motion joints)
//! - joint angles from vector geometry over adjacent joint triples
//!
//! Computation is a pure function of up to two prior frames plus the current
//! frame. Joints below the confidence threshold have their dependent features
//! zeroed rather than computed from noise, and every output value is finite.
//!
//! Raw keypoint coordinates are not part of the layout: the vector carries
//! derived motion and angle features only, so model artifacts must be
//! trained against exactly this feature width (`num_features`).

use crate::types::{JointAngles, Joint, Keypoint, Vec2, JOINT_COUNT};

/// Joints contributing velocity/acceleration features, in layout order
pub const MOTION_JOINTS: [Joint; 12] = [
    Joint::LeftShoulder,
    Joint::RightShoulder,
    Joint::LeftElbow,
    Joint::RightElbow,
    Joint::LeftWrist,
    Joint::RightWrist,
    Joint::LeftHip,
    Joint::RightHip,
    Joint::LeftKnee,
    Joint::RightKnee,
    Joint::LeftAnkle,
    Joint::RightAnkle,
];

/// Angle features as (name, triple) with the vertex joint in the middle
const ANGLE_TRIPLES: [(&str, Joint, Joint, Joint); 8] = [
    ("Left Elbow Angle", Joint::LeftShoulder, Joint::LeftElbow, Joint::LeftWrist),
    ("Right Elbow Angle", Joint::RightShoulder, Joint::RightElbow, Joint::RightWrist),
    ("Left Shoulder Angle", Joint::LeftElbow, Joint::LeftShoulder, Joint::LeftHip),
    ("Right Shoulder Angle", Joint::RightElbow, Joint::RightShoulder, Joint::RightHip),
    ("Left Hip Angle", Joint::LeftShoulder, Joint::LeftHip, Joint::LeftKnee),
    ("Right Hip Angle", Joint::RightShoulder, Joint::RightHip, Joint::RightKnee),
    ("Left Knee Angle", Joint::LeftHip, Joint::LeftKnee, Joint::LeftAnkle),
    ("Right Knee Angle", Joint::RightHip, Joint::RightKnee, Joint::RightAnkle),
];

/// Total features in the fixed layout
pub fn num_features() -> usize {
    MOTION_JOINTS.len() * 2 + ANGLE_TRIPLES.len()
}

/// Human-readable name for a feature index.
///
/// The index → name mapping is a convention shared with downstream coaching
/// consumers; `test_feature_name_round_trip` pins it.
pub fn feature_name(index: usize) -> Option<String> {
    let motion_len = MOTION_JOINTS.len() * 2;
    if index < motion_len {
        let joint = MOTION_JOINTS[index / 2];
        let kind = if index % 2 == 0 { "Velocity" } else { "Acceleration" };
        Some(format!("{} {}", joint.as_str(), kind))
    } else {
        ANGLE_TRIPLES
            .get(index - motion_len)
            .map(|(name, _, _, _)| (*name).to_string())
    }
}

/// All feature names in layout order
pub fn feature_names() -> Vec<String> {
    (0..num_features())
        .map(|i| feature_name(i).unwrap_or_default())
        .collect()
}

/// Feature index for a human-readable name
pub fn feature_index(name: &str) -> Option<usize> {
    (0..num_features()).find(|&i| feature_name(i).as_deref() == Some(name))
}

/// Motion and angle state derived for one frame
#[derive(Debug, Clone)]
pub struct FrameFeatures {
    /// Per-joint velocity (units/s)
    pub velocities: [Vec2; JOINT_COUNT],
    /// Per-joint acceleration (units/s²)
    pub accelerations: [Vec2; JOINT_COUNT],
    /// Derived joint angles (degrees)
    pub angles: JointAngles,
    /// Fixed-layout feature vector, always finite
    pub vector: Vec<f32>,
}

/// Computes per-frame features from raw keypoints.
///
/// Pure and deterministic; holds no frame history itself.
#[derive(Debug, Clone)]
pub struct FeatureComputer {
    confidence_threshold: f32,
    dt: f32,
}

impl FeatureComputer {
    pub fn new(confidence_threshold: f32, dt: f32) -> Self {
        Self {
            confidence_threshold,
            dt,
        }
    }

    /// Compute features for the current frame given up to two prior frames.
    ///
    /// The first frame of a stream has no velocity, the second no
    /// acceleration; both default to zero.
    pub fn compute(
        &self,
        prev2: Option<&[Keypoint; JOINT_COUNT]>,
        prev: Option<&[Keypoint; JOINT_COUNT]>,
        current: &[Keypoint; JOINT_COUNT],
    ) -> FrameFeatures {
        let mut velocities = [Vec2::default(); JOINT_COUNT];
        let mut accelerations = [Vec2::default(); JOINT_COUNT];

        for i in 0..JOINT_COUNT {
            if current[i].confidence < self.confidence_threshold {
                continue;
            }
            if let Some(prev) = prev {
                velocities[i] = Vec2::new(
                    (current[i].x - prev[i].x) / self.dt,
                    (current[i].y - prev[i].y) / self.dt,
                );
                if let Some(prev2) = prev2 {
                    // Central second difference over three frames
                    let dt2 = self.dt * self.dt;
                    accelerations[i] = Vec2::new(
                        (current[i].x - 2.0 * prev[i].x + prev2[i].x) / dt2,
                        (current[i].y - 2.0 * prev[i].y + prev2[i].y) / dt2,
                    );
                }
            }
        }

        let angles = self.compute_angles(current);

        let mut vector = Vec::with_capacity(num_features());
        for joint in MOTION_JOINTS {
            let i = joint.index();
            vector.push(sanitize(velocities[i].magnitude()));
            vector.push(sanitize(accelerations[i].magnitude()));
        }
        vector.push(sanitize(angles.left_elbow));
        vector.push(sanitize(angles.right_elbow));
        vector.push(sanitize(angles.left_shoulder));
        vector.push(sanitize(angles.right_shoulder));
        vector.push(sanitize(angles.left_hip));
        vector.push(sanitize(angles.right_hip));
        vector.push(sanitize(angles.left_knee));
        vector.push(sanitize(angles.right_knee));

        FrameFeatures {
            velocities,
            accelerations,
            angles,
            vector,
        }
    }

    fn compute_angles(&self, keypoints: &[Keypoint; JOINT_COUNT]) -> JointAngles {
        let angle = |a: Joint, b: Joint, c: Joint| -> f32 {
            let (ka, kb, kc) = (
                &keypoints[a.index()],
                &keypoints[b.index()],
                &keypoints[c.index()],
            );
            if ka.confidence < self.confidence_threshold
                || kb.confidence < self.confidence_threshold
                || kc.confidence < self.confidence_threshold
            {
                return 0.0;
            }
            angle_between(ka.position(), kb.position(), kc.position()).unwrap_or(0.0)
        };

        JointAngles {
            left_elbow: angle(Joint::LeftShoulder, Joint::LeftElbow, Joint::LeftWrist),
            right_elbow: angle(Joint::RightShoulder, Joint::RightElbow, Joint::RightWrist),
            left_shoulder: angle(Joint::LeftElbow, Joint::LeftShoulder, Joint::LeftHip),
            right_shoulder: angle(Joint::RightElbow, Joint::RightShoulder, Joint::RightHip),
            left_hip: angle(Joint::LeftShoulder, Joint::LeftHip, Joint::LeftKnee),
            right_hip: angle(Joint::RightShoulder, Joint::RightHip, Joint::RightKnee),
            left_knee: angle(Joint::LeftHip, Joint::LeftKnee, Joint::LeftAnkle),
            right_knee: angle(Joint::RightHip, Joint::RightKnee, Joint::RightAnkle),
        }
    }
}

/// Angle at vertex `b` of the triple (a, b, c), in degrees.
///
/// Returns None when either limb vector is degenerate.
pub fn angle_between(a: Vec2, b: Vec2, c: Vec2) -> Option<f32> {
    let v1 = Vec2::new(a.x - b.x, a.y - b.y);
    let v2 = Vec2::new(c.x - b.x, c.y - b.y);
    let n1 = v1.magnitude();
    let n2 = v2.magnitude();
    if n1 < 1e-4 || n2 < 1e-4 {
        return None;
    }
    let cos = ((v1.x * v2.x + v1.y * v2.y) / (n1 * n2)).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
