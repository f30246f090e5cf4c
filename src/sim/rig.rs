//! Sled and rider constraint topology
//!
//! The reference pose and bone table are built once per `Rig`; rest lengths
//! are measured from the pose at that moment and never recomputed, so every
//! rider spawned from the same rig replays identically for the whole
//! process lifetime.

use glam::DVec2;

use super::point::PointMass;

/// Joint indices into the rider's point array
pub mod joints {
    pub const PEG: usize = 0;
    pub const TAIL: usize = 1;
    pub const NOSE: usize = 2;
    pub const STRING: usize = 3;
    pub const BUTT: usize = 4;
    pub const SHOULDER: usize = 5;
    pub const RIGHT_HAND: usize = 6;
    pub const LEFT_HAND: usize = 7;
    pub const LEFT_FOOT: usize = 8;
    pub const RIGHT_FOOT: usize = 9;
}

/// Number of physical points in the rider
pub const POINT_COUNT: usize = 10;
/// Cosmetic scarf points trailing from the shoulder
pub const SCARF_SEGMENTS: usize = 6;
/// Rest spacing between consecutive scarf points
pub const SCARF_SPACING: f64 = 2.0;
/// Momentum damping of scarf points
pub const SCARF_FRICTION: f64 = 0.9;
/// Fraction of its rest length a breakable bone may stretch before it snaps
pub const ENDURANCE: f64 = 0.057;
/// Repel-only posture bones keep the joints at least this fraction of the
/// measured pose distance apart
const REPEL_REST_FACTOR: f64 = 0.5;

/// Structural group a bone belongs to; decides which crash flag a break
/// flips and which passes are skipped once the rider is wrecked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoneGroup {
    /// Sled frame; a break here means the sled itself came apart
    Sled,
    /// Rider-to-sled attachment; a break here dismounts the rider
    Mount,
    /// Rider skeleton; keeps solving even after a crash
    Body,
}

/// A distance constraint between two rider points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bone {
    pub joint_a: usize,
    pub joint_b: usize,
    pub rest_length: f64,
    pub breakable: bool,
    /// Only pushes the joints apart, never pulls them together
    pub repel_only: bool,
    pub group: BoneGroup,
}

/// Reference pose plus the bone table derived from it
#[derive(Debug, Clone)]
pub struct Rig {
    pose: [PointMass; POINT_COUNT],
    bones: Vec<Bone>,
}

impl Rig {
    /// The canonical sled + rider: four sled points, six body joints,
    /// frictions tuned so the sled rails slide and the body drags
    pub fn default_rig() -> Self {
        use joints::*;
        let pose = [
            PointMass::new(DVec2::new(0.0, 0.0), 0.8),    // PEG
            PointMass::new(DVec2::new(0.0, 5.0), 0.0),    // TAIL
            PointMass::new(DVec2::new(15.0, 5.0), 0.0),   // NOSE
            PointMass::new(DVec2::new(17.5, 0.0), 0.0),   // STRING
            PointMass::new(DVec2::new(5.0, 0.0), 0.8),    // BUTT
            PointMass::new(DVec2::new(5.0, -5.5), 0.8),   // SHOULDER
            PointMass::new(DVec2::new(11.5, -5.0), 0.1),  // RIGHT_HAND
            PointMass::new(DVec2::new(11.5, -5.0), 0.1),  // LEFT_HAND
            PointMass::new(DVec2::new(10.0, 5.0), 0.0),   // LEFT_FOOT
            PointMass::new(DVec2::new(10.0, 5.0), 0.0),   // RIGHT_FOOT
        ];

        let frame = |a, b| Self::bone(&pose, a, b, BoneGroup::Sled, true, false, 1.0);
        let mount = |a, b| Self::bone(&pose, a, b, BoneGroup::Mount, true, false, 1.0);
        let limb = |a, b| Self::bone(&pose, a, b, BoneGroup::Body, false, false, 1.0);
        let repel = |a, b| Self::bone(&pose, a, b, BoneGroup::Body, false, true, REPEL_REST_FACTOR);

        let bones = vec![
            // Sled frame
            frame(PEG, TAIL),
            frame(TAIL, NOSE),
            frame(NOSE, STRING),
            frame(STRING, PEG),
            frame(PEG, NOSE),
            frame(STRING, TAIL),
            // Rider mounted on the sled
            mount(PEG, BUTT),
            mount(TAIL, BUTT),
            mount(NOSE, BUTT),
            mount(STRING, RIGHT_HAND),
            mount(STRING, LEFT_HAND),
            mount(LEFT_FOOT, NOSE),
            mount(RIGHT_FOOT, NOSE),
            // Rider skeleton
            limb(SHOULDER, BUTT),
            limb(SHOULDER, RIGHT_HAND),
            limb(SHOULDER, LEFT_HAND),
            limb(BUTT, LEFT_FOOT),
            limb(BUTT, RIGHT_FOOT),
            // Posture: keep the torso from folding onto the legs
            repel(SHOULDER, LEFT_FOOT),
            repel(SHOULDER, RIGHT_FOOT),
        ];

        Self { pose, bones }
    }

    fn bone(
        pose: &[PointMass; POINT_COUNT],
        joint_a: usize,
        joint_b: usize,
        group: BoneGroup,
        breakable: bool,
        repel_only: bool,
        rest_factor: f64,
    ) -> Bone {
        let rest = pose[joint_a].location.distance(pose[joint_b].location);
        Bone {
            joint_a,
            joint_b,
            rest_length: rest * rest_factor,
            breakable,
            repel_only,
            group,
        }
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    /// Reference pose translated by `offset`, momentum-free
    pub fn pose_at(&self, offset: DVec2) -> [PointMass; POINT_COUNT] {
        self.pose
            .map(|p| PointMass::new(p.location + offset, p.friction))
    }
}

impl Default for Rig {
    fn default() -> Self {
        Self::default_rig()
    }
}
