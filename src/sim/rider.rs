//! Rider snapshots and the per-tick constraint solver
//!
//! A `Rider` is an immutable snapshot: `simulate` builds a new rider from
//! the old one, which makes cloning the unit of frame memoization. The
//! solver's ordering (points by index, lines by descending id, bones in
//! table order) is load-bearing; the timeline's cache is only correct
//! because the same inputs always produce the same snapshot.

use glam::DVec2;
use log::debug;

use super::line::LineId;
use super::point::PointMass;
use super::rig::{self, Bone, BoneGroup, Rig, joints};
use crate::grid::SpatialGrid;

/// One simulated rider state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rider {
    /// Sled and body points, indexed by `rig::joints`
    pub points: [PointMass; rig::POINT_COUNT],
    /// Cosmetic scarf chain anchored at the shoulder; never queries lines
    pub scarf: [PointMass; rig::SCARF_SEGMENTS],
    /// Bit per bone table entry; a set bit is broken for the rest of this
    /// rider's lifetime
    broken: u32,
    pub crashed: bool,
    pub sled_broken: bool,
}

impl Rider {
    /// Fresh rider in the rig's reference pose, translated by `offset`
    pub fn at_start(rig: &Rig, offset: DVec2) -> Self {
        let points = rig.pose_at(offset);
        let anchor = points[joints::SHOULDER].location;
        let mut scarf = [PointMass::new(anchor, rig::SCARF_FRICTION); rig::SCARF_SEGMENTS];
        for (i, seg) in scarf.iter_mut().enumerate() {
            let trail = DVec2::new(-((i + 1) as f64) * rig::SCARF_SPACING, 0.0);
            *seg = PointMass::new(anchor + trail, rig::SCARF_FRICTION);
        }
        Self {
            points,
            scarf,
            broken: 0,
            crashed: false,
            sled_broken: false,
        }
    }

    pub fn bone_broken(&self, index: usize) -> bool {
        self.broken & (1 << index) != 0
    }

    /// Axis-aligned bounds of the physics points. The scarf is excluded: it
    /// never reads the grid, so it cannot widen the set of lines that could
    /// affect this rider.
    pub fn bounds(&self) -> (DVec2, DVec2) {
        let mut min = self.points[0].location;
        let mut max = min;
        for p in &self.points[1..] {
            min = min.min(p.location);
            max = max.max(p.location);
        }
        (min, max)
    }

    fn bone_active(&self, index: usize, bone: &Bone) -> bool {
        if self.bone_broken(index) {
            return false;
        }
        match bone.group {
            BoneGroup::Sled => !self.sled_broken,
            BoneGroup::Mount => !self.crashed && !self.sled_broken,
            // Repel bones hold posture; a crashed rider ragdolls without them
            BoneGroup::Body => !(bone.repel_only && self.crashed),
        }
    }

    /// Advance one tick against `grid`, returning the new snapshot and the
    /// ids of every line touched this tick (ascending, deduplicated).
    ///
    /// `max_iterations` below [`crate::consts::SOLVER_ITERATIONS`] is a
    /// diagnostic preview of individual constraint sub-steps; preview
    /// results must never be cached as canonical frames.
    pub fn simulate(
        &self,
        grid: &SpatialGrid,
        bones: &[Bone],
        max_iterations: usize,
    ) -> (Rider, Vec<LineId>) {
        let mut next = *self;
        let mut hits: Vec<LineId> = Vec::new();

        for p in &mut next.points {
            *p = p.step_free();
        }

        for _ in 0..max_iterations {
            next.collision_pass(grid, &mut hits);
            next.constraint_pass(bones);
        }
        next.scarf_pass();

        hits.sort_unstable();
        hits.dedup();
        (next, hits)
    }

    /// Resolve every point against the lines in its 3x3 cell neighborhood,
    /// highest id first
    fn collision_pass(&mut self, grid: &SpatialGrid, hits: &mut Vec<LineId>) {
        for point in &mut self.points {
            for line in grid.lines_near(point.location) {
                if let Some(corrected) = line.interact(*point) {
                    *point = corrected;
                    hits.push(line.id);
                }
            }
        }
    }

    /// Restore every active bone's rest length with a symmetric half-step;
    /// overstressed breakable bones snap permanently
    fn constraint_pass(&mut self, bones: &[Bone]) {
        for (index, bone) in bones.iter().enumerate() {
            if !self.bone_active(index, bone) {
                continue;
            }
            let a = self.points[bone.joint_a];
            let b = self.points[bone.joint_b];
            let d = a.location - b.location;
            let length = d.length();
            if length <= f64::EPSILON {
                continue;
            }
            if bone.repel_only && length >= bone.rest_length {
                continue;
            }
            if bone.breakable && length > bone.rest_length * (1.0 + rig::ENDURANCE) {
                self.broken |= 1 << index;
                match bone.group {
                    BoneGroup::Sled => self.sled_broken = true,
                    BoneGroup::Mount | BoneGroup::Body => self.crashed = true,
                }
                debug!(
                    "bone {index} ({:?}) snapped at {length:.3} (rest {:.3})",
                    bone.group, bone.rest_length
                );
                continue;
            }
            let correction = d * ((length - bone.rest_length) / length * 0.5);
            self.points[bone.joint_a] =
                PointMass::with_state(a.location - correction, a.previous, a.friction);
            self.points[bone.joint_b] =
                PointMass::with_state(b.location + correction, b.previous, b.friction);
        }
    }

    /// Damped-step the scarf and re-chain it to the shoulder. Cosmetic: the
    /// chain follows the rider, never the other way around.
    fn scarf_pass(&mut self) {
        let mut anchor = self.points[joints::SHOULDER].location;
        for seg in &mut self.scarf {
            let stepped = seg.step_damped();
            let d = stepped.location - anchor;
            let length = d.length();
            let location = if length > f64::EPSILON {
                anchor + d * (rig::SCARF_SPACING / length)
            } else {
                anchor + DVec2::new(-rig::SCARF_SPACING, 0.0)
            };
            *seg = PointMass::with_state(location, stepped.previous, stepped.friction);
            anchor = location;
        }
    }
}
