//! Collidable line segments
//!
//! A line is one-sided: only a point inside the contact band on the solid
//! side (selected by `inverted`) is resolved. Contact projects the point
//! back onto the surface and bleeds momentum through the point's friction
//! coefficient, which is what makes landings inelastic.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::point::PointMass;
use crate::consts::LINE_CONTACT_ZONE;

/// Stable line identifier. Larger ids are evaluated first during collision;
/// that ordering is a load-bearing tie-break, not cosmetic.
pub type LineId = i32;

/// What a line participates in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineKind {
    /// Collides with the rider
    Standard,
    /// Decoration only; never enters the physics grid
    Scenery,
}

/// Zoom trigger payload carried by a standard line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineTrigger {
    /// Zoom level the camera channel converges to while active
    pub target_zoom: f32,
    /// Number of frames the convergence is spread over
    pub frames: i32,
}

/// A drawn track segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub id: LineId,
    pub start: DVec2,
    pub end: DVec2,
    pub kind: LineKind,
    /// Flips which side of the segment is solid
    pub inverted: bool,
    pub trigger: Option<LineTrigger>,
}

impl Line {
    pub fn new(id: LineId, start: DVec2, end: DVec2, kind: LineKind) -> Self {
        Self {
            id,
            start,
            end,
            kind,
            inverted: false,
            trigger: None,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    pub fn with_trigger(mut self, trigger: LineTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Whether the line participates in physics at all
    #[inline]
    pub fn collides(&self) -> bool {
        matches!(self.kind, LineKind::Standard)
    }

    #[inline]
    fn delta(&self) -> DVec2 {
        self.end - self.start
    }

    /// Unit normal pointing from the surface into the contact band
    /// (the side a penetrating point is pushed back out of)
    pub fn normal(&self) -> DVec2 {
        let d = self.delta();
        let n = DVec2::new(-d.y, d.x) / d.length();
        if self.inverted { -n } else { n }
    }

    /// Axis-aligned bounds of the segment
    pub fn bounds(&self) -> (DVec2, DVec2) {
        (self.start.min(self.end), self.start.max(self.end))
    }

    /// One-sided contact resolution.
    ///
    /// Returns the corrected point if `point` is inside the contact band,
    /// `None` otherwise. On contact the location is projected onto the
    /// surface and `previous` is nudged so the resulting momentum matches an
    /// inelastic collision: normal motion is absorbed, tangential motion is
    /// opposed in proportion to the point's friction and the penetration
    /// depth.
    pub fn interact(&self, point: PointMass) -> Option<PointMass> {
        let d = self.delta();
        let len_sq = d.length_squared();
        if len_sq <= f64::EPSILON {
            return None;
        }

        let offset = point.location - self.start;
        let n = self.normal();
        let depth = n.dot(offset);
        if depth <= 0.0 || depth >= LINE_CONTACT_ZONE {
            return None;
        }

        let along = offset.dot(d) / len_sq;
        if !(0.0..=1.0).contains(&along) {
            return None;
        }

        let location = point.location - n * depth;
        let mut drag = DVec2::new(n.y, n.x) * point.friction * depth;
        if point.previous.x >= location.x {
            drag.x = -drag.x;
        }
        if point.previous.y >= location.y {
            drag.y = -drag.y;
        }
        Some(PointMass::with_state(
            location,
            point.previous + drag,
            point.friction,
        ))
    }
}
