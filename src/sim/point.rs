//! Verlet point integration
//!
//! A `PointMass` is an immutable value: stepping returns a new point rather
//! than mutating in place, so a cached frame can never alias the buffer the
//! solver is currently working on.

use glam::DVec2;

use crate::consts::GRAVITY;

/// A single integrated mass point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointMass {
    /// Current position
    pub location: DVec2,
    /// Position on the previous tick; momentum is derived from it
    pub previous: DVec2,
    /// Dual-purpose coefficient: surface friction during line contact for
    /// rider points, per-tick momentum damping for damped (scarf) points
    pub friction: f64,
}

impl PointMass {
    /// A point at rest: no momentum until something moves it
    pub const fn new(location: DVec2, friction: f64) -> Self {
        Self {
            location,
            previous: location,
            friction,
        }
    }

    pub const fn with_state(location: DVec2, previous: DVec2, friction: f64) -> Self {
        Self {
            location,
            previous,
            friction,
        }
    }

    /// Displacement accumulated over the last tick
    #[inline]
    pub fn momentum(&self) -> DVec2 {
        self.location - self.previous
    }

    /// Verlet step under constant gravity; momentum carries over in full
    #[inline]
    pub fn step_free(&self) -> Self {
        Self::with_state(
            self.location + self.momentum() + GRAVITY,
            self.location,
            self.friction,
        )
    }

    /// Step for cosmetic points: momentum decays by `friction` each tick
    /// instead of being preserved
    #[inline]
    pub fn step_damped(&self) -> Self {
        Self::with_state(
            self.location + self.momentum() * self.friction + GRAVITY,
            self.location,
            self.friction,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn new_point_has_no_momentum() {
        let p = PointMass::new(DVec2::new(3.0, -2.0), 0.8);
        assert_eq!(p.momentum(), DVec2::ZERO);
    }

    #[test]
    fn free_step_applies_gravity() {
        let p = PointMass::new(DVec2::ZERO, 0.0);
        let stepped = p.step_free();
        assert_eq!(stepped.location, GRAVITY);
        assert_eq!(stepped.previous, DVec2::ZERO);
    }

    #[test]
    fn free_step_preserves_momentum() {
        let p = PointMass::with_state(DVec2::new(1.0, 0.0), DVec2::ZERO, 0.0);
        let stepped = p.step_free();
        assert_eq!(stepped.momentum(), DVec2::new(1.0, 0.0) + GRAVITY);
        assert_eq!(stepped.location, DVec2::new(2.0, 0.0) + GRAVITY);
    }

    #[test]
    fn damped_step_decays_momentum() {
        let p = PointMass::with_state(DVec2::new(1.0, 0.0), DVec2::ZERO, 0.5);
        let stepped = p.step_damped();
        assert_relative_eq!(stepped.location.x, 1.5, epsilon = 1e-12);
        assert_relative_eq!(stepped.location.y, GRAVITY.y, epsilon = 1e-12);
    }

    #[test]
    fn stepping_is_pure() {
        let p = PointMass::new(DVec2::new(5.0, 5.0), 0.8);
        let a = p.step_free();
        let b = p.step_free();
        assert_eq!(a, b);
        assert_eq!(p.location, DVec2::new(5.0, 5.0));
    }
}
