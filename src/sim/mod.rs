//! Deterministic rider simulation
//!
//! Everything the timeline memoizes is produced here. This module must be
//! pure and deterministic:
//! - Fixed timestep only
//! - Stable iteration order (points by index, lines by descending id)
//! - Stepping produces new values; cached snapshots are never aliased
//! - No rendering or platform dependencies

pub mod line;
pub mod point;
pub mod rider;
pub mod rig;

pub use line::{Line, LineId, LineKind, LineTrigger};
pub use point::PointMass;
pub use rider::Rider;
pub use rig::{Bone, BoneGroup, Rig};
