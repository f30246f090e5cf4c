//! Sledline - an incremental 2D sled physics engine
//!
//! A user draws line segments; a sled rider is integrated against them tick
//! by tick. The engine memoizes every simulated frame so an editor can
//! scrub, edit lines, and replay instantly - an edit invalidates only the
//! minimal suffix of frames it can actually affect.
//!
//! Core modules:
//! - `sim`: Deterministic rider simulation (points, bones, line contact)
//! - `grid`: Spatial hash over line segments with versioned rasterization
//! - `track`: Line ownership and editing primitives
//! - `timeline`: Frame-memoizing cache with watermark invalidation
//! - `sandbox`: Lock-guarded editing session
//! - `playback`: Advisory background frame buffering
//!
//! Rendering, persistence bytes, input, and networking are collaborators
//! on the other side of this crate's API; only plain values cross it.

pub mod grid;
pub mod playback;
pub mod sandbox;
pub mod sim;
pub mod timeline;
pub mod track;

pub use grid::{CellPos, GridVersion, SpatialGrid};
pub use playback::PlaybackBuffer;
pub use sandbox::Sandbox;
pub use sim::{Line, LineId, LineKind, LineTrigger, Rider};
pub use timeline::{FrameRecord, LedgerDiff, Timeline};
pub use track::{Track, TrackBlueprint};

/// Engine tuning constants
pub mod consts {
    use glam::DVec2;

    /// Fixed physics timestep (40 ticks of simulated time per second)
    pub const TICK_DT: f64 = 1.0 / 40.0;
    /// Gravity applied to every point, per tick (screen space, +y is down)
    pub const GRAVITY: DVec2 = DVec2::new(0.0, 0.175);
    /// Canonical constraint/collision iterations per tick. Anything lower
    /// is a diagnostic preview and must never enter the frame cache.
    pub const SOLVER_ITERATIONS: usize = 6;
    /// Cell size of the physics collision grid
    pub const PHYSICS_CELL_SIZE: f64 = 14.0;
    /// Cell size of the coarser editor-side query grid
    pub const EDITOR_CELL_SIZE: f64 = 32.0;
    /// Depth of the one-sided contact band below a line's surface
    pub const LINE_CONTACT_ZONE: f64 = 10.0;
    /// Zoom level of a freshly reset timeline
    pub const DEFAULT_ZOOM: f32 = 1.0;
}
