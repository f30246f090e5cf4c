//! Lock-guarded editing session
//!
//! The single authoritative physics state (track + timeline) lives behind
//! one reader/writer lock. Readers share; the frame-request path takes an
//! upgradable read and escalates to a write only when it actually has to
//! recompute, keeping writer exclusivity windows as short as possible;
//! editor mutations are exclusive and feed their grid-cell delta into the
//! timeline before returning.

use std::sync::atomic::{AtomicBool, Ordering};

use glam::DVec2;
use log::info;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};

use crate::grid::GridVersion;
use crate::sim::{Line, LineId, LineKind};
use crate::timeline::{FrameRecord, LedgerDiff, Timeline};
use crate::track::{Track, TrackBlueprint};

/// Frames recomputed per write-lock acquisition on the background path
const BACKGROUND_CHUNK: usize = 256;

struct SandboxState {
    track: Track,
    timeline: Timeline,
}

/// One editing session: a track, its frame cache, and the lock protecting
/// them
pub struct Sandbox {
    state: RwLock<SandboxState>,
}

impl Sandbox {
    pub fn new(version: GridVersion, start_offset: DVec2) -> Self {
        let track = Track::new(version, start_offset);
        let timeline = Timeline::new(track.start_rider());
        info!("sandbox created ({version:?}, start {start_offset})");
        Self {
            state: RwLock::new(SandboxState { track, timeline }),
        }
    }

    pub fn from_blueprint(blueprint: &TrackBlueprint) -> Self {
        let track = Track::from_blueprint(blueprint);
        let timeline = Timeline::new(track.start_rider());
        info!(
            "sandbox restored ({:?}, {} lines)",
            blueprint.grid_version,
            track.line_count()
        );
        Self {
            state: RwLock::new(SandboxState { track, timeline }),
        }
    }

    /// Snapshot for the persistence collaborator
    pub fn blueprint(&self) -> TrackBlueprint {
        self.state.read().track.blueprint()
    }

    pub fn watermark(&self) -> usize {
        self.state.read().timeline.watermark()
    }

    pub fn frame_count(&self) -> usize {
        self.state.read().timeline.frame_count()
    }

    /// The record for `index`. A cache hit shares the lock with other
    /// readers; a miss upgrades and recomputes synchronously.
    pub fn frame(&self, index: usize) -> FrameRecord {
        let state = self.state.upgradable_read();
        if let Some(record) = state.timeline.cached_frame(index) {
            return record;
        }
        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        let SandboxState { track, timeline } = &mut *state;
        timeline.get_frame(index, track)
    }

    /// The record for `index` only if it is already valid; never recomputes
    pub fn frame_if_cached(&self, index: usize) -> Option<FrameRecord> {
        self.state.read().timeline.cached_frame(index)
    }

    /// Diagnostic sub-step preview; see [`Timeline::preview_frame`]
    pub fn preview_frame(&self, index: usize, iterations: usize) -> Option<FrameRecord> {
        let state = self.state.read();
        state.timeline.preview_frame(index, &state.track, iterations)
    }

    /// Move the scrub cursor, returning the minimal recolor diff
    pub fn set_scrub_frame(&self, frame: usize) -> LedgerDiff {
        let mut state = self.state.write();
        let SandboxState { track, timeline } = &mut *state;
        timeline.set_scrub_frame(frame, track)
    }

    pub fn first_hit_frame(&self, id: LineId) -> Option<usize> {
        self.state.read().timeline.ledger().first_hit_frame(id)
    }

    /// Draw a new line, allocating its id
    pub fn create_line(&self, start: DVec2, end: DVec2, kind: LineKind) -> LineId {
        let mut state = self.state.write();
        let SandboxState { track, timeline } = &mut *state;
        let (id, cells) = track.create_line(start, end, kind);
        timeline.notify_cells_changed(&cells, track);
        id
    }

    /// Insert a line with a caller-chosen id (duplicate ids abort)
    pub fn add_line(&self, line: Line) {
        let mut state = self.state.write();
        let SandboxState { track, timeline } = &mut *state;
        let cells = track.add_line(line);
        timeline.notify_cells_changed(&cells, track);
    }

    pub fn remove_line(&self, id: LineId) -> Line {
        let mut state = self.state.write();
        let SandboxState { track, timeline } = &mut *state;
        let (line, cells) = track.remove_line(id);
        timeline.notify_cells_changed(&cells, track);
        line
    }

    pub fn move_line(&self, id: LineId, start: DVec2, end: DVec2) {
        let mut state = self.state.write();
        let SandboxState { track, timeline } = &mut *state;
        let cells = track.move_line(id, start, end);
        timeline.notify_cells_changed(&cells, track);
    }

    pub fn line(&self, id: LineId) -> Option<Line> {
        self.state.read().track.line(id).copied()
    }

    /// Restart the simulation from scratch (the track is untouched)
    pub fn reset(&self) {
        let mut state = self.state.write();
        let SandboxState { track, timeline } = &mut *state;
        timeline.reset(track.start_rider());
    }

    /// Background recompute toward `target`, releasing the write lock
    /// between chunks so interactive readers and editors interleave.
    /// Returns false when `cancelled` stopped it early.
    pub fn recompute_through(&self, target: usize, cancelled: &AtomicBool) -> bool {
        loop {
            if cancelled.load(Ordering::Relaxed) {
                return false;
            }
            let state = self.state.upgradable_read();
            if state.timeline.is_cached(target) {
                return true;
            }
            let chunk_end = target.min(state.timeline.watermark() + BACKGROUND_CHUNK - 1);
            let mut state = RwLockUpgradableReadGuard::upgrade(state);
            let SandboxState { track, timeline } = &mut *state;
            if !timeline.recompute_through(chunk_end, track, || cancelled.load(Ordering::Relaxed))
            {
                return false;
            }
        }
    }
}
