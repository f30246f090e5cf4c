//! Frame-memoizing timeline with watermark invalidation
//!
//! Every simulated tick is cached as a `FrameRecord`. The watermark is the
//! first frame index not guaranteed valid; requests below it are pure cache
//! hits, requests at or past it trigger a synchronous catch-up recompute.
//! Edits lower the watermark to the first frame they can actually change,
//! which is what keeps editing interactive on long tracks.

pub mod ledger;

pub use ledger::{HitTestLedger, LedgerDiff};

use glam::DVec2;
use log::{debug, trace};

use crate::consts::{DEFAULT_ZOOM, SOLVER_ITERATIONS};
use crate::grid::CellPos;
use crate::sim::{LineId, Rider};
use crate::track::Track;

/// Frames between cooperative cancellation checks during a recompute
const CANCEL_CHECK_INTERVAL: usize = 256;

/// One cached simulation frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRecord {
    pub rider: Rider,
    /// Line id of the active zoom trigger, -1 when none
    pub active_trigger_id: i32,
    /// Frame at which the active trigger fired, -1 when none
    pub trigger_activation_frame: i32,
    pub zoom: f32,
}

impl FrameRecord {
    fn start(rider: Rider) -> Self {
        Self {
            rider,
            active_trigger_id: -1,
            trigger_activation_frame: -1,
            zoom: DEFAULT_ZOOM,
        }
    }
}

/// Lazily extended cache of simulated frames
#[derive(Debug)]
pub struct Timeline {
    frames: Vec<FrameRecord>,
    /// First frame index not guaranteed correct. Frame 0 is the start pose
    /// and is never invalidated, so this is always at least 1.
    watermark: usize,
    ledger: HitTestLedger,
}

impl Timeline {
    pub fn new(start_rider: Rider) -> Self {
        Self {
            frames: vec![FrameRecord::start(start_rider)],
            watermark: 1,
            ledger: HitTestLedger::new(),
        }
    }

    /// Drop all history and restart from a new start pose
    pub fn reset(&mut self, start_rider: Rider) {
        debug!("timeline reset, {} cached frames dropped", self.frames.len());
        self.frames.clear();
        self.frames.push(FrameRecord::start(start_rider));
        self.watermark = 1;
        self.ledger = HitTestLedger::new();
    }

    /// Number of cached frame records (valid or stale)
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn watermark(&self) -> usize {
        self.watermark
    }

    /// Whether `frame` can be served without recomputation
    pub fn is_cached(&self, frame: usize) -> bool {
        frame < self.watermark
    }

    /// Cached record, if valid. Never triggers recomputation.
    pub fn cached_frame(&self, frame: usize) -> Option<FrameRecord> {
        self.is_cached(frame).then(|| self.frames[frame])
    }

    /// The record for `frame`, recomputing the invalid span first if
    /// needed. A request past the simulated history is not an error; it is
    /// what extends the history.
    pub fn get_frame(&mut self, frame: usize, track: &Track) -> FrameRecord {
        if !self.is_cached(frame) {
            let done = self.recompute_through(frame, track, || false);
            debug_assert!(done, "uncancellable recompute always completes");
        }
        self.frames[frame]
    }

    /// Recompute every frame from the watermark through `target`,
    /// checking `cancelled` every few hundred frames. Returns whether the
    /// target was reached. A cancelled recompute is not an error: records
    /// are only ever written whole, and the watermark stays consistent for
    /// whoever resumes.
    pub fn recompute_through(
        &mut self,
        target: usize,
        track: &Track,
        cancelled: impl Fn() -> bool,
    ) -> bool {
        if self.is_cached(target) {
            return true;
        }
        let first = self.watermark;
        for (count, frame) in (first..=target).enumerate() {
            if count > 0 && count % CANCEL_CHECK_INTERVAL == 0 && cancelled() {
                debug!(
                    "recompute cancelled at frame {frame} (target {target}), watermark {}",
                    self.watermark
                );
                return false;
            }
            let (record, hits) = self.simulate_frame(frame, track);
            if frame < self.frames.len() {
                self.frames[frame] = record;
            } else {
                self.frames.push(record);
            }
            self.watermark = frame + 1;
            self.ledger.record_frame(frame, &hits);
            trace!("frame {frame} computed, {} hits", hits.len());
        }
        true
    }

    /// Simulate frame `frame` from its predecessor under the current track
    fn simulate_frame(&self, frame: usize, track: &Track) -> (FrameRecord, Vec<LineId>) {
        debug_assert!(frame >= 1, "frame 0 is the start pose, never simulated");
        Self::advance(&self.frames[frame - 1], frame, track)
    }

    /// Pure step: previous record to next record under the current grid
    fn advance(prev: &FrameRecord, frame: usize, track: &Track) -> (FrameRecord, Vec<LineId>) {
        let (rider, hits) = prev
            .rider
            .simulate(track.grid(), track.bones(), SOLVER_ITERATIONS);

        let mut active = prev.active_trigger_id;
        let mut activation = prev.trigger_activation_frame;
        // Highest-id trigger line touched this tick takes over
        for &id in hits.iter().rev() {
            if id == active {
                break;
            }
            if track.line(id).is_some_and(|line| line.trigger.is_some()) {
                active = id;
                activation = frame as i32;
                break;
            }
        }

        let mut zoom = prev.zoom;
        if active >= 0 {
            match track.line(active).and_then(|line| line.trigger) {
                Some(trigger) => {
                    let elapsed = frame as i32 - activation;
                    let remaining = trigger.frames - elapsed;
                    if remaining <= 0 {
                        zoom = trigger.target_zoom;
                    } else {
                        zoom += (trigger.target_zoom - zoom) / remaining as f32;
                    }
                }
                // The trigger line no longer exists; the channel goes dormant
                None => {
                    active = -1;
                    activation = -1;
                }
            }
        }

        let record = FrameRecord {
            rider,
            active_trigger_id: active,
            trigger_activation_frame: activation,
            zoom,
        };
        (record, hits)
    }

    /// React to an edit whose grid-cell delta is `cells`. Scans only the
    /// valid cached frames whose physics bounds overlap a changed cell,
    /// re-simulates those candidates against the current grid, and lowers
    /// the watermark to the first frame that actually differs. An edit
    /// that changes no frame is provably cosmetic and costs no recompute.
    pub fn notify_cells_changed(&mut self, cells: &[CellPos], track: &Track) {
        if cells.is_empty() {
            return;
        }
        let cell_size = track.grid().cell_size();
        for frame in 1..self.watermark {
            if !self.step_overlaps_cells(frame, cells, cell_size) {
                continue;
            }
            let (record, _) = self.simulate_frame(frame, track);
            if record != self.frames[frame] {
                debug!(
                    "edit invalidates frame {frame} (watermark was {})",
                    self.watermark
                );
                self.set_watermark(frame);
                return;
            }
        }
        debug!("edit is cosmetic; watermark stays at {}", self.watermark);
    }

    /// React to an edit described only by its bounding segment, for
    /// callers that cannot produce an exact cell delta. Conservative:
    /// every cell the segment rasterizes into counts as changed, and the
    /// re-simulation comparison still decides whether anything invalidates.
    pub fn notify_edit(&mut self, from: DVec2, to: DVec2, track: &Track) {
        let grid = track.grid();
        let cells = crate::grid::cells_touched(from, to, grid.cell_size(), grid.version());
        self.notify_cells_changed(&cells, track);
    }

    /// Whether the step producing `frame` could have read any of `cells`.
    /// The rider bounds of both endpoints are inflated by one cell for the
    /// 3x3 collision neighborhood and one more for intra-tick travel.
    fn step_overlaps_cells(&self, frame: usize, cells: &[CellPos], cell_size: f64) -> bool {
        let (amin, amax) = self.frames[frame - 1].rider.bounds();
        let (bmin, bmax) = self.frames[frame].rider.bounds();
        let margin = DVec2::splat(2.0 * cell_size);
        let min = amin.min(bmin) - margin;
        let max = amax.max(bmax) + margin;
        cells.iter().any(|cell| {
            let cmin = DVec2::new(f64::from(cell.x) * cell_size, f64::from(cell.y) * cell_size);
            let cmax = cmin + DVec2::splat(cell_size);
            cmin.x <= max.x && cmax.x >= min.x && cmin.y <= max.y && cmax.y >= min.y
        })
    }

    fn set_watermark(&mut self, watermark: usize) {
        assert!(watermark >= 1, "frame 0 is never invalidated");
        self.watermark = watermark;
        self.ledger.invalidate_from(watermark);
    }

    /// Non-canonical sub-step preview: simulate `frame` from its cached
    /// predecessor with a reduced iteration count. Diagnostic only; the
    /// result is never cached and the canonical record is untouched.
    pub fn preview_frame(
        &self,
        frame: usize,
        track: &Track,
        iterations: usize,
    ) -> Option<FrameRecord> {
        assert!(
            iterations <= SOLVER_ITERATIONS,
            "preview cannot exceed the canonical iteration count"
        );
        if frame == 0 || !self.is_cached(frame - 1) {
            return None;
        }
        let prev = &self.frames[frame - 1];
        let (rider, _) = prev
            .rider
            .simulate(track.grid(), track.bones(), iterations);
        Some(FrameRecord { rider, ..*prev })
    }

    /// Move the scrub cursor, extending the history first so the ledger
    /// answers from fully recomputed frames
    pub fn set_scrub_frame(&mut self, frame: usize, track: &Track) -> LedgerDiff {
        self.get_frame(frame, track);
        self.ledger.set_scrub_frame(frame)
    }

    pub fn ledger(&self) -> &HitTestLedger {
        &self.ledger
    }
}
