//! First-hit bookkeeping for scrub-position diffs
//!
//! The renderer recolors lines the rider has already touched as of the
//! scrub position. Rather than handing it the full touched set every move,
//! the ledger tracks what has been reported and returns only the delta.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::sim::LineId;

/// Line ids whose touched-status changed after a scrub move
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerDiff {
    /// Newly touched as of the new scrub frame
    pub touched: Vec<LineId>,
    /// No longer touched (their first hit is now in the future)
    pub released: Vec<LineId>,
}

impl LedgerDiff {
    pub fn is_empty(&self) -> bool {
        self.touched.is_empty() && self.released.is_empty()
    }
}

/// Maps each line id to the earliest frame the solver reported contact
#[derive(Debug, Clone, Default)]
pub struct HitTestLedger {
    first_hit: HashMap<LineId, usize>,
    by_frame: BTreeMap<usize, Vec<LineId>>,
    /// Ids currently reported to the renderer as touched
    visible: HashSet<LineId>,
    scrub: usize,
}

impl HitTestLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the hits of a freshly simulated frame. Only a line's first
    /// hit is remembered; later contacts change nothing.
    pub fn record_frame(&mut self, frame: usize, hits: &[LineId]) {
        for &id in hits {
            if !self.first_hit.contains_key(&id) {
                self.first_hit.insert(id, frame);
                self.by_frame.entry(frame).or_default().push(id);
            }
        }
    }

    pub fn first_hit_frame(&self, id: LineId) -> Option<usize> {
        self.first_hit.get(&id).copied()
    }

    /// Drop every entry derived from frames at or past the new watermark.
    /// Must run before any ledger query once the timeline invalidates, so
    /// stale first-hit frames can never be observed.
    pub fn invalidate_from(&mut self, watermark: usize) {
        let stale: Vec<usize> = self.by_frame.range(watermark..).map(|(&f, _)| f).collect();
        for frame in stale {
            for id in self.by_frame.remove(&frame).into_iter().flatten() {
                self.first_hit.remove(&id);
            }
        }
    }

    pub fn scrub_frame(&self) -> usize {
        self.scrub
    }

    /// Move the scrub position and return only the ids whose touched
    /// status changed. The reported set is reconciled against what was
    /// previously returned, so recomputation that rewrote first-hit frames
    /// is reflected on the next call.
    pub fn set_scrub_frame(&mut self, frame: usize) -> LedgerDiff {
        let mut current: HashSet<LineId> = HashSet::new();
        for ids in self.by_frame.range(..=frame).map(|(_, ids)| ids) {
            current.extend(ids);
        }
        let mut touched: Vec<LineId> = current.difference(&self.visible).copied().collect();
        let mut released: Vec<LineId> = self.visible.difference(&current).copied().collect();
        touched.sort_unstable();
        released.sort_unstable();
        self.visible = current;
        self.scrub = frame;
        LedgerDiff { touched, released }
    }
}
