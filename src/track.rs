//! Track ownership: lines, grid, rig
//!
//! A `Track` lives for one editing session. Every mutation keeps the
//! spatial grid synchronized and reports exactly which physics cells
//! changed contents, which is the invalidation signal the timeline consumes.

use std::collections::BTreeMap;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::grid::{CellPos, GridVersion, SpatialGrid};
use crate::sim::{Bone, Line, LineId, LineKind, Rider, Rig};

/// Everything an external persistence collaborator needs to rebuild a track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackBlueprint {
    pub lines: Vec<Line>,
    pub grid_version: GridVersion,
    pub start_offset: DVec2,
}

/// The editable line set plus the physics structures derived from it
#[derive(Debug, Clone)]
pub struct Track {
    lines: BTreeMap<LineId, Line>,
    grid: SpatialGrid,
    rig: Rig,
    start_offset: DVec2,
    next_id: LineId,
}

impl Track {
    pub fn new(version: GridVersion, start_offset: DVec2) -> Self {
        Self {
            lines: BTreeMap::new(),
            grid: SpatialGrid::new(version),
            rig: Rig::default_rig(),
            start_offset,
            next_id: 1,
        }
    }

    /// Rebuild a track from persisted parts. Duplicate line ids abort.
    pub fn from_blueprint(blueprint: &TrackBlueprint) -> Self {
        let mut track = Self::new(blueprint.grid_version, blueprint.start_offset);
        for line in &blueprint.lines {
            track.add_line(*line);
        }
        track
    }

    pub fn blueprint(&self) -> TrackBlueprint {
        TrackBlueprint {
            lines: self.lines.values().copied().collect(),
            grid_version: self.grid.version(),
            start_offset: self.start_offset,
        }
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn version(&self) -> GridVersion {
        self.grid.version()
    }

    pub fn bones(&self) -> &[Bone] {
        self.rig.bones()
    }

    pub fn start_offset(&self) -> DVec2 {
        self.start_offset
    }

    /// Fresh rider in the rig's start pose at this track's offset
    pub fn start_rider(&self) -> Rider {
        Rider::at_start(&self.rig, self.start_offset)
    }

    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.lines.get(&id)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.lines.values()
    }

    /// Allocate the next free id and add a line with it
    pub fn create_line(&mut self, start: DVec2, end: DVec2, kind: LineKind) -> (LineId, Vec<CellPos>) {
        let id = self.next_id;
        let cells = self.add_line(Line::new(id, start, end, kind));
        (id, cells)
    }

    /// Insert a line, updating the grid synchronously. Returns the physics
    /// cells whose contents changed (empty for scenery). A duplicate id is
    /// a programming error and aborts.
    pub fn add_line(&mut self, line: Line) -> Vec<CellPos> {
        assert!(
            !self.lines.contains_key(&line.id),
            "duplicate line id {}",
            line.id
        );
        let cells = if line.collides() {
            self.grid.add(&line)
        } else {
            Vec::new()
        };
        self.lines.insert(line.id, line);
        self.next_id = self.next_id.max(line.id + 1);
        cells
    }

    /// Remove a line. Returns it plus the physics cells whose contents
    /// changed. An unknown id is a programming error and aborts.
    pub fn remove_line(&mut self, id: LineId) -> (Line, Vec<CellPos>) {
        let Some(line) = self.lines.remove(&id) else {
            panic!("removing unknown line id {id}");
        };
        let cells = if line.collides() {
            self.grid.remove(&line)
        } else {
            Vec::new()
        };
        (line, cells)
    }

    /// Move a line's endpoints. Returns the union of the cells it vacated
    /// and the cells it now occupies.
    pub fn move_line(&mut self, id: LineId, start: DVec2, end: DVec2) -> Vec<CellPos> {
        let (mut line, mut cells) = self.remove_line(id);
        line.start = start;
        line.end = end;
        cells.extend(self.add_line(line));
        cells.sort_unstable();
        cells.dedup();
        cells
    }

    /// Editor query: ids of lines whose bounds overlap the given region
    pub fn lines_in_region(&self, min: DVec2, max: DVec2) -> Vec<LineId> {
        self.lines
            .values()
            .filter(|line| {
                let (lmin, lmax) = line.bounds();
                lmin.x <= max.x && lmax.x >= min.x && lmin.y <= max.y && lmax.y >= min.y
            })
            .map(|line| line.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(id: LineId) -> Line {
        Line::new(
            id,
            DVec2::new(-50.0, 20.0),
            DVec2::new(50.0, 20.0),
            LineKind::Standard,
        )
    }

    #[test]
    fn add_reports_the_rasterized_cells() {
        let mut track = Track::new(GridVersion::V62, DVec2::ZERO);
        let cells = track.add_line(flat(1));
        assert_eq!(cells.len(), 8);
        assert_eq!(track.line_count(), 1);
    }

    #[test]
    fn scenery_changes_no_physics_cells() {
        let mut track = Track::new(GridVersion::V62, DVec2::ZERO);
        let line = Line::new(
            1,
            DVec2::new(-50.0, 20.0),
            DVec2::new(50.0, 20.0),
            LineKind::Scenery,
        );
        assert!(track.add_line(line).is_empty());
        assert!(track.grid().is_empty());
        let (_, cells) = track.remove_line(1);
        assert!(cells.is_empty());
    }

    #[test]
    fn move_reports_old_and_new_cells() {
        let mut track = Track::new(GridVersion::V62, DVec2::ZERO);
        track.add_line(flat(1));
        let cells = track.move_line(1, DVec2::new(-50.0, 48.0), DVec2::new(50.0, 48.0));
        // Old row y=1 and new row y=3, same eight columns each
        assert_eq!(cells.len(), 16);
        assert!(cells.iter().any(|c| c.y == 1));
        assert!(cells.iter().any(|c| c.y == 3));
    }

    #[test]
    #[should_panic(expected = "duplicate line id")]
    fn duplicate_id_aborts() {
        let mut track = Track::new(GridVersion::V62, DVec2::ZERO);
        track.add_line(flat(4));
        track.add_line(flat(4));
    }

    #[test]
    #[should_panic(expected = "unknown line id")]
    fn removing_unknown_id_aborts() {
        let mut track = Track::new(GridVersion::V62, DVec2::ZERO);
        track.remove_line(12);
    }

    #[test]
    fn create_line_allocates_increasing_ids() {
        let mut track = Track::new(GridVersion::V62, DVec2::ZERO);
        let (a, _) = track.create_line(DVec2::ZERO, DVec2::new(10.0, 0.0), LineKind::Standard);
        track.add_line(flat(10));
        let (b, _) = track.create_line(DVec2::ZERO, DVec2::new(10.0, 5.0), LineKind::Standard);
        assert_eq!(a, 1);
        assert_eq!(b, 11, "allocation must skip past explicitly added ids");
    }

    #[test]
    fn blueprint_round_trips_the_line_set() {
        let mut track = Track::new(GridVersion::V61, DVec2::new(4.0, -2.0));
        track.add_line(flat(1));
        track.add_line(flat(2).inverted());
        let rebuilt = Track::from_blueprint(&track.blueprint());
        assert_eq!(rebuilt.version(), GridVersion::V61);
        assert_eq!(rebuilt.start_offset(), DVec2::new(4.0, -2.0));
        assert_eq!(rebuilt.line_count(), 2);
        assert_eq!(rebuilt.line(2), track.line(2));
        assert_eq!(
            rebuilt.grid().footprint(track.line(1).unwrap()),
            track.grid().footprint(track.line(1).unwrap()),
        );
    }

    #[test]
    fn region_query_finds_overlapping_lines() {
        let mut track = Track::new(GridVersion::V62, DVec2::ZERO);
        track.add_line(flat(1));
        track.add_line(Line::new(
            2,
            DVec2::new(300.0, 0.0),
            DVec2::new(340.0, 10.0),
            LineKind::Standard,
        ));
        let ids = track.lines_in_region(DVec2::new(-10.0, 15.0), DVec2::new(10.0, 25.0));
        assert_eq!(ids, vec![1]);
    }
}
