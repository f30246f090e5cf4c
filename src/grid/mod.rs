//! Spatial hash over track lines
//!
//! Lines are bucketed into fixed-size cells so the solver's per-point
//! collision query is a 3x3 neighborhood scan instead of a pass over the
//! whole track. Buckets hold whole `Line` values in descending-id order;
//! that ordering is what makes the solver's tie-break deterministic.

pub mod raster;

pub use raster::{CellPos, GridVersion, cell_at, cells_touched};

use std::collections::HashMap;

use glam::DVec2;

use crate::consts::PHYSICS_CELL_SIZE;
use crate::sim::Line;

/// Fixed-cell spatial hash of collidable lines
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    version: GridVersion,
    cell_size: f64,
    cells: HashMap<CellPos, Vec<Line>>,
}

impl SpatialGrid {
    /// Physics grid (14-unit cells) pinned to `version`
    pub fn new(version: GridVersion) -> Self {
        Self::with_cell_size(version, PHYSICS_CELL_SIZE)
    }

    /// Grid with a custom cell density, e.g.
    /// [`crate::consts::EDITOR_CELL_SIZE`] for editor-side queries
    pub fn with_cell_size(version: GridVersion, cell_size: f64) -> Self {
        assert!(cell_size > 0.0, "cell size must be positive");
        Self {
            version,
            cell_size,
            cells: HashMap::new(),
        }
    }

    pub fn version(&self) -> GridVersion {
        self.version
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Cells this line's footprint covers under the grid's pinned
    /// rasterizer version
    pub fn footprint(&self, line: &Line) -> Vec<CellPos> {
        cells_touched(line.start, line.end, self.cell_size, self.version)
    }

    /// Insert a line into every cell it rasterizes into. Returns the
    /// occupied cells. Inserting an id that is already present in a cell is
    /// a programming error and aborts.
    pub fn add(&mut self, line: &Line) -> Vec<CellPos> {
        let footprint = self.footprint(line);
        for &cell in &footprint {
            let bucket = self.cells.entry(cell).or_default();
            match bucket.binary_search_by(|probe| probe.id.cmp(&line.id).reverse()) {
                Ok(_) => panic!("line {} inserted twice into grid cell {cell:?}", line.id),
                Err(slot) => bucket.insert(slot, *line),
            }
        }
        footprint
    }

    /// Remove a line from every cell it occupies. Returns the vacated
    /// cells. Removing a line the grid does not hold is a programming
    /// error and aborts.
    pub fn remove(&mut self, line: &Line) -> Vec<CellPos> {
        let footprint = self.footprint(line);
        for &cell in &footprint {
            let Some(bucket) = self.cells.get_mut(&cell) else {
                panic!("line {} missing from grid cell {cell:?}", line.id);
            };
            match bucket.binary_search_by(|probe| probe.id.cmp(&line.id).reverse()) {
                Ok(slot) => {
                    bucket.remove(slot);
                }
                Err(_) => panic!("line {} missing from grid cell {cell:?}", line.id),
            }
            if bucket.is_empty() {
                self.cells.remove(&cell);
            }
        }
        footprint
    }

    /// Lines registered in one cell, descending by id
    pub fn cell_lines(&self, cell: CellPos) -> &[Line] {
        self.cells.get(&cell).map_or(&[], Vec::as_slice)
    }

    /// Lines in the 3x3 neighborhood of the cell containing `p`,
    /// descending by id, duplicates across overlapping cells suppressed
    pub fn lines_near(&self, p: DVec2) -> Vec<Line> {
        let center = cell_at(p, self.cell_size);
        let mut out: Vec<Line> = Vec::new();
        for dy in -1..=1 {
            for dx in -1..=1 {
                out.extend_from_slice(self.cell_lines(CellPos::new(center.x + dx, center.y + dy)));
            }
        }
        out.sort_unstable_by(|a, b| b.id.cmp(&a.id));
        out.dedup_by_key(|line| line.id);
        out
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
