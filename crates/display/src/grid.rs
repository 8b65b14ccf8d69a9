//! Grid Placer: non-overlapping placement of doodles on the display.
//!
//! The viewport is cut into square cells one footprint (image size plus
//! margin) wide. Free cells sit in a shuffled pool; placing a doodle pops
//! one. Occupants are kept in placement order so the oldest can be evicted
//! once `max_images` is reached.
//!
//! Two occupied cells never overlap because every occupant holds a distinct
//! cell of the current grid, and grid cells are exactly one footprint apart.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Fraction of a doodle that must be on screen before it counts as visible.
pub const VISIBILITY_THRESHOLD: f64 = 0.1;

/// Length of one float animation loop.
pub const FLOAT_PERIOD: Duration = Duration::from_secs(8);

/// Top-left corner of a grid cell, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub x: u32,
    pub y: u32,
}

impl Cell {
    pub const ORIGIN: Cell = Cell { x: 0, y: 0 };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridConfig {
    /// Rendered doodle edge length in pixels.
    pub image_size: u32,
    /// Gap kept around each doodle.
    pub margin: u32,
    /// Most doodles on screen at once.
    pub max_images: usize,
}

impl GridConfig {
    pub fn footprint(&self) -> u32 {
        self.image_size.saturating_add(self.margin).max(1)
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            image_size: 250,
            margin: 30,
            max_images: 18,
        }
    }
}

pub type PlacementId = u64;

/// A doodle occupying a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub id: PlacementId,
    pub uri: String,
    pub cell: Cell,
    /// Set once the doodle first scrolls into view.
    pub visible: bool,
}

/// Outcome of [`GridPlacer::place`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placed {
    pub placement: Placement,
    /// Occupants removed to make room, oldest first.
    pub evicted: Vec<Placement>,
}

/// Outcome of [`GridPlacer::resize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reflow {
    /// Occupants whose cell fell outside the new grid and were moved.
    pub moved: Vec<Placement>,
    /// Occupants dropped because the new grid had no room for them.
    pub evicted: Vec<Placement>,
}

/// Every cell that fits entirely inside `viewport`, row by row.
pub fn compute_cells(viewport: Viewport, footprint: u32) -> Vec<Cell> {
    let footprint = footprint.max(1);
    let cols = viewport.width / footprint;
    let rows = viewport.height / footprint;

    (0..rows)
        .flat_map(|row| {
            (0..cols).map(move |col| Cell {
                x: col * footprint,
                y: row * footprint,
            })
        })
        .collect()
}

/// Fraction of a `size`-pixel doodle at `cell` that lies inside `viewport`.
pub fn intersection_ratio(cell: Cell, size: u32, viewport: Viewport) -> f64 {
    if size == 0 {
        return 0.0;
    }
    let overlap = |start: u32, limit: u32| -> u64 {
        let end = start.saturating_add(size).min(limit);
        u64::from(end.saturating_sub(start))
    };
    let visible = overlap(cell.x, viewport.width) * overlap(cell.y, viewport.height);
    visible as f64 / (u64::from(size) * u64::from(size)) as f64
}

/// Phase into the float loop at `since_epoch`.
///
/// Applied as a negative animation delay so every doodle floats in step
/// regardless of when it was placed.
pub fn float_offset(since_epoch: Duration) -> Duration {
    let period = FLOAT_PERIOD.as_millis();
    Duration::from_millis((since_epoch.as_millis() % period) as u64)
}

pub struct GridPlacer {
    config: GridConfig,
    viewport: Viewport,
    /// Free cells of the current grid, in random order.
    pool: Vec<Cell>,
    /// Placement order, oldest at the front.
    occupants: VecDeque<Placement>,
    next_id: PlacementId,
    rng: StdRng,
}

impl GridPlacer {
    pub fn new(config: GridConfig, viewport: Viewport) -> Self {
        Self::with_rng(config, viewport, StdRng::from_rng(&mut rand::rng()))
    }

    /// Deterministic placer for tests and replays.
    pub fn with_seed(config: GridConfig, viewport: Viewport, seed: u64) -> Self {
        Self::with_rng(config, viewport, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GridConfig, viewport: Viewport, rng: StdRng) -> Self {
        let config = GridConfig {
            max_images: config.max_images.max(1),
            ..config
        };
        let mut placer = Self {
            config,
            viewport,
            pool: Vec::new(),
            occupants: VecDeque::new(),
            next_id: 1,
            rng,
        };
        placer.rebuild_pool();
        placer
    }

    pub fn config(&self) -> GridConfig {
        self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Number of cells in the current grid.
    pub fn cell_count(&self) -> usize {
        compute_cells(self.viewport, self.config.footprint()).len()
    }

    pub fn free_cells(&self) -> usize {
        self.pool.len()
    }

    pub fn len(&self) -> usize {
        self.occupants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    /// Current occupants, oldest first.
    pub fn occupants(&self) -> impl Iterator<Item = &Placement> {
        self.occupants.iter()
    }

    pub fn get(&self, id: PlacementId) -> Option<&Placement> {
        self.occupants.iter().find(|p| p.id == id)
    }

    /// Put `uri` on the grid.
    ///
    /// Evicts the oldest occupant when at capacity. If the grid is smaller
    /// than `max_images` and has no free cell left, the oldest occupant
    /// also gives up its cell. Only a grid with no cells at all falls back
    /// to [`Cell::ORIGIN`].
    pub fn place(&mut self, uri: impl Into<String>) -> Placed {
        let mut evicted = Vec::new();

        if self.occupants.len() >= self.config.max_images {
            if let Some(oldest) = self.occupants.pop_front() {
                self.release(oldest.cell);
                evicted.push(oldest);
            }
        }

        let cell = match self.take_cell() {
            Some(cell) => cell,
            None => match self.occupants.pop_front() {
                Some(oldest) => {
                    let cell = oldest.cell;
                    evicted.push(oldest);
                    cell
                }
                None => {
                    tracing::warn!(
                        width = self.viewport.width,
                        height = self.viewport.height,
                        "Viewport smaller than one cell, placing at origin"
                    );
                    Cell::ORIGIN
                }
            },
        };

        let placement = Placement {
            id: self.next_id,
            uri: uri.into(),
            cell,
            visible: false,
        };
        self.next_id += 1;
        self.occupants.push_back(placement.clone());

        Placed { placement, evicted }
    }

    /// Recompute the grid for a new viewport.
    ///
    /// If the new grid holds fewer cells than there are occupants, the
    /// oldest are evicted until the rest fit. Survivors whose cell still
    /// exists stay put; the others move to free cells.
    pub fn resize(&mut self, viewport: Viewport) -> Reflow {
        self.viewport = viewport;
        let cells: HashSet<Cell> = compute_cells(viewport, self.config.footprint())
            .into_iter()
            .collect();

        let mut reflow = Reflow::default();
        while self.occupants.len() > cells.len() {
            match self.occupants.pop_front() {
                Some(oldest) => reflow.evicted.push(oldest),
                None => break,
            }
        }

        // Occupants keep their cell if it survived and nobody older holds it.
        let mut kept = HashSet::new();
        let mut displaced = Vec::new();
        for (index, placement) in self.occupants.iter().enumerate() {
            if !cells.contains(&placement.cell) || !kept.insert(placement.cell) {
                displaced.push(index);
            }
        }

        self.pool = cells.iter().filter(|c| !kept.contains(*c)).copied().collect();
        self.pool.sort_by_key(|c| (c.y, c.x));
        self.pool.shuffle(&mut self.rng);

        let mut dropped = HashSet::new();
        for index in displaced {
            let placement = &mut self.occupants[index];
            match self.pool.pop() {
                Some(cell) => {
                    placement.cell = cell;
                    reflow.moved.push(placement.clone());
                }
                None => {
                    dropped.insert(placement.id);
                    reflow.evicted.push(placement.clone());
                }
            }
        }
        self.occupants.retain(|p| !dropped.contains(&p.id));

        tracing::debug!(
            width = viewport.width,
            height = viewport.height,
            cells = cells.len(),
            moved = reflow.moved.len(),
            evicted = reflow.evicted.len(),
            "Grid recomputed"
        );
        reflow
    }

    /// Remove every occupant and reshuffle the full grid.
    pub fn reset(&mut self) -> Vec<Placement> {
        let cleared: Vec<Placement> = self.occupants.drain(..).collect();
        self.rebuild_pool();
        cleared
    }

    /// Record that placement `id` is `ratio` on screen.
    ///
    /// Returns `true` exactly once per placement: the first time the ratio
    /// reaches [`VISIBILITY_THRESHOLD`].
    pub fn mark_visible(&mut self, id: PlacementId, ratio: f64) -> bool {
        if ratio < VISIBILITY_THRESHOLD {
            return false;
        }
        match self.occupants.iter_mut().find(|p| p.id == id) {
            Some(p) if !p.visible => {
                p.visible = true;
                true
            }
            _ => false,
        }
    }

    /// Mark every occupant that its resting cell puts on screen.
    ///
    /// Returns the placements that just became visible.
    pub fn observe_visibility(&mut self) -> Vec<Placement> {
        let size = self.config.image_size;
        let viewport = self.viewport;
        self.occupants
            .iter_mut()
            .filter(|p| {
                !p.visible && intersection_ratio(p.cell, size, viewport) >= VISIBILITY_THRESHOLD
            })
            .map(|p| {
                p.visible = true;
                p.clone()
            })
            .collect()
    }

    fn take_cell(&mut self) -> Option<Cell> {
        if self.pool.is_empty() {
            self.rebuild_pool();
        }
        self.pool.pop()
    }

    /// Return a freed cell to the pool at a random position.
    fn release(&mut self, cell: Cell) {
        let in_grid = compute_cells(self.viewport, self.config.footprint()).contains(&cell);
        let occupied = self.occupants.iter().any(|p| p.cell == cell);
        if in_grid && !occupied && !self.pool.contains(&cell) {
            let at = self.rng.random_range(0..=self.pool.len());
            self.pool.insert(at, cell);
        }
    }

    /// All grid cells minus the occupied ones, shuffled.
    fn rebuild_pool(&mut self) {
        let occupied: HashSet<Cell> = self.occupants.iter().map(|p| p.cell).collect();
        self.pool = compute_cells(self.viewport, self.config.footprint())
            .into_iter()
            .filter(|c| !occupied.contains(c))
            .collect();
        self.pool.shuffle(&mut self.rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_images: usize) -> GridConfig {
        GridConfig {
            image_size: 250,
            margin: 30,
            max_images,
        }
    }

    const FULL_HD: Viewport = Viewport {
        width: 1920,
        height: 1080,
    };

    fn assert_no_overlap(placer: &GridPlacer) {
        let footprint = placer.config().footprint();
        let cells: Vec<Cell> = placer.occupants().map(|p| p.cell).collect();
        for (i, a) in cells.iter().enumerate() {
            for b in &cells[i + 1..] {
                assert!(
                    a.x.abs_diff(b.x) >= footprint || a.y.abs_diff(b.y) >= footprint,
                    "{a:?} overlaps {b:?}"
                );
            }
        }
    }

    #[test]
    fn cells_tile_the_viewport() {
        let cells = compute_cells(FULL_HD, 280);

        // 1920 / 280 = 6 cols, 1080 / 280 = 3 rows.
        assert_eq!(cells.len(), 18);
        assert_eq!(cells[0], Cell { x: 0, y: 0 });
        assert_eq!(cells[17], Cell { x: 1400, y: 560 });
    }

    #[test]
    fn tiny_viewport_has_no_cells() {
        assert!(compute_cells(Viewport { width: 100, height: 2000 }, 280).is_empty());
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut placer = GridPlacer::with_seed(config(3), FULL_HD, 7);

        for uri in ["d1", "d2", "d3"] {
            assert!(placer.place(uri).evicted.is_empty());
        }
        let placed = placer.place("d4");

        assert_eq!(placed.evicted.len(), 1);
        assert_eq!(placed.evicted[0].uri, "d1");
        let resident: Vec<&str> = placer.occupants().map(|p| p.uri.as_str()).collect();
        assert_eq!(resident, vec!["d2", "d3", "d4"]);
    }

    #[test]
    fn occupancy_never_exceeds_cap_and_cells_never_overlap() {
        let mut placer = GridPlacer::with_seed(config(10), FULL_HD, 42);

        for i in 0..200 {
            placer.place(format!("d{i}"));
            assert!(placer.len() <= 10);
            assert_no_overlap(&placer);
        }
    }

    #[test]
    fn full_grid_recycles_oldest_cell_without_overlap() {
        // 2 x 1 grid but a cap of 5.
        let viewport = Viewport {
            width: 600,
            height: 300,
        };
        let mut placer = GridPlacer::with_seed(config(5), viewport, 1);

        placer.place("a");
        placer.place("b");
        let placed = placer.place("c");

        assert_eq!(placed.evicted.len(), 1);
        assert_eq!(placed.evicted[0].uri, "a");
        assert_eq!(placer.len(), 2);
        assert_no_overlap(&placer);
    }

    #[test]
    fn zero_cell_grid_falls_back_to_origin() {
        let mut placer = GridPlacer::with_seed(config(3), Viewport { width: 10, height: 10 }, 3);

        let first = placer.place("a");
        let second = placer.place("b");

        assert_eq!(first.placement.cell, Cell::ORIGIN);
        assert_eq!(second.placement.cell, Cell::ORIGIN);
        // The origin is reused rather than stacked.
        assert_eq!(second.evicted[0].uri, "a");
        assert_eq!(placer.len(), 1);
    }

    #[test]
    fn shrinking_viewport_keeps_the_newest_occupants() {
        let mut placer = GridPlacer::with_seed(config(18), FULL_HD, 9);
        for i in 0..18 {
            placer.place(format!("d{i}"));
        }

        // 2 x 2 grid remains.
        let small = Viewport {
            width: 600,
            height: 600,
        };
        let reflow = placer.resize(small);

        assert_eq!(placer.len(), 4);
        let kept: Vec<&str> = placer.occupants().map(|p| p.uri.as_str()).collect();
        assert_eq!(kept, vec!["d14", "d15", "d16", "d17"]);
        let evicted: Vec<&str> = reflow.evicted.iter().map(|p| p.uri.as_str()).collect();
        assert_eq!(evicted, (0..14).map(|i| format!("d{i}")).collect::<Vec<_>>());
        let cells: HashSet<Cell> = compute_cells(small, 280).into_iter().collect();
        assert!(placer.occupants().all(|p| cells.contains(&p.cell)));
        assert_no_overlap(&placer);
    }

    #[test]
    fn growing_viewport_keeps_existing_cells() {
        let small = Viewport {
            width: 600,
            height: 600,
        };
        let mut placer = GridPlacer::with_seed(config(18), small, 5);
        placer.place("a");
        placer.place("b");
        let before: Vec<Cell> = placer.occupants().map(|p| p.cell).collect();

        let reflow = placer.resize(FULL_HD);

        assert!(reflow.moved.is_empty() && reflow.evicted.is_empty());
        let after: Vec<Cell> = placer.occupants().map(|p| p.cell).collect();
        assert_eq!(before, after);
        assert_eq!(placer.free_cells(), 16);
    }

    #[test]
    fn reset_clears_and_restores_full_pool() {
        let mut placer = GridPlacer::with_seed(config(18), FULL_HD, 11);
        placer.place("a");
        placer.place("b");

        let cleared = placer.reset();

        assert_eq!(cleared.len(), 2);
        assert!(placer.is_empty());
        assert_eq!(placer.free_cells(), 18);
    }

    #[test]
    fn visibility_fires_once_at_threshold() {
        let mut placer = GridPlacer::with_seed(config(3), FULL_HD, 2);
        let id = placer.place("a").placement.id;

        assert!(!placer.mark_visible(id, 0.05));
        assert!(placer.mark_visible(id, 0.1));
        assert!(!placer.mark_visible(id, 1.0));
        assert!(placer.get(id).unwrap().visible);
    }

    #[test]
    fn observe_visibility_reports_each_placement_once() {
        let mut placer = GridPlacer::with_seed(config(3), FULL_HD, 2);
        placer.place("a");
        placer.place("b");

        assert_eq!(placer.observe_visibility().len(), 2);
        assert!(placer.observe_visibility().is_empty());
    }

    #[test]
    fn intersection_ratio_clips_to_viewport() {
        let viewport = Viewport {
            width: 300,
            height: 300,
        };

        assert_eq!(intersection_ratio(Cell { x: 0, y: 0 }, 100, viewport), 1.0);
        assert_eq!(intersection_ratio(Cell { x: 250, y: 0 }, 100, viewport), 0.5);
        assert_eq!(intersection_ratio(Cell { x: 400, y: 0 }, 100, viewport), 0.0);
    }

    #[test]
    fn float_offset_wraps_every_period() {
        assert_eq!(float_offset(Duration::from_millis(8_500)), Duration::from_millis(500));
        assert_eq!(float_offset(Duration::from_secs(16)), Duration::ZERO);
    }
}
