//! Terrain cell grid shared by the render and simulation sides
//!
//! One world unit is one cell is `CELL_PIXELS` raster pixels. Every cell
//! guards its own resident and overlay lists, so the renderer and the
//! tick loop only contend when they touch the same cell; reads clone the
//! list under the lock and iterate the snapshot.

use std::sync::{Arc, Mutex};

use glam::DVec2;

use crate::consts::CELL_PIXELS;
use crate::terrain::{GroundClass, GroundSource};

use super::lock;
use super::object::{Body, CellCoord, SimObject};

/// One grid cell: resident objects, render overlays and the transition
/// flags computed from its pixels at construction.
pub struct Cell {
    residents: Mutex<Vec<Arc<SimObject>>>,
    overlays: Mutex<Vec<u64>>,
    has_up: bool,
    has_down: bool,
}

impl Cell {
    fn new(has_up: bool, has_down: bool) -> Self {
        Self {
            residents: Mutex::new(Vec::new()),
            overlays: Mutex::new(Vec::new()),
            has_up,
            has_down,
        }
    }

    /// Any pixel of this cell leads a layer up.
    pub fn has_up(&self) -> bool {
        self.has_up
    }

    /// Any pixel of this cell leads a layer down.
    pub fn has_down(&self) -> bool {
        self.has_down
    }

    /// Snapshot of the resident list.
    pub fn residents(&self) -> Vec<Arc<SimObject>> {
        lock(&self.residents).clone()
    }

    /// First rigid resident the moving body hits, skipping the mover
    /// itself. Works on a snapshot so callbacks may add or remove
    /// residents without deadlocking.
    pub fn collision(&self, body: &Body, mover: &Arc<SimObject>) -> Option<Arc<SimObject>> {
        for other in self.residents() {
            if Arc::ptr_eq(&other, mover) {
                continue;
            }
            let hit = {
                let other_body = other.body();
                other_body.collider.is_rigid() && body.collides_with(&other_body)
            };
            if hit {
                return Some(other);
            }
        }
        None
    }

    /// Render overlay handles (decals, skid marks) placed on this cell.
    pub fn overlays(&self) -> Vec<u64> {
        lock(&self.overlays).clone()
    }

    pub fn add_overlay(&self, handle: u64) {
        lock(&self.overlays).push(handle);
    }

    pub fn remove_overlay(&self, handle: u64) {
        let mut overlays = lock(&self.overlays);
        if let Some(i) = overlays.iter().position(|&h| h == handle) {
            overlays.remove(i);
        }
    }
}

/// Width x height x layers grid over per-layer classification sources.
pub struct CellGrid {
    width: i64,
    height: i64,
    grounds: Vec<Box<dyn GroundSource + Send + Sync>>,
    cells: Vec<Cell>,
}

impl CellGrid {
    /// Builds the grid, scanning each cell's pixels once for transition
    /// markers.
    pub fn new(width: i64, height: i64, grounds: Vec<Box<dyn GroundSource + Send + Sync>>) -> Self {
        let mut cells = Vec::with_capacity((width * height) as usize * grounds.len());
        for ground in &grounds {
            for cy in 0..height {
                for cx in 0..width {
                    let mut has_up = false;
                    let mut has_down = false;
                    for py in cy * CELL_PIXELS..(cy + 1) * CELL_PIXELS {
                        for px in cx * CELL_PIXELS..(cx + 1) * CELL_PIXELS {
                            match ground.classify(px, py) {
                                GroundClass::TransitionUp => has_up = true,
                                GroundClass::TransitionDown => has_down = true,
                                _ => {}
                            }
                        }
                    }
                    cells.push(Cell::new(has_up, has_down));
                }
            }
        }
        Self {
            width,
            height,
            grounds,
            cells,
        }
    }

    pub fn width(&self) -> i64 {
        self.width
    }

    pub fn height(&self) -> i64 {
        self.height
    }

    pub fn layers(&self) -> usize {
        self.grounds.len()
    }

    /// Ground class under a world-space point. Anything outside the grid,
    /// or on a layer that does not exist, is `Wall`.
    pub fn classify(&self, point: DVec2, layer: i32) -> GroundClass {
        let Some(ground) = usize::try_from(layer).ok().and_then(|l| self.grounds.get(l)) else {
            return GroundClass::Wall;
        };
        let px = (point.x * CELL_PIXELS as f64).floor() as i64;
        let py = (point.y * CELL_PIXELS as f64).floor() as i64;
        ground.classify(px, py)
    }

    pub fn cell(&self, coord: CellCoord) -> Option<&Cell> {
        let (cx, cy, layer) = coord;
        let layer = usize::try_from(layer).ok()?;
        if cx < 0 || cx >= self.width || cy < 0 || cy >= self.height || layer >= self.grounds.len()
        {
            return None;
        }
        let index = layer as i64 * self.width * self.height + cy * self.width + cx;
        Some(&self.cells[index as usize])
    }

    /// Cell under a world-space point on the given layer.
    pub fn cell_at(&self, point: DVec2, layer: i32) -> Option<&Cell> {
        self.cell((point.x.floor() as i64, point.y.floor() as i64, layer))
    }

    /// Registers an object in a cell; false when the coordinate is off
    /// the grid (the object then simply has no cell until it returns).
    pub fn add_resident(&self, coord: CellCoord, obj: Arc<SimObject>) -> bool {
        match self.cell(coord) {
            Some(cell) => {
                lock(&cell.residents).push(obj);
                true
            }
            None => false,
        }
    }

    pub fn remove_resident(&self, coord: CellCoord, obj: &Arc<SimObject>) {
        if let Some(cell) = self.cell(coord) {
            let mut residents = lock(&cell.residents);
            if let Some(i) = residents.iter().position(|o| Arc::ptr_eq(o, obj)) {
                residents.remove(i);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::GroundBitmap;

    fn one_cell_grid(bitmap: GroundBitmap) -> CellGrid {
        CellGrid::new(1, 1, vec![Box::new(bitmap)])
    }

    #[test]
    fn test_classify_scales_world_to_pixels() {
        let mut bitmap = GroundBitmap::new(CELL_PIXELS, CELL_PIXELS);
        bitmap.set(64, 64, GroundClass::Ice);
        let grid = one_cell_grid(bitmap);
        assert_eq!(grid.classify(DVec2::splat(0.5), 0), GroundClass::Ice);
        assert_eq!(grid.classify(DVec2::splat(0.25), 0), GroundClass::Open);
    }

    #[test]
    fn test_outside_and_bad_layer_are_wall() {
        let grid = one_cell_grid(GroundBitmap::new(CELL_PIXELS, CELL_PIXELS));
        assert_eq!(grid.classify(DVec2::new(-0.5, 0.5), 0), GroundClass::Wall);
        assert_eq!(grid.classify(DVec2::splat(0.5), 1), GroundClass::Wall);
        assert_eq!(grid.classify(DVec2::splat(0.5), -1), GroundClass::Wall);
    }

    #[test]
    fn test_transition_flags_from_pixels() {
        let mut bitmap = GroundBitmap::new(CELL_PIXELS, CELL_PIXELS);
        bitmap.set(10, 10, GroundClass::TransitionUp);
        let grid = one_cell_grid(bitmap);
        let cell = grid.cell((0, 0, 0)).unwrap();
        assert!(cell.has_up());
        assert!(!cell.has_down());
    }

    #[test]
    fn test_resident_add_remove_by_identity() {
        use super::super::body::{BodyProfile, PhysicalBody};
        use super::super::collider::Collider;
        use super::super::object::{Body, Inert};

        let grid = one_cell_grid(GroundBitmap::new(CELL_PIXELS, CELL_PIXELS));
        let body = Body::new(
            PhysicalBody::new(BodyProfile::default(), DVec2::ZERO),
            Collider::Sensor { radius: 0.1 },
        );
        let obj = SimObject::new(body, Box::new(Inert));

        assert!(grid.add_resident((0, 0, 0), obj.clone()));
        assert_eq!(grid.cell((0, 0, 0)).unwrap().residents().len(), 1);
        grid.remove_resident((0, 0, 0), &obj);
        assert!(grid.cell((0, 0, 0)).unwrap().residents().is_empty());
        // off-grid registration is refused, not an error
        assert!(!grid.add_resident((5, 0, 0), obj));
    }
}
