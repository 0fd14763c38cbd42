//! Shared world state: the cell grid plus the live object set

use std::sync::{Arc, Mutex};

use super::clock::GameTimer;
use super::grid::CellGrid;
use super::lock;
use super::object::{CellCoord, SimObject};

/// Everything the tick loop, behaviors and the render side share. Built
/// by the level loader and handed to `SimLoop::spawn`; nothing in here is
/// global.
pub struct World {
    pub grid: CellGrid,
    objects: Mutex<Vec<Arc<SimObject>>>,
    pub timer: Mutex<GameTimer>,
}

impl World {
    pub fn new(grid: CellGrid) -> Self {
        Self {
            grid,
            objects: Mutex::new(Vec::new()),
            timer: Mutex::new(GameTimer::start()),
        }
    }

    /// Adds an object to the world and registers it in the cell under
    /// its body center.
    pub fn spawn(&self, obj: Arc<SimObject>) {
        lock(&self.objects).push(obj.clone());
        self.reindex(&obj);
    }

    /// Snapshot of the live object list.
    pub fn objects(&self) -> Vec<Arc<SimObject>> {
        lock(&self.objects).clone()
    }

    /// Drops dead objects (deregistering their cells) and returns a
    /// snapshot of the survivors, so tick iteration never holds the
    /// master lock.
    pub(crate) fn prune_and_snapshot(&self) -> Vec<Arc<SimObject>> {
        let mut objects = lock(&self.objects);
        objects.retain(|obj| {
            if obj.is_alive() {
                return true;
            }
            if let Some(coord) = obj.cell().take() {
                self.grid.remove_resident(coord, obj);
            }
            false
        });
        objects.clone()
    }

    /// Moves the object to the cell under its current body center. Off
    /// the grid means no cell; the object keeps simulating and re-enters
    /// the index when it comes back.
    pub fn reindex(&self, obj: &Arc<SimObject>) {
        let (center, layer) = {
            let body = obj.body();
            (body.physics.center(), body.physics.layer())
        };
        let target: CellCoord = (center.x.floor() as i64, center.y.floor() as i64, layer);

        let mut current = obj.cell();
        if *current == Some(target) {
            return;
        }
        if let Some(old) = current.take() {
            self.grid.remove_resident(old, obj);
        }
        if self.grid.add_resident(target, obj.clone()) {
            *current = Some(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::body::{BodyProfile, PhysicalBody};
    use super::super::collider::Collider;
    use super::super::object::{Body, Inert};
    use crate::consts::CELL_PIXELS;
    use crate::terrain::GroundBitmap;
    use glam::DVec2;

    fn world_3x1() -> World {
        let bitmap = GroundBitmap::new(3 * CELL_PIXELS, CELL_PIXELS);
        World::new(CellGrid::new(3, 1, vec![Box::new(bitmap)]))
    }

    fn sensor_at(pos: DVec2) -> Arc<SimObject> {
        let mut physics = PhysicalBody::new(BodyProfile::default(), DVec2::ZERO);
        physics.set_pos(pos);
        SimObject::new(
            Body::new(physics, Collider::Sensor { radius: 0.1 }),
            Box::new(Inert),
        )
    }

    #[test]
    fn test_spawn_registers_cell() {
        let world = world_3x1();
        let obj = sensor_at(DVec2::new(1.5, 0.5));
        world.spawn(obj.clone());
        assert_eq!(*obj.cell(), Some((1, 0, 0)));
        assert_eq!(world.grid.cell((1, 0, 0)).unwrap().residents().len(), 1);
    }

    #[test]
    fn test_reindex_moves_between_cells() {
        let world = world_3x1();
        let obj = sensor_at(DVec2::new(0.5, 0.5));
        world.spawn(obj.clone());

        obj.body().physics.set_pos(DVec2::new(2.5, 0.5));
        world.reindex(&obj);
        assert_eq!(*obj.cell(), Some((2, 0, 0)));
        assert!(world.grid.cell((0, 0, 0)).unwrap().residents().is_empty());
        assert_eq!(world.grid.cell((2, 0, 0)).unwrap().residents().len(), 1);
    }

    #[test]
    fn test_off_grid_object_keeps_no_cell() {
        let world = world_3x1();
        let obj = sensor_at(DVec2::new(-5.0, 0.5));
        world.spawn(obj.clone());
        assert_eq!(*obj.cell(), None);
    }

    #[test]
    fn test_prune_drops_dead_and_their_cells() {
        let world = world_3x1();
        let keep = sensor_at(DVec2::new(0.5, 0.5));
        let drop = sensor_at(DVec2::new(1.5, 0.5));
        world.spawn(keep.clone());
        world.spawn(drop.clone());

        drop.kill();
        let snapshot = world.prune_and_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(Arc::ptr_eq(&snapshot[0], &keep));
        assert!(world.grid.cell((1, 0, 0)).unwrap().residents().is_empty());
        assert_eq!(world.objects().len(), 1);
    }
}
