//! Simulation objects and the game-side callbacks the loop drives

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use glam::DVec2;

use super::body::PhysicalBody;
use super::collider::Collider;
use super::grid::CellGrid;
use super::lock;

/// Cell coordinate an object is registered under: column, row, layer.
pub type CellCoord = (i64, i64, i32);

/// Failure stepping a single object; the loop logs it and moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepError {
    /// Hull has fewer than 3 vertices and cannot produce collision data.
    DegenerateHull,
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepError::DegenerateHull => write!(f, "degenerate hull, need 3+ vertices"),
        }
    }
}

impl std::error::Error for StepError {}

/// Dynamics plus geometry of one object.
#[derive(Debug, Clone)]
pub struct Body {
    pub physics: PhysicalBody,
    pub collider: Collider,
}

impl Body {
    pub fn new(physics: PhysicalBody, collider: Collider) -> Self {
        Self { physics, collider }
    }

    /// Re-derives the oriented outline and sample points from the
    /// current pose. Must run after every pose change before any
    /// collision test.
    pub fn update_collision_data(&mut self) -> Result<(), StepError> {
        if let Collider::Hull(hull) = &self.collider {
            if hull.is_degenerate() {
                return Err(StepError::DegenerateHull);
            }
        }
        self.collider
            .update(self.physics.pos(), self.physics.rotation());
        Ok(())
    }

    /// Does this body, as the mover, hit `other`?
    ///
    /// Asymmetric on purpose: a hull tests its own sample points against
    /// the other shape (after a bounding-radius rejection), a sensor
    /// triggers on center distance against its own radius alone.
    pub fn collides_with(&self, other: &Body) -> bool {
        let center = self.physics.center();
        let other_center = other.physics.center();
        match &self.collider {
            Collider::Hull(hull) => {
                let gap = center.distance(other_center);
                if gap > self.collider.bounding_radius() + other.collider.bounding_radius() {
                    return false;
                }
                hull.samples()
                    .iter()
                    .any(|&p| other.collider.contains(other.physics.pos(), p))
            }
            Collider::Sensor { radius } => center.distance(other_center) < *radius,
        }
    }

    /// First sample point standing on impassable ground, if any. Sensors
    /// ignore terrain entirely.
    pub fn terrain_hit(&self, grid: &CellGrid) -> Option<DVec2> {
        let layer = self.physics.layer();
        match &self.collider {
            Collider::Hull(hull) => hull
                .samples()
                .iter()
                .copied()
                .find(|&p| grid.classify(p, layer).impassable()),
            Collider::Sensor { .. } => None,
        }
    }
}

/// Game-side hooks the simulation loop invokes on an object. Steering,
/// scoring, effects and despawning live behind this trait, outside the
/// core. All hooks default to no-ops.
pub trait Behavior: Send {
    /// Runs first each tick; drive the body controls here.
    fn control(&mut self, body: &mut Body, dt: f64) {
        let _ = (body, dt);
    }

    /// The body ran into `other`. The bounce reaction follows for rigid
    /// movers, after this returns.
    fn on_object_hit(&mut self, body: &mut Body, other: &Arc<SimObject>) {
        let _ = (body, other);
    }

    /// The body hit impassable terrain at `point` (world units).
    fn on_terrain_hit(&mut self, body: &mut Body, point: DVec2) {
        let _ = (body, point);
    }
}

/// No-behavior marker for scenery objects.
pub struct Inert;

impl Behavior for Inert {}

/// One live object: body state plus behavior, shared between the loop,
/// the cell grid and game code via `Arc`.
pub struct SimObject {
    body: Mutex<Body>,
    behavior: Mutex<Box<dyn Behavior>>,
    alive: AtomicBool,
    cell: Mutex<Option<CellCoord>>,
}

impl SimObject {
    pub fn new(body: Body, behavior: Box<dyn Behavior>) -> Arc<Self> {
        Arc::new(Self {
            body: Mutex::new(body),
            behavior: Mutex::new(behavior),
            alive: AtomicBool::new(true),
            cell: Mutex::new(None),
        })
    }

    pub fn body(&self) -> MutexGuard<'_, Body> {
        lock(&self.body)
    }

    pub(crate) fn behavior(&self) -> MutexGuard<'_, Box<dyn Behavior>> {
        lock(&self.behavior)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Marks the object for removal; the loop prunes it on the next tick.
    pub fn kill(&self) {
        self.alive.store(false, Ordering::Relaxed);
    }

    pub(crate) fn cell(&self) -> MutexGuard<'_, Option<CellCoord>> {
        lock(&self.cell)
    }
}
