//! Fixed-cadence simulation loop
//!
//! Runs on a dedicated thread over a shared `World`. Pause and resume go
//! through a condvar whose wait loop re-checks the predicate, so spurious
//! wakeups are harmless; shutdown is a cooperative flag checked once per
//! tick. A transient frozen mode (countdowns, cutscenes) keeps game time
//! and object bookkeeping running while every body holds still.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use super::clock::TickClock;
use super::lock;
use super::object::{Body, SimObject, StepError};
use super::world::World;
use crate::terrain::GroundClass;

struct Control {
    paused: Mutex<bool>,
    wake: Condvar,
    running: AtomicBool,
    frozen: AtomicBool,
}

/// Handle to the loop thread. Dropping without `shutdown` detaches the
/// thread; it keeps ticking until the process exits.
pub struct SimLoop {
    control: Arc<Control>,
    handle: Option<JoinHandle<()>>,
}

impl SimLoop {
    /// Spawns the loop over `world`, initially paused.
    pub fn spawn(world: Arc<World>) -> io::Result<Self> {
        let control = Arc::new(Control {
            paused: Mutex::new(true),
            wake: Condvar::new(),
            running: AtomicBool::new(true),
            frozen: AtomicBool::new(false),
        });
        let thread_control = control.clone();
        let handle = thread::Builder::new()
            .name("driftline-sim".into())
            .spawn(move || run(world, thread_control))?;
        Ok(Self {
            control,
            handle: Some(handle),
        })
    }

    pub fn pause(&self) {
        *lock(&self.control.paused) = true;
    }

    pub fn resume(&self) {
        *lock(&self.control.paused) = false;
        self.control.wake.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        *lock(&self.control.paused)
    }

    /// Frozen ticks advance game time and prune dead objects but skip
    /// control, integration and collision.
    pub fn set_frozen(&self, frozen: bool) {
        self.control.frozen.store(frozen, Ordering::Relaxed);
    }

    /// Asks the loop to exit and waits for the thread.
    pub fn shutdown(mut self) {
        self.control.running.store(false, Ordering::Relaxed);
        self.control.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(world: Arc<World>, control: Arc<Control>) {
    let mut clock = TickClock::start();
    log::info!("simulation loop up");
    loop {
        {
            let mut paused = lock(&control.paused);
            if *paused {
                // settle game time at the pause point, wait, re-anchor
                lock(&world.timer).update();
                while *paused && control.running.load(Ordering::Relaxed) {
                    paused = control
                        .wake
                        .wait(paused)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                lock(&world.timer).resume();
                clock.restart();
            }
        }
        if !control.running.load(Ordering::Relaxed) {
            break;
        }

        let dt = clock.pace();
        if dt > 1.0 {
            // measurement glitch, drop the tick rather than teleport
            continue;
        }
        lock(&world.timer).update();

        let frozen = control.frozen.load(Ordering::Relaxed);
        for obj in world.prune_and_snapshot() {
            if !obj.is_alive() {
                // killed by an earlier callback this tick
                continue;
            }
            if !frozen {
                if let Err(err) = step_object(&world, &obj, dt) {
                    log::error!("object skipped this tick: {err}");
                }
            }
            world.reindex(&obj);
        }
    }
    log::info!("simulation loop down");
}

/// Advances one object by one tick: controls, ground lookup, layer hop,
/// integration, then collision resolution with callbacks before bounces.
pub(crate) fn step_object(world: &World, obj: &Arc<SimObject>, dt: f64) -> Result<(), StepError> {
    let mut body = obj.body();
    {
        let mut behavior = obj.behavior();
        behavior.control(&mut body, dt);
    }

    let ground = world.grid.classify(body.physics.center(), body.physics.layer());
    let rigid = body.collider.is_rigid();
    // sensors glide over any ground
    let (friction, centrifugal) = if rigid {
        (ground.friction(), ground.centrifugal())
    } else {
        (0.0, 1.0)
    };
    match ground {
        GroundClass::TransitionUp => body.physics.next_layer(),
        GroundClass::TransitionDown => body.physics.previous_layer(),
        _ => {}
    }

    body.physics.integrate(dt, friction, centrifugal);
    body.update_collision_data()?;

    if let Some(other) = find_object_collision(world, obj, &body) {
        {
            let mut behavior = obj.behavior();
            behavior.on_object_hit(&mut body, &other);
        }
        if rigid {
            body.physics.collision_reaction_object(dt);
            body.update_collision_data()?;
        }
    } else if let Some(point) = body.terrain_hit(&world.grid) {
        {
            let mut behavior = obj.behavior();
            behavior.on_terrain_hit(&mut body, point);
        }
        if rigid {
            body.physics.collision_reaction_terrain(dt);
            body.update_collision_data()?;
        }
    }
    Ok(())
}

/// Scans the 3x3 cell neighborhood around the body center, plus the same
/// neighborhood one layer up and down where the scanned cell actually
/// connects to this layer.
fn find_object_collision(
    world: &World,
    mover: &Arc<SimObject>,
    body: &Body,
) -> Option<Arc<SimObject>> {
    let center = body.physics.center();
    let layer = body.physics.layer();
    let cx = center.x.floor() as i64;
    let cy = center.y.floor() as i64;

    for dl in -1..=1i32 {
        for dy in -1..=1i64 {
            for dx in -1..=1i64 {
                let Some(cell) = world.grid.cell((cx + dx, cy + dy, layer + dl)) else {
                    continue;
                };
                let reachable = match dl {
                    0 => true,
                    -1 => cell.has_up(),
                    _ => cell.has_down(),
                };
                if !reachable {
                    continue;
                }
                if let Some(hit) = cell.collision(body, mover) {
                    return Some(hit);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::body::{BodyProfile, PhysicalBody};
    use super::super::collider::{Collider, Hull};
    use super::super::grid::CellGrid;
    use super::super::object::{Behavior, Inert};
    use crate::consts::CELL_PIXELS;
    use crate::terrain::GroundBitmap;
    use glam::{DVec2, IVec2};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Counts callback invocations.
    #[derive(Default)]
    struct Probe {
        object_hits: Arc<AtomicUsize>,
        terrain_hits: Arc<AtomicUsize>,
    }

    impl Behavior for Probe {
        fn on_object_hit(&mut self, _body: &mut Body, _other: &Arc<SimObject>) {
            self.object_hits.fetch_add(1, Ordering::Relaxed);
        }

        fn on_terrain_hit(&mut self, _body: &mut Body, _point: DVec2) {
            self.terrain_hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Holds the throttle down.
    struct FullThrottle;

    impl Behavior for FullThrottle {
        fn control(&mut self, body: &mut Body, _dt: f64) {
            body.physics.apply_acceleration(true);
        }
    }

    fn fast_profile() -> BodyProfile {
        BodyProfile {
            max_speed: 10.0,
            accel_forward: 5.0,
            accel_reverse: 0.01,
            drag: 0.0,
            ..BodyProfile::default()
        }
    }

    fn square_hull() -> Collider {
        Collider::Hull(Hull::new(
            vec![
                IVec2::new(-10, -10),
                IVec2::new(10, -10),
                IVec2::new(10, 10),
                IVec2::new(-10, 10),
            ],
            DVec2::ZERO,
        ))
    }

    fn hull_object(pos: DVec2, behavior: Box<dyn Behavior>) -> Arc<SimObject> {
        let mut physics = PhysicalBody::new(fast_profile(), DVec2::ZERO);
        physics.set_pos(pos);
        let mut body = Body::new(physics, square_hull());
        body.update_collision_data().unwrap();
        SimObject::new(body, behavior)
    }

    fn walled_world() -> World {
        // 3x1 cells, the rightmost cell solid wall
        let mut bitmap = GroundBitmap::new(3 * CELL_PIXELS, CELL_PIXELS);
        bitmap.fill_rect(
            2 * CELL_PIXELS,
            0,
            CELL_PIXELS,
            CELL_PIXELS,
            crate::terrain::GroundClass::Wall,
        );
        World::new(CellGrid::new(3, 1, vec![Box::new(bitmap)]))
    }

    #[test]
    fn test_step_bounces_off_wall() {
        let world = walled_world();
        let probe = Probe::default();
        let hits = probe.terrain_hits.clone();
        let obj = hull_object(DVec2::new(1.5, 0.5), Box::new(probe));
        world.spawn(obj.clone());

        obj.body().physics.set_vel(DVec2::new(3.0, 0.0));
        for _ in 0..10 {
            step_object(&world, &obj, 0.1).unwrap();
            world.reindex(&obj);
        }
        assert!(hits.load(Ordering::Relaxed) >= 1);
        let body = obj.body();
        assert!(body.physics.vel().x < 0.0, "bounced back off the wall");
        assert!(body.physics.pos().x < 2.0, "never ended up inside the wall");
    }

    #[test]
    fn test_step_hops_layers_on_transition() {
        let mut lower = GroundBitmap::new(CELL_PIXELS, CELL_PIXELS);
        lower.fill_rect(48, 48, 32, 32, crate::terrain::GroundClass::TransitionUp);
        let upper = GroundBitmap::new(CELL_PIXELS, CELL_PIXELS);
        let world = World::new(CellGrid::new(1, 1, vec![Box::new(lower), Box::new(upper)]));

        let obj = hull_object(DVec2::new(0.5, 0.5), Box::new(Inert));
        world.spawn(obj.clone());
        step_object(&world, &obj, 0.1).unwrap();
        assert_eq!(obj.body().physics.layer(), 1);
    }

    #[test]
    fn test_step_reports_object_hit_and_reverses() {
        let world = walled_world();
        let probe = Probe::default();
        let hits = probe.object_hits.clone();
        let mover = hull_object(DVec2::new(0.5, 0.5), Box::new(probe));
        let blocker = hull_object(DVec2::new(0.58, 0.5), Box::new(Inert));
        world.spawn(mover.clone());
        world.spawn(blocker.clone());

        mover.body().physics.set_vel(DVec2::new(0.5, 0.0));
        step_object(&world, &mover, 0.1).unwrap();
        assert_eq!(hits.load(Ordering::Relaxed), 1);
        assert!(mover.body().physics.vel().x < 0.0);
    }

    #[test]
    fn test_sensor_triggers_without_bouncing() {
        let world = walled_world();
        let probe = Probe::default();
        let hits = probe.object_hits.clone();
        let mut physics = PhysicalBody::new(fast_profile(), DVec2::ZERO);
        physics.set_pos(DVec2::new(0.5, 0.5));
        let sensor = SimObject::new(
            Body::new(physics, Collider::Sensor { radius: 0.3 }),
            Box::new(probe),
        );
        let target = hull_object(DVec2::new(0.6, 0.5), Box::new(Inert));
        world.spawn(sensor.clone());
        world.spawn(target.clone());

        let before = sensor.body().physics.vel();
        step_object(&world, &sensor, 0.1).unwrap();
        assert_eq!(hits.load(Ordering::Relaxed), 1);
        // no bounce reaction for non-rigid movers
        assert_eq!(sensor.body().physics.vel(), before);
    }

    #[test]
    fn test_loop_drives_throttle_and_freeze_holds() {
        init_logging();
        let world = Arc::new(walled_world());
        let obj = hull_object(DVec2::new(0.5, 0.5), Box::new(FullThrottle));
        world.spawn(obj.clone());

        let sim = SimLoop::spawn(world.clone()).unwrap();
        assert!(sim.is_paused());
        sim.resume();
        thread::sleep(Duration::from_millis(120));
        sim.pause();
        thread::sleep(Duration::from_millis(30));
        let moved = obj.body().physics.pos();
        assert!(moved.distance(DVec2::new(0.5, 0.5)) > 0.0, "throttle moved the body");
        assert!(lock(&world.timer).elapsed() > Duration::ZERO);

        // frozen: time advances, bodies hold still
        sim.set_frozen(true);
        sim.resume();
        thread::sleep(Duration::from_millis(60));
        assert_eq!(obj.body().physics.pos(), moved);
        sim.shutdown();
    }
}
