//! Rigid body state and the explicit-Euler integrator
//!
//! One body per simulation object. The integrator takes the per-tick
//! ground coefficients from the cell grid; everything else (controls,
//! external forces) is pushed in between ticks by behaviors.

use glam::DVec2;

/// Tuning constants for a body, normally parsed from object config.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyProfile {
    /// Speed clamp in world units per second.
    pub max_speed: f64,
    /// Aerodynamic drag factor, scaled by ground friction each tick.
    pub drag: f64,
    /// How strongly the velocity follows the heading while turning.
    pub road_grip: f64,
    pub accel_forward: f64,
    pub accel_reverse: f64,
    /// Turn rate in radians per second.
    pub turn_speed: f64,
    /// Velocity multiplier applied while the brake is held, below 1.0.
    pub brake_force: f64,
}

impl Default for BodyProfile {
    fn default() -> Self {
        Self {
            max_speed: 1.0,
            drag: 0.1,
            road_grip: 0.1,
            accel_forward: 0.1,
            accel_reverse: 0.1,
            turn_speed: 0.1,
            brake_force: 0.2,
        }
    }
}

/// Pose, velocity and the control scalars the integrator consumes.
///
/// Rotation 0 faces down the negative y axis and is left unnormalized;
/// the cached direction vector is refreshed whenever rotation changes.
#[derive(Debug, Clone)]
pub struct PhysicalBody {
    pos: DVec2,
    vel: DVec2,
    rotation: f64,
    dir: DVec2,
    angular_vel: f64,
    accel: f64,
    turn_rate: f64,
    brake: f64,
    layer: i32,
    center_off: DVec2,
    profile: BodyProfile,
    ext_forces: Vec<DVec2>,
    ext_torques: Vec<f64>,
}

impl PhysicalBody {
    /// Body at the origin, facing down, at rest. `center_off` is the
    /// offset from position to the geometric center, in world units.
    pub fn new(profile: BodyProfile, center_off: DVec2) -> Self {
        Self {
            pos: DVec2::ZERO,
            vel: DVec2::ZERO,
            rotation: 0.0,
            dir: DVec2::new(0.0, -1.0),
            angular_vel: 0.0,
            accel: 0.0,
            turn_rate: 0.0,
            brake: 1.0,
            layer: 0,
            center_off,
            profile,
            ext_forces: Vec::new(),
            ext_torques: Vec::new(),
        }
    }

    pub fn pos(&self) -> DVec2 {
        self.pos
    }

    pub fn set_pos(&mut self, pos: DVec2) {
        self.pos = pos;
    }

    pub fn vel(&self) -> DVec2 {
        self.vel
    }

    pub fn set_vel(&mut self, vel: DVec2) {
        self.vel = vel;
    }

    pub fn speed(&self) -> f64 {
        self.vel.length()
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: f64) {
        self.rotation = rotation;
        self.dir = DVec2::new(-rotation.sin(), -rotation.cos());
    }

    /// Unit heading derived from the rotation.
    pub fn dir(&self) -> DVec2 {
        self.dir
    }

    /// Geometric center, the point ground lookups and cell registration
    /// key on.
    pub fn center(&self) -> DVec2 {
        self.pos + self.center_off
    }

    pub fn center_offset(&self) -> DVec2 {
        self.center_off
    }

    pub fn profile(&self) -> &BodyProfile {
        &self.profile
    }

    pub fn layer(&self) -> i32 {
        self.layer
    }

    pub fn set_layer(&mut self, layer: i32) {
        self.layer = layer;
    }

    pub fn next_layer(&mut self) {
        self.layer += 1;
    }

    pub fn previous_layer(&mut self) {
        self.layer -= 1;
    }

    // --- controls -------------------------------------------------------

    pub fn apply_acceleration(&mut self, forward: bool) {
        self.accel = if forward {
            self.profile.accel_forward
        } else {
            -self.profile.accel_reverse
        };
    }

    pub fn release_acceleration(&mut self) {
        self.accel = 0.0;
    }

    pub fn apply_turn(&mut self, left: bool) {
        self.turn_rate = if left {
            -self.profile.turn_speed
        } else {
            self.profile.turn_speed
        };
    }

    pub fn release_turn(&mut self) {
        self.turn_rate = 0.0;
    }

    pub fn apply_brake(&mut self) {
        self.brake = self.profile.brake_force;
    }

    pub fn release_brake(&mut self) {
        self.brake = 1.0;
    }

    // --- external effects -----------------------------------------------

    /// Constant force applied every tick until detached. Detach matches
    /// by value so effect sources do not need handles.
    pub fn attach_force(&mut self, force: DVec2) {
        self.ext_forces.push(force);
    }

    pub fn detach_force(&mut self, force: DVec2) {
        if let Some(i) = self.ext_forces.iter().position(|&f| f == force) {
            self.ext_forces.remove(i);
        }
    }

    pub fn attach_torque(&mut self, torque: f64) {
        self.ext_torques.push(torque);
    }

    pub fn detach_torque(&mut self, torque: f64) {
        if let Some(i) = self.ext_torques.iter().position(|&t| t == torque) {
            self.ext_torques.remove(i);
        }
    }

    // --- integration ----------------------------------------------------

    /// One explicit-Euler step.
    ///
    /// `friction` and `centrifugal` come from the ground tables at the
    /// body center. Rotating the velocity by a fraction of the angular
    /// step stands in for angular momentum: on grippy ground velocity
    /// follows the heading almost immediately, on ice it keeps pointing
    /// the old way and the body drifts.
    pub fn integrate(&mut self, dt: f64, friction: f64, centrifugal: f64) {
        self.angular_vel = self.turn_rate + self.ext_torques.iter().sum::<f64>();
        self.set_rotation(self.rotation + dt * self.angular_vel);

        let mut accel = self.accel * self.dir - friction * self.profile.drag * self.vel;

        let swing = -self.angular_vel * dt * centrifugal * self.profile.road_grip;
        let (sin, cos) = swing.sin_cos();
        self.vel = DVec2::new(
            self.vel.x * cos - self.vel.y * sin,
            self.vel.x * sin + self.vel.y * cos,
        );

        for force in &self.ext_forces {
            accel += *force;
        }
        self.vel += dt * accel;

        let speed = self.vel.length();
        if speed > self.profile.max_speed {
            self.vel *= self.profile.max_speed / speed;
        } else if speed < self.profile.accel_reverse * dt {
            // crawling bodies snap to rest and hold position this tick
            self.vel = DVec2::ZERO;
            return;
        }
        self.vel *= self.brake;
        self.pos += dt * self.vel;
    }

    /// Bounce off another object: back out a little past the step that
    /// caused the overlap and reverse, undoing this tick's turn.
    pub fn collision_reaction_object(&mut self, dt: f64) {
        self.pos -= 1.1 * dt * self.vel;
        self.vel = -self.vel;
        self.set_rotation(self.rotation - dt * self.angular_vel);
    }

    /// Bounce off impassable terrain: undo the step and reverse at half
    /// speed.
    pub fn collision_reaction_terrain(&mut self, dt: f64) {
        self.pos -= dt * self.vel;
        self.vel = -self.vel / 2.0;
        self.set_rotation(self.rotation - dt * self.angular_vel);
    }
}
