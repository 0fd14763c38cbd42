//! Collision geometry: oriented polygon hulls and circular sensors
//!
//! Hull collision is point-sampled rather than edge-clipped: every
//! oriented edge is resampled into world-space points roughly one raster
//! pixel apart, and a hit is any sample landing inside the other shape
//! (or on impassable ground). Cheap, and exact enough at raster scale.

use glam::{DVec2, IVec2};

use crate::consts::PIXEL_IN_WORLD;

/// Collision geometry for a body, a closed set of two shapes.
///
/// `Hull` is a rigid oriented polygon (vehicles, crates); `Sensor` is a
/// non-rigid circular trigger (pickups, checkpoints) that registers
/// overlap but never receives collision response.
#[derive(Debug, Clone)]
pub enum Collider {
    Hull(Hull),
    Sensor { radius: f64 },
}

impl Collider {
    /// Rigid bodies take part in collision response and terrain bounces.
    pub fn is_rigid(&self) -> bool {
        matches!(self, Collider::Hull(_))
    }

    /// Broad-phase radius around the body center, in world units.
    pub fn bounding_radius(&self) -> f64 {
        match self {
            Collider::Hull(hull) => hull.bounding_radius(),
            Collider::Sensor { radius } => *radius,
        }
    }

    /// Re-derives the oriented geometry for a body pose. No-op for
    /// sensors.
    pub fn update(&mut self, pos: DVec2, rotation: f64) {
        if let Collider::Hull(hull) = self {
            hull.update(pos, rotation);
        }
    }

    /// Does the world-space point lie inside this shape? Sensors never
    /// contain points, so nothing ever bounces off them.
    pub fn contains(&self, body_pos: DVec2, point: DVec2) -> bool {
        match self {
            Collider::Hull(hull) => hull.contains(body_pos, point),
            Collider::Sensor { .. } => false,
        }
    }
}

/// Rigid polygon in local pixel coordinates, up-facing at rotation 0.
#[derive(Debug, Clone)]
pub struct Hull {
    local: Vec<IVec2>,
    oriented: Vec<IVec2>,
    samples: Vec<DVec2>,
    center_px: DVec2,
    bounding_radius: f64,
}

impl Hull {
    /// `local` is the polygon outline in pixel offsets from the body
    /// position; `center_px` the pixel offset of the body center. The
    /// bounding radius is fixed here as the max center-to-vertex
    /// distance.
    pub fn new(local: Vec<IVec2>, center_px: DVec2) -> Self {
        let bounding_radius = local
            .iter()
            .map(|p| p.as_dvec2().distance(center_px))
            .fold(0.0, f64::max)
            * PIXEL_IN_WORLD;
        let oriented = local.clone();
        Self {
            local,
            oriented,
            samples: Vec::new(),
            center_px,
            bounding_radius,
        }
    }

    pub fn bounding_radius(&self) -> f64 {
        self.bounding_radius
    }

    /// True for polygons too thin to collide (fewer than 3 vertices).
    pub fn is_degenerate(&self) -> bool {
        self.local.len() < 3
    }

    /// Rotates the outline about the center offset and resamples every
    /// edge into world-space test points, one per Manhattan pixel of edge
    /// length.
    pub fn update(&mut self, pos: DVec2, rotation: f64) {
        let (sin, cos) = (-rotation).sin_cos();
        for (out, p) in self.oriented.iter_mut().zip(&self.local) {
            let x = p.x as f64 - self.center_px.x;
            let y = p.y as f64 - self.center_px.y;
            *out = IVec2::new(
                (x * cos - y * sin + self.center_px.x) as i32,
                (x * sin + y * cos + self.center_px.y) as i32,
            );
        }

        self.samples.clear();
        let n = self.oriented.len();
        for i in 0..n {
            let a = self.oriented[i];
            let b = self.oriented[(i + 1) % n];
            let len = (a.x - b.x).abs() + (a.y - b.y).abs();
            if len == 0 {
                continue;
            }
            let start = pos + a.as_dvec2() * PIXEL_IN_WORLD;
            let end = pos + b.as_dvec2() * PIXEL_IN_WORLD;
            for k in 0..len {
                self.samples
                    .push(start + (end - start) * (k as f64 / len as f64));
            }
        }
    }

    /// World-space test points from the last `update`.
    pub fn samples(&self) -> &[DVec2] {
        &self.samples
    }

    /// Even-odd point-in-polygon test against the oriented outline, with
    /// the world point mapped into this body's pixel space.
    pub fn contains(&self, body_pos: DVec2, point: DVec2) -> bool {
        if self.oriented.len() < 3 {
            return false;
        }
        let p = (point - body_pos) / PIXEL_IN_WORLD;
        let mut inside = false;
        let mut j = self.oriented.len() - 1;
        for i in 0..self.oriented.len() {
            let a = self.oriented[i].as_dvec2();
            let b = self.oriented[j].as_dvec2();
            if (a.y > p.y) != (b.y > p.y)
                && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}
