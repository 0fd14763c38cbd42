//! Ground classification and per-class movement tables
//!
//! Level assets decode their collision bitmaps into `GroundClass` rasters
//! before anything in this crate sees them; unknown colors are normalized
//! to `Open` at decode time.

use serde::{Deserialize, Serialize};

/// Discrete terrain category, attached to quadtree leaves and looked up
/// per body position every tick.
///
/// The derived `Ord` over declaration order is the refinement priority of
/// the spatial index: a later class constrains movement more and may
/// overwrite an earlier one inserted into the same region, never the other
/// way around. `Wall` outranks everything.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum GroundClass {
    #[default]
    Open,
    LowFriction,
    HighFriction,
    Water,
    Ice,
    TransitionDown,
    TransitionUp,
    Wall,
}

impl GroundClass {
    /// Friction coefficient applied to rigid bodies standing on this
    /// ground. Scales aerodynamic drag in the integrator.
    pub fn friction(self) -> f64 {
        match self {
            GroundClass::Open | GroundClass::TransitionDown | GroundClass::TransitionUp => 0.4,
            GroundClass::HighFriction | GroundClass::Water => 1.0,
            GroundClass::LowFriction | GroundClass::Ice | GroundClass::Wall => 0.0,
        }
    }

    /// Centrifugal coefficient: how strongly the velocity follows the
    /// body's orientation. Low values mean the body keeps sliding along
    /// its old heading (drift).
    pub fn centrifugal(self) -> f64 {
        match self {
            GroundClass::Ice => 0.1,
            GroundClass::Wall => 0.0,
            _ => 0.9,
        }
    }

    /// Rigid bodies bounce off this ground instead of crossing it.
    pub fn impassable(self) -> bool {
        matches!(self, GroundClass::Wall)
    }
}

/// Per-pixel terrain classification input, in global raster coordinates.
///
/// Implementations must answer any coordinate; everything outside the
/// level is `Wall`.
pub trait GroundSource {
    fn classify(&self, x: i64, y: i64) -> GroundClass;
}

/// In-memory classification raster.
///
/// The usual `GroundSource`: levels decode their collision bitmaps into
/// one of these per layer, and tests paint them directly.
#[derive(Debug, Clone)]
pub struct GroundBitmap {
    width: i64,
    height: i64,
    pixels: Vec<GroundClass>,
}

impl GroundBitmap {
    /// All-`Open` raster of the given pixel size.
    pub fn new(width: i64, height: i64) -> Self {
        Self::filled(width, height, GroundClass::Open)
    }

    pub fn filled(width: i64, height: i64, class: GroundClass) -> Self {
        Self {
            width,
            height,
            pixels: vec![class; (width * height) as usize],
        }
    }

    pub fn width(&self) -> i64 {
        self.width
    }

    pub fn height(&self) -> i64 {
        self.height
    }

    /// Paints one pixel; out-of-range coordinates are ignored.
    pub fn set(&mut self, x: i64, y: i64, class: GroundClass) {
        if x >= 0 && x < self.width && y >= 0 && y < self.height {
            self.pixels[(y * self.width + x) as usize] = class;
        }
    }

    /// Paints an axis-aligned rectangle, clipped to the raster.
    pub fn fill_rect(&mut self, x: i64, y: i64, w: i64, h: i64, class: GroundClass) {
        for py in y..y + h {
            for px in x..x + w {
                self.set(px, py, class);
            }
        }
    }
}

impl GroundSource for GroundBitmap {
    fn classify(&self, x: i64, y: i64) -> GroundClass {
        if x < 0 || x >= self.width || y < 0 || y >= self.height {
            return GroundClass::Wall;
        }
        self.pixels[(y * self.width + x) as usize]
    }
}
