//! Driftline - spatial navigation and physics core for a top-down racer
//!
//! Core modules:
//! - `terrain`: Ground classification and the friction/centrifugal tables
//! - `quadtree`: Adaptive spatial index over terrain rasters
//! - `nav`: Leaf graph, A* pathfinding and cross-layer transitions
//! - `sim`: Bodies, collision geometry, the cell grid and the tick loop
//!
//! Rendering, audio, input and level-asset decoding live outside this
//! crate; callers feed in classified rasters (`terrain::GroundSource`) and
//! hook game logic through `sim::Behavior`.

pub mod nav;
pub mod quadtree;
pub mod sim;
pub mod terrain;

pub use quadtree::QuadTree;
pub use terrain::{GroundClass, GroundSource};

use std::fmt;

/// Core tuning constants
pub mod consts {
    /// Side length of one terrain cell in collision-raster pixels.
    pub const CELL_PIXELS: i64 = 128;
    /// One raster pixel in world units (one world unit = one cell).
    pub const PIXEL_IN_WORLD: f64 = 1.0 / CELL_PIXELS as f64;
    /// Default minimum quadtree leaf side, in pixels.
    pub const MIN_LEAF_PIXELS: i64 = CELL_PIXELS / 5;
    /// Simulation rate cap (ticks per second)
    pub const MAX_TICK_RATE: u32 = 65;
}

/// Failure loading a persisted structure (index snapshot, transition list).
///
/// Callers normally recover by regenerating from source data; see
/// `QuadTree::load_or_build`.
#[derive(Debug)]
pub enum PersistError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::Io(e) => write!(f, "io error: {e}"),
            PersistError::Parse(e) => write!(f, "parse error: {e}"),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistError::Io(e) => Some(e),
            PersistError::Parse(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for PersistError {
    fn from(e: std::io::Error) -> Self {
        PersistError::Io(e)
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(e: serde_json::Error) -> Self {
        PersistError::Parse(e)
    }
}
