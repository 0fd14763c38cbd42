//! Dynamics stack: bodies, collision geometry, the cell grid and the
//! fixed-cadence tick loop
//!
//! The loop runs on its own thread (`runner::SimLoop`) over a shared
//! `world::World`; render-side code reads poses through the same per-cell
//! locks the loop writes under.

pub mod body;
pub mod clock;
pub mod collider;
pub mod grid;
pub mod object;
pub mod runner;
pub mod world;

pub use body::{BodyProfile, PhysicalBody};
pub use clock::{GameTimer, TickClock};
pub use collider::{Collider, Hull};
pub use grid::CellGrid;
pub use object::{Behavior, Body, Inert, SimObject, StepError};
pub use runner::SimLoop;
pub use world::World;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock helper: a poisoned mutex means another thread panicked mid-tick;
/// the guarded state is still the best state there is, so recover it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
