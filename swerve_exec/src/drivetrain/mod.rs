//! # Drivetrain control module
//!
//! The per-cycle supervisor of the drivetrain: it owns the four module
//! controllers, the kinematics, the odometry and the pose history, latches
//! the most recent driver command and turns it into module demands every
//! control cycle.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod controllers;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use controllers::*;
pub use params::*;
pub use state::*;

use crate::kinematics::NUM_MODULES;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Steering angles of the defensive ("X") stance, in degrees, in the fixed
/// FL/FR/BL/BR module ordering. Pointing each wheel at the chassis centre
/// makes the base hardest to push in any direction.
pub const DEFENSIVE_ANGLES_DEG: [f64; NUM_MODULES] = [-45.0, 45.0, 45.0, -45.0];

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during Drivetrain operation.
#[derive(Debug, thiserror::Error)]
pub enum DrivetrainError {
    #[error("Drivetrain processing invoked before initialisation")]
    NotInitialised,
}
