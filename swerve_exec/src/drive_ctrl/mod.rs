//! # Per-module drive controller
//!
//! This module converts a desired module linear speed into a motor controller
//! command (a native closed-loop velocity setpoint when gains are configured,
//! or an open-loop feedforward duty cycle when not) and converts measured
//! values back into physical units.
//!
//! The hardware itself sits behind the narrow [`ModuleDriver`] interface,
//! implemented per motor controller vendor; the control core depends only on
//! that interface.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod driver;
mod state;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use driver::*;
pub use state::*;
