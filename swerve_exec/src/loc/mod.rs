//! # Localisation module
//!
//! This module provides the drivetrain's idea of where it is: the [`Pose`]
//! value type, the wheel/gyro odometry integrator, and the bounded
//! interpolating pose history used for latency compensation.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod lag_comp;
pub mod odometry;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::Serialize;

// Internal
use util::maths;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use lag_comp::LagCompBuffer;
pub use odometry::Odometry;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The pose (2D position and heading) of the robot in the field frame.
///
/// A pose is an immutable snapshot once created; the odometry integrator
/// produces a fresh one each cycle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Pose {
    /// The position in the field frame.
    ///
    /// Units: meters
    pub position_m: Vector2<f64>,

    /// The heading (angle to the positive field x axis).
    ///
    /// Units: radians
    pub heading_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Pose {
    fn default() -> Self {
        Pose {
            position_m: Vector2::zeros(),
            heading_rad: 0.0,
        }
    }
}

impl Pose {
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Pose {
            position_m: Vector2::new(x_m, y_m),
            heading_rad,
        }
    }

    /// The heading in degrees.
    pub fn heading_deg(&self) -> f64 {
        self.heading_rad.to_degrees()
    }

    /// Linearly interpolate between this pose and `other`.
    ///
    /// `frac` is in [0, 1], 0 giving `self` and 1 giving `other`. The
    /// translation is interpolated component-wise; the heading is
    /// interpolated along the shortest arc between the two angles.
    pub fn interpolate(&self, other: &Pose, frac: f64) -> Pose {
        let heading_delta_rad = maths::get_ang_dist_2pi(self.heading_rad, other.heading_rad);

        Pose {
            position_m: self.position_m + (other.position_m - self.position_m) * frac,
            heading_rad: self.heading_rad + heading_delta_rad * frac,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use util::maths::epsilon_equals_eps;

    #[test]
    fn test_interpolate_shortest_arc() {
        // Interpolation across the 0/2pi wrap takes the short way round
        let a = Pose::new(0.0, 0.0, 0.1);
        let b = Pose::new(0.0, 0.0, std::f64::consts::TAU - 0.1);

        let mid = a.interpolate(&b, 0.5);
        assert!(epsilon_equals_eps(mid.heading_rad, 0.0, 1e-9));
    }

    #[test]
    fn test_interpolate_translation() {
        let a = Pose::new(0.0, 0.0, 0.0);
        let b = Pose::new(10.0, -4.0, 0.0);

        let p = a.interpolate(&b, 0.25);
        assert!(epsilon_equals_eps(p.position_m[0], 2.5, 1e-9));
        assert!(epsilon_equals_eps(p.position_m[1], -1.0, 1e-9));
    }
}
