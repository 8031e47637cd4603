//! # Swerve kinematics module
//!
//! This module provides the transform between a chassis velocity vector
//! (longitudinal, lateral, angular) and the four module states (wheel speed,
//! steering angle), in both directions, plus the wheel speed desaturation
//! pass applied before module demands are dispatched.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Matrix3, Vector2, Vector3};
use serde::Serialize;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The number of swerve modules on the chassis.
pub const NUM_MODULES: usize = 4;

/// Wheel speeds below this magnitude are treated as zero when deciding the
/// steering angle, to avoid commanding wheel chatter at rest.
const SPEED_DEADBAND_MS: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A chassis velocity vector.
///
/// Expressed in the robot body frame: `vx_ms` is longitudinal (+ve forward),
/// `vy_ms` is lateral (+ve left), `omega_rads` is angular (+ve
/// counter-clockwise).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ChassisSpeeds {
    /// Longitudinal velocity in meters/second
    pub vx_ms: f64,

    /// Lateral velocity in meters/second
    pub vy_ms: f64,

    /// Angular velocity in radians/second
    pub omega_rads: f64,
}

/// A single module's (speed, steering angle) pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ModuleState {
    /// Signed wheel linear speed in meters/second
    pub speed_ms: f64,

    /// Wheel steering angle in radians
    pub angle_rad: f64,
}

/// Chassis speed to module state transform for a four module swerve base.
///
/// Module ordering is fixed: front-left, front-right, back-left, back-right.
/// The module offsets are set once at construction and never change.
pub struct SwerveKinematics {
    /// Offsets of each module's steer axis from the chassis rotation centre.
    ///
    /// Units: meters,
    /// Frame: Robot body
    module_pos_m: [Vector2<f64>; NUM_MODULES],

    /// Steering angle last commanded for each module.
    ///
    /// Held so that a zero-speed demand keeps the wheels at their previous
    /// angle rather than snapping to an arbitrary one.
    prev_angle_rad: [f64; NUM_MODULES],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ChassisSpeeds {
    pub fn new(vx_ms: f64, vy_ms: f64, omega_rads: f64) -> Self {
        Self {
            vx_ms,
            vy_ms,
            omega_rads,
        }
    }

    /// Convert a field-frame velocity demand into the robot body frame.
    ///
    /// `heading_rad` is the robot's current heading relative to the field
    /// frame's x axis.
    pub fn from_field_relative(
        vx_ms: f64,
        vy_ms: f64,
        omega_rads: f64,
        heading_rad: f64,
    ) -> Self {
        let (sin_h, cos_h) = heading_rad.sin_cos();

        Self {
            vx_ms: vx_ms * cos_h + vy_ms * sin_h,
            vy_ms: -vx_ms * sin_h + vy_ms * cos_h,
            omega_rads,
        }
    }

    /// True if all three axes are exactly zero.
    ///
    /// The defensive stance branch requires an exact zero command, so no
    /// epsilon is used here.
    pub fn is_zero(&self) -> bool {
        self.vx_ms == 0.0 && self.vy_ms == 0.0 && self.omega_rads == 0.0
    }

    /// Return a copy with all three axes scaled by the given factor.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            vx_ms: self.vx_ms * factor,
            vy_ms: self.vy_ms * factor,
            omega_rads: self.omega_rads * factor,
        }
    }
}

impl SwerveKinematics {
    /// Create the kinematics from explicit module offsets.
    pub fn new(module_pos_m: [Vector2<f64>; NUM_MODULES]) -> Self {
        Self {
            module_pos_m,
            prev_angle_rad: [0.0; NUM_MODULES],
        }
    }

    /// Create the kinematics for a rectangular chassis.
    ///
    /// Offsets are derived from the track width (x, longitudinal) and
    /// wheelbase (y, lateral), in the fixed FL/FR/BL/BR ordering.
    pub fn from_chassis_dims(track_width_m: f64, wheelbase_m: f64) -> Self {
        Self::new([
            // Front left
            Vector2::new(track_width_m / 2.0, wheelbase_m / 2.0),
            // Front right
            Vector2::new(track_width_m / 2.0, -wheelbase_m / 2.0),
            // Back left
            Vector2::new(-track_width_m / 2.0, wheelbase_m / 2.0),
            // Back right
            Vector2::new(-track_width_m / 2.0, -wheelbase_m / 2.0),
        ])
    }

    /// Convert a chassis velocity into the four module states.
    ///
    /// For module `i` at offset `(dx, dy)` the wheel velocity vector is
    /// `(vx - omega * dy, vy + omega * dx)`; the module speed is its
    /// magnitude and the module angle its direction.
    ///
    /// Always defined: when a module's wheel vector is (near) zero its speed
    /// is zero and its angle is the previously commanded angle (initially
    /// zero).
    pub fn to_module_states(&mut self, speeds: &ChassisSpeeds) -> [ModuleState; NUM_MODULES] {
        let mut states = [ModuleState::default(); NUM_MODULES];

        for i in 0..NUM_MODULES {
            let wheel_vx = speeds.vx_ms - speeds.omega_rads * self.module_pos_m[i][1];
            let wheel_vy = speeds.vy_ms + speeds.omega_rads * self.module_pos_m[i][0];

            let speed_ms = wheel_vx.hypot(wheel_vy);

            if speed_ms < SPEED_DEADBAND_MS {
                states[i] = ModuleState {
                    speed_ms: 0.0,
                    angle_rad: self.prev_angle_rad[i],
                };
            } else {
                let angle_rad = wheel_vy.atan2(wheel_vx);
                self.prev_angle_rad[i] = angle_rad;
                states[i] = ModuleState { speed_ms, angle_rad };
            }
        }

        states
    }

    /// Convert four measured module states into the achieved chassis speeds.
    ///
    /// This is the inverse least-squares solve over the stacked per-module
    /// velocity equations, used to report the actual chassis motion from
    /// measured states (as opposed to the commanded one).
    pub fn to_chassis_speeds(&self, states: &[ModuleState; NUM_MODULES]) -> ChassisSpeeds {
        // Build the normal equations (A^T A) x = A^T b where each module
        // contributes the rows [1, 0, -dy] and [0, 1, dx].
        let mut ata = Matrix3::<f64>::zeros();
        let mut atb = Vector3::<f64>::zeros();

        for i in 0..NUM_MODULES {
            let dx = self.module_pos_m[i][0];
            let dy = self.module_pos_m[i][1];

            let (sin_a, cos_a) = states[i].angle_rad.sin_cos();
            let bx = states[i].speed_ms * cos_a;
            let by = states[i].speed_ms * sin_a;

            ata[(0, 0)] += 1.0;
            ata[(0, 2)] -= dy;
            ata[(1, 1)] += 1.0;
            ata[(1, 2)] += dx;
            ata[(2, 0)] -= dy;
            ata[(2, 1)] += dx;
            ata[(2, 2)] += dx * dx + dy * dy;

            atb[0] += bx;
            atb[1] += by;
            atb[2] += dx * by - dy * bx;
        }

        // A degenerate geometry (all modules at the rotation centre) has no
        // solution, report zero motion in that case.
        match ata.lu().solve(&atb) {
            Some(v) => ChassisSpeeds::new(v[0], v[1], v[2]),
            None => ChassisSpeeds::default(),
        }
    }

    /// Desaturate the wheel speeds against the given limit.
    ///
    /// If any module speed exceeds `max_speed_ms` all four are scaled by the
    /// same factor so the relative ratios (and the commanded trajectory
    /// shape) are preserved. Angles are untouched.
    ///
    /// Returns true if the speeds were limited.
    pub fn desaturate_wheel_speeds(
        states: &mut [ModuleState; NUM_MODULES],
        max_speed_ms: f64,
    ) -> bool {
        let max_observed_ms = states
            .iter()
            .map(|s| s.speed_ms.abs())
            .fold(0.0f64, f64::max);

        if max_observed_ms > max_speed_ms {
            let factor = max_speed_ms / max_observed_ms;
            for s in states.iter_mut() {
                s.speed_ms *= factor;
            }
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use util::maths::epsilon_equals_eps;

    const TOL: f64 = 1e-9;

    fn test_kinematics() -> SwerveKinematics {
        SwerveKinematics::from_chassis_dims(0.6, 0.5)
    }

    #[test]
    fn test_round_trip() {
        let mut kin = test_kinematics();

        let cases = [
            ChassisSpeeds::new(1.0, 0.0, 0.0),
            ChassisSpeeds::new(0.0, 1.0, 0.0),
            ChassisSpeeds::new(0.0, 0.0, 1.0),
            ChassisSpeeds::new(0.7, -0.3, 0.5),
            ChassisSpeeds::new(-1.2, 0.4, -2.0),
        ];

        for speeds in cases.iter() {
            let states = kin.to_module_states(speeds);
            let recovered = kin.to_chassis_speeds(&states);

            assert!(epsilon_equals_eps(recovered.vx_ms, speeds.vx_ms, TOL));
            assert!(epsilon_equals_eps(recovered.vy_ms, speeds.vy_ms, TOL));
            assert!(epsilon_equals_eps(
                recovered.omega_rads,
                speeds.omega_rads,
                TOL
            ));
        }
    }

    #[test]
    fn test_pure_rotation_angles() {
        let mut kin = test_kinematics();

        let states = kin.to_module_states(&ChassisSpeeds::new(0.0, 0.0, 1.0));

        // All modules move at the same speed for a pure rotation of a
        // rectangular chassis
        for s in states.iter() {
            assert!(epsilon_equals_eps(s.speed_ms, states[0].speed_ms, TOL));
        }

        // Wheel velocity is tangential, so each module's angle differs from
        // its position angle by +90 degrees
        let fl_pos_angle = (0.25f64).atan2(0.3);
        assert!(epsilon_equals_eps(
            states[0].angle_rad,
            fl_pos_angle + std::f64::consts::FRAC_PI_2,
            TOL
        ));
    }

    #[test]
    fn test_zero_speed_holds_previous_angle() {
        let mut kin = test_kinematics();

        // Command pure lateral motion, all wheels at +90 degrees
        let states = kin.to_module_states(&ChassisSpeeds::new(0.0, 1.0, 0.0));
        for s in states.iter() {
            assert!(epsilon_equals_eps(
                s.angle_rad,
                std::f64::consts::FRAC_PI_2,
                TOL
            ));
        }

        // A zero command keeps the wheels where they were
        let states = kin.to_module_states(&ChassisSpeeds::new(0.0, 0.0, 0.0));
        for s in states.iter() {
            assert_eq!(s.speed_ms, 0.0);
            assert!(epsilon_equals_eps(
                s.angle_rad,
                std::f64::consts::FRAC_PI_2,
                TOL
            ));
        }
    }

    #[test]
    fn test_desaturation_invariant() {
        let mut kin = test_kinematics();

        let mut states = kin.to_module_states(&ChassisSpeeds::new(3.0, 1.0, 4.0));
        let before = states;

        let limited = SwerveKinematics::desaturate_wheel_speeds(&mut states, 2.0);
        assert!(limited);

        // Max speed is at the limit
        let max = states
            .iter()
            .map(|s| s.speed_ms.abs())
            .fold(0.0f64, f64::max);
        assert!(max <= 2.0 + TOL);

        // Ratios between module speeds are unchanged, angles untouched
        for i in 0..NUM_MODULES {
            assert_eq!(states[i].angle_rad, before[i].angle_rad);
            for j in 0..NUM_MODULES {
                if before[j].speed_ms != 0.0 && before[i].speed_ms != 0.0 {
                    assert!(epsilon_equals_eps(
                        states[i].speed_ms / states[j].speed_ms,
                        before[i].speed_ms / before[j].speed_ms,
                        TOL
                    ));
                }
            }
        }

        // No limiting below the cap
        let mut states = kin.to_module_states(&ChassisSpeeds::new(0.1, 0.0, 0.0));
        let before = states;
        assert!(!SwerveKinematics::desaturate_wheel_speeds(&mut states, 2.0));
        assert_eq!(states, before);
    }

    #[test]
    fn test_field_relative() {
        // Facing +90 degrees, a field +x demand becomes a robot -y demand
        let speeds = ChassisSpeeds::from_field_relative(
            1.0,
            0.0,
            0.5,
            std::f64::consts::FRAC_PI_2,
        );

        assert!(epsilon_equals_eps(speeds.vx_ms, 0.0, TOL));
        assert!(epsilon_equals_eps(speeds.vy_ms, -1.0, TOL));
        assert!(epsilon_equals_eps(speeds.omega_rads, 0.5, TOL));
    }
}
