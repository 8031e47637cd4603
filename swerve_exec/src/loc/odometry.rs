//! # Odometry integrator
//!
//! Fuses the heading sensor yaw with the chassis speeds recovered from the
//! measured module states into a running pose estimate. The heading is
//! treated as ground truth; only the translation is integrated.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use super::Pose;
use crate::kinematics::ChassisSpeeds;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Running pose estimate integrated from gyro heading and wheel odometry.
#[derive(Debug, Default)]
pub struct Odometry {
    /// The current pose estimate.
    pose: Pose,

    /// Offset applied to the gyro heading so that the pose heading matches
    /// the one given at the last reset.
    heading_offset_rad: f64,

    /// Timestamp of the previous update, or `None` directly after a reset.
    prev_time_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Odometry {
    /// Create a new integrator seeded with the given pose.
    ///
    /// `gyro_heading_rad` is the heading currently reported by the gyro, so
    /// that the integrator can account for the difference between it and the
    /// seed pose.
    pub fn new(pose: Pose, gyro_heading_rad: f64) -> Self {
        Self {
            pose,
            heading_offset_rad: pose.heading_rad - gyro_heading_rad,
            prev_time_s: None,
        }
    }

    /// The current pose estimate.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Overwrite the running estimate and clear the accumulated state.
    ///
    /// Used at match start or when re-seeding from an external pose source.
    pub fn reset_pose(&mut self, pose: Pose, gyro_heading_rad: f64) {
        self.pose = pose;
        self.heading_offset_rad = pose.heading_rad - gyro_heading_rad;
        self.prev_time_s = None;
    }

    /// Integrate one cycle of measured chassis motion.
    ///
    /// The new heading comes directly from the gyro (plus the reset offset).
    /// The measured chassis velocity is rotated into the field frame by the
    /// heading and integrated over the time since the last call. The first
    /// call after a reset only latches the heading and timestamp.
    ///
    /// Deterministic given identical input sequences. Malformed (NaN) inputs
    /// propagate into the pose; no sanity checks are performed here.
    pub fn update(
        &mut self,
        time_s: f64,
        gyro_heading_rad: f64,
        measured: &ChassisSpeeds,
    ) -> Pose {
        let heading_rad = gyro_heading_rad + self.heading_offset_rad;

        let dt_s = match self.prev_time_s {
            Some(t0) => time_s - t0,
            None => 0.0,
        };
        self.prev_time_s = Some(time_s);

        let (sin_h, cos_h) = heading_rad.sin_cos();

        self.pose = Pose {
            position_m: self.pose.position_m
                + nalgebra::Vector2::new(
                    (measured.vx_ms * cos_h - measured.vy_ms * sin_h) * dt_s,
                    (measured.vx_ms * sin_h + measured.vy_ms * cos_h) * dt_s,
                ),
            heading_rad,
        };

        self.pose
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use util::maths::epsilon_equals_eps;

    const TOL: f64 = 1e-9;

    #[test]
    fn test_straight_line() {
        let mut odo = Odometry::new(Pose::default(), 0.0);
        let speeds = ChassisSpeeds::new(1.0, 0.0, 0.0);

        // 100 cycles of 20 ms at 1 m/s, heading zero
        for i in 0..=100 {
            odo.update(i as f64 * 0.02, 0.0, &speeds);
        }

        let pose = odo.pose();
        assert!(epsilon_equals_eps(pose.position_m[0], 2.0, TOL));
        assert!(epsilon_equals_eps(pose.position_m[1], 0.0, TOL));
        assert!(epsilon_equals_eps(pose.heading_rad, 0.0, TOL));
    }

    #[test]
    fn test_heading_rotates_displacement() {
        let mut odo = Odometry::new(Pose::default(), 0.0);
        let speeds = ChassisSpeeds::new(1.0, 0.0, 0.0);

        // Facing +90 degrees, forward motion accumulates along field +y
        odo.update(0.0, std::f64::consts::FRAC_PI_2, &speeds);
        odo.update(1.0, std::f64::consts::FRAC_PI_2, &speeds);

        let pose = odo.pose();
        assert!(epsilon_equals_eps(pose.position_m[0], 0.0, TOL));
        assert!(epsilon_equals_eps(pose.position_m[1], 1.0, TOL));
    }

    #[test]
    fn test_heading_is_ground_truth() {
        let mut odo = Odometry::new(Pose::default(), 0.0);

        let pose = odo.update(0.0, 1.25, &ChassisSpeeds::default());
        assert!(epsilon_equals_eps(pose.heading_rad, 1.25, TOL));
    }

    #[test]
    fn test_reset_pose() {
        let mut odo = Odometry::new(Pose::default(), 0.0);
        odo.update(0.0, 0.0, &ChassisSpeeds::new(1.0, 0.0, 0.0));
        odo.update(1.0, 0.0, &ChassisSpeeds::new(1.0, 0.0, 0.0));

        // Re-seed while the gyro reads 0.5 rad: pose heading must follow the
        // seed, not the raw gyro
        odo.reset_pose(Pose::new(7.0, 2.0, -1.0), 0.5);

        let pose = odo.pose();
        assert!(epsilon_equals_eps(pose.position_m[0], 7.0, TOL));
        assert!(epsilon_equals_eps(pose.position_m[1], 2.0, TOL));

        let pose = odo.update(2.0, 0.5, &ChassisSpeeds::default());
        assert!(epsilon_equals_eps(pose.heading_rad, -1.0, TOL));

        // The first update after a reset integrates no displacement even
        // though time moved on
        assert!(epsilon_equals_eps(pose.position_m[0], 7.0, TOL));
    }
}
