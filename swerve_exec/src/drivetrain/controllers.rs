//! Feedback controllers used by the drivetrain supervisor.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use crate::drive_ctrl::PidGains;
use crate::kinematics::ChassisSpeeds;
use util::maths;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A basic PID controller.
///
/// Timing is explicit: the caller passes the timestep of each update, so a
/// given input sequence always produces the same output sequence.
pub struct PidController {
    gains: PidGains,

    /// Error at the previous update, `None` directly after a reset.
    prev_error: Option<f64>,

    /// Accumulated integral term.
    integral: f64,
}

/// Heading drift corrector.
///
/// During pure translation an imperfect chassis slowly yaws away from its
/// intended heading. This controller latches the heading at the moment the
/// driver stops commanding rotation and nudges the angular demand to hold it
/// while translation continues.
pub struct DriftCorrector {
    pid: PidController,

    /// The heading being held.
    ///
    /// Units: degrees
    desired_heading_deg: f64,

    /// Translational speed magnitude at the previous update.
    ///
    /// Units: meters/second
    prev_translation_ms: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            prev_error: None,
            integral: 0.0,
        }
    }

    /// Compute the controller output for the given error and timestep.
    ///
    /// The derivative term is zero on the first update after a reset since
    /// there is no previous error to difference against.
    pub fn update(&mut self, error: f64, dt_s: f64) -> f64 {
        let derivative = match self.prev_error {
            Some(prev) if dt_s > 0.0 => (error - prev) / dt_s,
            _ => 0.0,
        };

        self.integral += error * dt_s;
        self.prev_error = Some(error);

        self.gains.p * error + self.gains.i * self.integral + self.gains.d * derivative
    }

    /// Clear the accumulated state.
    pub fn reset(&mut self) {
        self.prev_error = None;
        self.integral = 0.0;
    }
}

impl DriftCorrector {
    pub fn new(gains: PidGains) -> Self {
        Self {
            pid: PidController::new(gains),
            desired_heading_deg: 0.0,
            prev_translation_ms: 0.0,
        }
    }

    /// Apply drift correction to a chassis speed demand in place.
    ///
    /// While rotation is being commanded, or at the first cycle of a
    /// translation, the current heading is latched as the one to hold.
    /// Afterwards, while translation continues without commanded rotation,
    /// the heading error drives a correction added to the angular demand.
    ///
    /// Returns true if a correction was applied this cycle.
    pub fn apply(
        &mut self,
        speeds: &mut ChassisSpeeds,
        current_heading_deg: f64,
        dt_s: f64,
    ) -> bool {
        let translation_ms = speeds.vx_ms.hypot(speeds.vy_ms);
        let mut active = false;

        if speeds.omega_rads.abs() > 0.0 || self.prev_translation_ms <= 0.0 {
            self.desired_heading_deg = current_heading_deg;
            self.pid.reset();
        } else if translation_ms > 0.0 {
            let error_deg = maths::angle_delta_deg(self.desired_heading_deg, current_heading_deg);
            speeds.omega_rads += self.pid.update(error_deg, dt_s);
            active = true;
        }

        self.prev_translation_ms = translation_ms;

        active
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use util::maths::epsilon_equals_eps;

    const TOL: f64 = 1e-9;

    fn test_gains() -> PidGains {
        PidGains {
            p: 0.07,
            i: 0.0,
            d: 0.004,
        }
    }

    #[test]
    fn test_pid_proportional() {
        let mut pid = PidController::new(PidGains {
            p: 2.0,
            i: 0.0,
            d: 0.0,
        });

        assert!(epsilon_equals_eps(pid.update(1.5, 0.02), 3.0, TOL));
        assert!(epsilon_equals_eps(pid.update(-0.5, 0.02), -1.0, TOL));
    }

    #[test]
    fn test_pid_derivative_zero_on_first_update() {
        let mut pid = PidController::new(PidGains {
            p: 0.0,
            i: 0.0,
            d: 1.0,
        });

        // No previous error: derivative contributes nothing
        assert!(epsilon_equals_eps(pid.update(5.0, 0.02), 0.0, TOL));

        // (6 - 5) / 0.02
        assert!(epsilon_equals_eps(pid.update(6.0, 0.02), 50.0, TOL));

        pid.reset();
        assert!(epsilon_equals_eps(pid.update(1.0, 0.02), 0.0, TOL));
    }

    #[test]
    fn test_pid_integral_accumulates() {
        let mut pid = PidController::new(PidGains {
            p: 0.0,
            i: 1.0,
            d: 0.0,
        });

        pid.update(1.0, 0.5);
        assert!(epsilon_equals_eps(pid.update(1.0, 0.5), 1.0, TOL));
    }

    #[test]
    fn test_drift_latches_heading_while_rotating() {
        let mut corr = DriftCorrector::new(test_gains());

        // Rotating: never corrects, keeps re-latching the heading
        let mut speeds = ChassisSpeeds::new(1.0, 0.0, 0.5);
        assert!(!corr.apply(&mut speeds, 30.0, 0.02));
        assert!(epsilon_equals_eps(speeds.omega_rads, 0.5, TOL));
    }

    #[test]
    fn test_drift_corrects_during_translation() {
        let mut corr = DriftCorrector::new(test_gains());

        // First translating cycle only latches the heading
        let mut speeds = ChassisSpeeds::new(1.0, 0.0, 0.0);
        assert!(!corr.apply(&mut speeds, 0.0, 0.02));
        assert!(epsilon_equals_eps(speeds.omega_rads, 0.0, TOL));

        // The chassis has drifted +10 degrees: the correction opposes it
        let mut speeds = ChassisSpeeds::new(1.0, 0.0, 0.0);
        assert!(corr.apply(&mut speeds, 10.0, 0.02));
        assert!(speeds.omega_rads < 0.0);
    }

    #[test]
    fn test_drift_inactive_at_rest() {
        let mut corr = DriftCorrector::new(test_gains());

        let mut speeds = ChassisSpeeds::default();
        assert!(!corr.apply(&mut speeds, 45.0, 0.02));
        assert!(epsilon_equals_eps(speeds.omega_rads, 0.0, TOL));
    }
}
