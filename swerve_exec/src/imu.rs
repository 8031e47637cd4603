//! # Inertial measurement unit interface
//!
//! The chassis heading sensor sits behind the [`HeadingSensor`] trait so that
//! the control core is independent of the gyro vendor. A deterministic
//! simulated sensor is provided for bench runs and tests.

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A chassis yaw sensor.
///
/// Yaw is reported in degrees, increasing in the sensor's native direction
/// (which may be opposite to the chassis convention; the drivetrain handles
/// the inversion).
pub trait HeadingSensor {
    /// Accumulated yaw angle in degrees.
    fn yaw_deg(&self) -> f64;

    /// Yaw rate in degrees/second.
    fn rate_dps(&self) -> f64;

    /// Zero the accumulated yaw.
    fn reset(&mut self);
}

// ---------------------------------------------------------------------------
// SIMULATED SENSOR
// ---------------------------------------------------------------------------

/// Simulated heading sensor with directly settable readings.
#[derive(Debug, Default)]
pub struct SimHeadingSensor {
    yaw_deg: f64,
    rate_dps: f64,
}

impl SimHeadingSensor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the yaw reading.
    pub fn set_yaw_deg(&mut self, yaw_deg: f64) {
        self.yaw_deg = yaw_deg;
    }

    /// Set the yaw rate reading.
    pub fn set_rate_dps(&mut self, rate_dps: f64) {
        self.rate_dps = rate_dps;
    }
}

impl HeadingSensor for SimHeadingSensor {
    fn yaw_deg(&self) -> f64 {
        self.yaw_deg
    }

    fn rate_dps(&self) -> f64 {
        self.rate_dps
    }

    fn reset(&mut self) {
        self.yaw_deg = 0.0;
    }
}
