//! Motor controller driver interface and the simulated implementation.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Proportional, integral and derivative gains.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct PidGains {
    pub p: f64,
    pub i: f64,
    pub d: f64,
}

/// Configuration pushed to a motor controller at startup.
#[derive(Clone, Copy, Debug, Default)]
pub struct DriverConfig {
    /// Closed-loop velocity gains, or `None` for open-loop drive.
    pub pid_gains: Option<PidGains>,

    /// Voltage compensation saturation, or `None` to leave compensation off.
    pub nominal_voltage_v: Option<f64>,

    /// Supply current limit, or `None` to leave the limit off.
    pub current_limit_a: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Drive command issued to a module's drive motor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DriveCommand {
    /// Open-loop duty cycle in [-1, 1].
    Duty(f64),

    /// Closed-loop velocity setpoint in controller-native units
    /// (ticks per 100 ms).
    VelocityRaw(f64),
}

/// A motor controller rejected its configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Motor controller reported error code {0} during configuration")]
    ErrorCode(i32),
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// The motor controller collaborator for one swerve module.
///
/// Raw position is in encoder ticks and raw velocity in ticks per 100 ms;
/// the [`super::DriveCtrl`] layer owns the conversion to physical units.
pub trait ModuleDriver {
    /// Issue a drive command and a steering angle demand.
    fn set(&mut self, drive: DriveCommand, steer_angle_rad: f64);

    /// Raw measured drive velocity, in ticks per 100 ms.
    fn measured_velocity(&self) -> f64;

    /// Raw measured drive position, in ticks.
    fn measured_position(&self) -> f64;

    /// Measured steering angle in radians.
    fn measured_steer_angle(&self) -> f64;

    /// Motor output voltage in volts.
    fn output_voltage(&self) -> f64;

    /// Push the given configuration to the controller.
    fn configure(&mut self, config: &DriverConfig) -> Result<(), ConfigError>;

    /// Zero the drive position sensor.
    fn reset_position(&mut self);

    /// Set the open-loop ramp rate, in seconds from neutral to full.
    fn config_ramp_rate(&mut self, ramp_rate_s: f64);
}

// ---------------------------------------------------------------------------
// SIMULATED DRIVER
// ---------------------------------------------------------------------------

/// Deterministic simulated module driver.
///
/// Commands are echoed straight into the measured values: a duty command
/// produces the synthetic sensor velocity `duty * ticks_per_rev *
/// free_speed_rpm / 60 / 10` (ticks per 100 ms), a raw velocity setpoint is
/// reached instantly.
pub struct SimModuleDriver {
    ticks_per_rev: f64,
    free_speed_rpm: f64,
    nominal_voltage_v: f64,
    raw_velocity: f64,
    raw_position: f64,
    steer_angle_rad: f64,
    duty: f64,
    /// When set, `configure` reports a failure. Used to exercise the
    /// degraded-configuration path.
    fail_configure: bool,
}

impl SimModuleDriver {
    pub fn new(ticks_per_rev: f64, free_speed_rpm: f64) -> Self {
        Self {
            ticks_per_rev,
            free_speed_rpm,
            nominal_voltage_v: 12.0,
            raw_velocity: 0.0,
            raw_position: 0.0,
            steer_angle_rad: 0.0,
            duty: 0.0,
            fail_configure: false,
        }
    }

    pub fn with_failing_configure(mut self) -> Self {
        self.fail_configure = true;
        self
    }

    /// The last commanded duty cycle.
    pub fn duty(&self) -> f64 {
        self.duty
    }
}

impl ModuleDriver for SimModuleDriver {
    fn set(&mut self, drive: DriveCommand, steer_angle_rad: f64) {
        self.steer_angle_rad = steer_angle_rad;

        match drive {
            DriveCommand::Duty(duty) => {
                self.duty = duty;
                self.raw_velocity = duty * self.ticks_per_rev * self.free_speed_rpm / 60.0 / 10.0;
            }
            DriveCommand::VelocityRaw(raw) => {
                self.duty = 0.0;
                self.raw_velocity = raw;
            }
        }
    }

    fn measured_velocity(&self) -> f64 {
        self.raw_velocity
    }

    fn measured_position(&self) -> f64 {
        self.raw_position
    }

    fn measured_steer_angle(&self) -> f64 {
        self.steer_angle_rad
    }

    fn output_voltage(&self) -> f64 {
        self.duty * self.nominal_voltage_v
    }

    fn configure(&mut self, config: &DriverConfig) -> Result<(), ConfigError> {
        if self.fail_configure {
            return Err(ConfigError::ErrorCode(-1));
        }

        if let Some(v) = config.nominal_voltage_v {
            self.nominal_voltage_v = v;
        }

        Ok(())
    }

    fn reset_position(&mut self) {
        self.raw_position = 0.0;
    }

    fn config_ramp_rate(&mut self, _ramp_rate_s: f64) {}
}
