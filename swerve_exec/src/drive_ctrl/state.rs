//! Implementations for the DriveCtrl structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;

// Internal
use super::{DriveCommand, DriverConfig, ModuleDriver, PidGains};
use crate::kinematics::ModuleState;
use util::maths::clamp;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Nominal bus voltage assumed for duty-cycle normalisation when voltage
/// compensation is not configured.
pub const FALLBACK_NOMINAL_VOLTAGE_V: f64 = 12.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Fixed per-module geometry used to derive the sensor coefficients.
#[derive(Clone, Copy, Debug)]
pub struct ModuleConfig {
    /// Wheel diameter in meters.
    pub wheel_diameter_m: f64,

    /// Overall drive gear reduction (wheel revolutions per motor revolution).
    pub drive_reduction: f64,

    /// Encoder ticks per motor revolution.
    pub ticks_per_rev: f64,
}

/// Velocity-to-voltage law used when no closed-loop gains are configured.
#[derive(Clone, Copy, Debug)]
pub struct FeedforwardConfig {
    /// If true use the simple normalisation `speed / max_speed * max_power`,
    /// otherwise the calibrated `ks + kv * speed` model.
    pub normalised: bool,

    /// Maximum physically achievable module speed in meters/second.
    pub max_speed_ms: f64,

    /// Voltage bound for the drive command.
    pub max_power_v: f64,

    /// Static gain of the calibrated model, in volts.
    pub static_gain_v: f64,

    /// Velocity gain of the calibrated model, in volt-seconds/meter.
    pub velocity_gain_vs_m: f64,
}

/// Builder for a [`DriveCtrl`].
///
/// Gains, voltage compensation and the current limit are all optional, as on
/// the real controller; unset options leave the corresponding feature off.
pub struct DriveCtrlBuilder {
    pid_gains: Option<PidGains>,
    nominal_voltage_v: Option<f64>,
    current_limit_a: Option<f64>,
}

/// Closed-loop velocity/voltage controller for one swerve module.
pub struct DriveCtrl {
    driver: Box<dyn ModuleDriver>,

    /// Meters of wheel travel per encoder tick.
    sensor_position_coefficient: f64,

    /// Meters/second of wheel speed per raw velocity unit (ticks per 100 ms).
    sensor_velocity_coefficient: f64,

    pid_gains: Option<PidGains>,

    /// Bus voltage used for duty-cycle normalisation: the configured
    /// compensation value, or [`FALLBACK_NOMINAL_VOLTAGE_V`].
    nominal_voltage_v: f64,

    feedforward: FeedforwardConfig,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveCtrlBuilder {
    pub fn new() -> Self {
        Self {
            pid_gains: None,
            nominal_voltage_v: None,
            current_limit_a: None,
        }
    }

    pub fn with_pid_gains(mut self, gains: PidGains) -> Self {
        self.pid_gains = Some(gains);
        self
    }

    pub fn with_voltage_compensation(mut self, nominal_voltage_v: f64) -> Self {
        self.nominal_voltage_v = Some(nominal_voltage_v);
        self
    }

    pub fn with_current_limit(mut self, current_limit_a: f64) -> Self {
        self.current_limit_a = Some(current_limit_a);
        self
    }

    /// Build the controller around the given driver.
    ///
    /// The sensor coefficients are computed once here from the immutable
    /// module geometry. A configuration failure from the driver is logged
    /// and operation continues with the driver's prior configuration - a
    /// match robot cannot halt for a misconfigured motor.
    pub fn build(
        self,
        mut driver: Box<dyn ModuleDriver>,
        module_config: &ModuleConfig,
        feedforward: FeedforwardConfig,
    ) -> DriveCtrl {
        let sensor_position_coefficient = std::f64::consts::PI
            * module_config.wheel_diameter_m
            * module_config.drive_reduction
            / module_config.ticks_per_rev;

        // Raw velocity is reported per 100 ms
        let sensor_velocity_coefficient = sensor_position_coefficient * 10.0;

        let driver_config = DriverConfig {
            pid_gains: self.pid_gains,
            nominal_voltage_v: self.nominal_voltage_v,
            current_limit_a: self.current_limit_a,
        };

        if let Err(e) = driver.configure(&driver_config) {
            warn!("Failed to configure drive motor controller: {}", e);
        }

        DriveCtrl {
            driver,
            sensor_position_coefficient,
            sensor_velocity_coefficient,
            pid_gains: self.pid_gains,
            nominal_voltage_v: self.nominal_voltage_v.unwrap_or(FALLBACK_NOMINAL_VOLTAGE_V),
            feedforward,
        }
    }
}

impl Default for DriveCtrlBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveCtrl {
    /// Command the module to the given wheel speed and steering angle.
    ///
    /// With closed-loop gains configured the driver performs the loop and
    /// this layer only converts units. Without gains the demand falls back
    /// to the open-loop velocity-to-voltage law, normalised to a duty cycle
    /// against the nominal bus voltage.
    pub fn set_velocity(&mut self, target_speed_ms: f64, steer_angle_rad: f64) {
        let drive = match self.pid_gains {
            Some(_) => {
                DriveCommand::VelocityRaw(target_speed_ms / self.sensor_velocity_coefficient)
            }
            None => {
                let voltage = self.velocity_to_voltage(target_speed_ms);
                DriveCommand::Duty(voltage / self.nominal_voltage_v)
            }
        };

        self.driver.set(drive, steer_angle_rad);
    }

    /// The open-loop velocity-to-voltage law.
    ///
    /// Driving by gains rather than raw duty keeps distance-critical moves
    /// accurate, e.g. a commanded 1 m translation.
    pub fn velocity_to_voltage(&self, speed_ms: f64) -> f64 {
        let ff = &self.feedforward;

        if ff.normalised {
            speed_ms / ff.max_speed_ms * ff.max_power_v
        } else {
            let voltage = ff.static_gain_v * speed_ms.signum() + ff.velocity_gain_vs_m * speed_ms;
            clamp(&voltage, &-ff.max_power_v, &ff.max_power_v)
        }
    }

    /// Measured wheel speed in meters/second.
    ///
    /// Exact algebraic inverse of the conversion used by [`set_velocity`],
    /// so a raw value converted to physical units and back is unchanged.
    ///
    /// [`set_velocity`]: DriveCtrl::set_velocity
    pub fn state_velocity(&self) -> f64 {
        self.driver.measured_velocity() * self.sensor_velocity_coefficient
    }

    /// Measured wheel travel in meters.
    pub fn state_position(&self) -> f64 {
        self.driver.measured_position() * self.sensor_position_coefficient
    }

    /// Measured (speed, steering angle) for this module.
    pub fn state(&self) -> ModuleState {
        ModuleState {
            speed_ms: self.state_velocity(),
            angle_rad: self.driver.measured_steer_angle(),
        }
    }

    /// Motor output voltage in volts.
    pub fn output_voltage(&self) -> f64 {
        self.driver.output_voltage()
    }

    /// Zero the drive position sensor.
    pub fn reset_position(&mut self) {
        self.driver.reset_position();
    }

    /// Set the driver's open-loop ramp rate.
    pub fn config_ramp_rate(&mut self, ramp_rate_s: f64) {
        self.driver.config_ramp_rate(ramp_rate_s);
    }

    pub(crate) fn sensor_velocity_coefficient(&self) -> f64 {
        self.sensor_velocity_coefficient
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::drive_ctrl::SimModuleDriver;
    use util::maths::epsilon_equals_eps;

    const TOL: f64 = 1e-9;

    fn test_module_config() -> ModuleConfig {
        ModuleConfig {
            wheel_diameter_m: 0.1016,
            drive_reduction: 1.0 / 6.86,
            ticks_per_rev: 2048.0,
        }
    }

    fn test_feedforward(normalised: bool) -> FeedforwardConfig {
        FeedforwardConfig {
            normalised,
            max_speed_ms: 4.0,
            max_power_v: 12.0,
            static_gain_v: 0.6,
            velocity_gain_vs_m: 2.5,
        }
    }

    fn build(builder: DriveCtrlBuilder, normalised: bool) -> DriveCtrl {
        builder.build(
            Box::new(SimModuleDriver::new(2048.0, 6000.0)),
            &test_module_config(),
            test_feedforward(normalised),
        )
    }

    #[test]
    fn test_sensor_unit_round_trip() {
        let ctrl = build(DriveCtrlBuilder::new(), true);
        let coeff = ctrl.sensor_velocity_coefficient();

        for raw in [-5000.0, -1.0, 0.0, 1.0, 327.0, 20000.0].iter() {
            let physical = raw * coeff;
            assert!(epsilon_equals_eps(physical / coeff, *raw, TOL));
        }
    }

    #[test]
    fn test_normalised_feedforward_duty() {
        let mut ctrl = build(DriveCtrlBuilder::new(), true);

        // Half of max speed at 12 V max power over the 12 V fallback nominal
        // gives half duty
        ctrl.set_velocity(2.0, 0.0);
        let measured = ctrl.state_velocity();

        // Synthetic sensor velocity at half duty corresponds to half the
        // free speed through the velocity coefficient
        let expected = 0.5 * 2048.0 * 6000.0 / 60.0 / 10.0 * ctrl.sensor_velocity_coefficient();
        assert!(epsilon_equals_eps(measured, expected, TOL));
    }

    #[test]
    fn test_calibrated_feedforward_clamped() {
        let ctrl = build(DriveCtrlBuilder::new(), false);

        // ks + kv * v within bounds
        assert!(epsilon_equals_eps(
            ctrl.velocity_to_voltage(2.0),
            0.6 + 2.5 * 2.0,
            TOL
        ));
        assert!(epsilon_equals_eps(
            ctrl.velocity_to_voltage(-2.0),
            -0.6 - 2.5 * 2.0,
            TOL
        ));

        // Clamped to the voltage bound
        assert!(epsilon_equals_eps(ctrl.velocity_to_voltage(100.0), 12.0, TOL));
        assert!(epsilon_equals_eps(ctrl.velocity_to_voltage(-100.0), -12.0, TOL));
    }

    #[test]
    fn test_closed_loop_setpoint_conversion() {
        let mut ctrl = build(
            DriveCtrlBuilder::new().with_pid_gains(PidGains {
                p: 0.02,
                i: 0.0,
                d: 0.01,
            }),
            true,
        );

        // The sim driver reaches raw setpoints instantly, so the measured
        // physical velocity equals the demand exactly (round-trip law)
        ctrl.set_velocity(1.5, 0.0);
        assert!(epsilon_equals_eps(ctrl.state_velocity(), 1.5, TOL));
    }

    #[test]
    fn test_failed_configure_continues() {
        let driver = SimModuleDriver::new(2048.0, 6000.0).with_failing_configure();
        let mut ctrl = DriveCtrlBuilder::new()
            .with_voltage_compensation(10.0)
            .build(
                Box::new(driver),
                &test_module_config(),
                test_feedforward(true),
            );

        // Configuration failed but the controller still dispatches commands
        ctrl.set_velocity(4.0, 0.25);
        assert!(ctrl.state_velocity() > 0.0);
    }
}
