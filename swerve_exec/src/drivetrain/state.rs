//! Implementations for the Drivetrain state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::Serialize;
use std::sync::Arc;

// Internal
use super::{DriftCorrector, DrivetrainError, Params, DEFENSIVE_ANGLES_DEG};
use crate::drive_ctrl::{
    DriveCtrl, DriveCtrlBuilder, FeedforwardConfig, ModuleConfig, ModuleDriver,
};
use crate::imu::HeadingSensor;
use crate::kinematics::{ChassisSpeeds, ModuleState, SwerveKinematics, NUM_MODULES};
use crate::loc::{LagCompBuffer, Odometry, Pose};
use util::{maths, module::State, params, session::Session};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drivetrain control module state
pub struct Drivetrain {
    pub(crate) params: Params,

    kinematics: SwerveKinematics,

    /// The four module controllers in the fixed FL/FR/BL/BR ordering.
    modules: Vec<DriveCtrl>,

    heading_sensor: Option<Box<dyn HeadingSensor>>,

    odometry: Odometry,

    /// Shared so that consumers on other threads can query past poses while
    /// the control loop keeps writing.
    lag_comp: Arc<LagCompBuffer>,

    drift_corrector: Option<DriftCorrector>,

    /// The latched chassis speed demand, updated by the public setters and
    /// consumed on the next cycle.
    desired_speeds: ChassisSpeeds,

    /// Process-wide throttle applied to the demand each cycle.
    speed_modifier: f64,

    /// When true a zero demand locks the wheels into the X stance.
    defensive: bool,

    pub(crate) report: StatusReport,

    prev_time_s: Option<f64>,
}

/// Initialisation data for the Drivetrain.
pub struct InitData {
    /// Path to the parameter file, relative to the software root params
    /// directory.
    pub params_path: &'static str,

    /// The four module motor controller drivers in FL/FR/BL/BR order.
    pub drivers: Vec<Box<dyn ModuleDriver>>,

    /// The chassis heading sensor.
    pub heading_sensor: Box<dyn HeadingSensor>,
}

/// Input data for one Drivetrain cycle.
#[derive(Clone, Copy, Debug, Default)]
pub struct InputData {
    /// Timestamp of this cycle.
    ///
    /// Units: seconds since the session epoch
    pub time_s: f64,
}

/// Output data from one Drivetrain cycle.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct OutputData {
    /// The module states dispatched to the module controllers this cycle.
    pub module_states: [ModuleState; NUM_MODULES],

    /// The pose estimate after this cycle's odometry update.
    pub pose: Pose,

    /// The chassis speeds recovered from the measured module states.
    pub chassis_speeds: ChassisSpeeds,
}

/// Status report for Drivetrain processing.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct StatusReport {
    /// True if the wheel speed demands had to be desaturated this cycle.
    pub wheel_speeds_limited: bool,

    /// True if the defensive X stance was commanded this cycle.
    pub defensive_stance: bool,

    /// True if drift correction modified the angular demand this cycle.
    pub drift_correction_active: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Drivetrain {
    fn default() -> Self {
        Self {
            params: Params::default(),
            kinematics: SwerveKinematics::from_chassis_dims(0.0, 0.0),
            modules: Vec::new(),
            heading_sensor: None,
            odometry: Odometry::default(),
            lag_comp: Arc::new(LagCompBuffer::default()),
            drift_corrector: None,
            desired_speeds: ChassisSpeeds::default(),
            speed_modifier: 1.0,
            defensive: false,
            report: StatusReport::default(),
            prev_time_s: None,
        }
    }
}

impl State for Drivetrain {
    type InitData = InitData;
    type InitError = params::LoadError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = DrivetrainError;

    /// Initialise the Drivetrain module.
    ///
    /// Expected init data is the parameter file path plus the hardware
    /// collaborators.
    fn init(&mut self, init_data: Self::InitData, _session: &Session) -> Result<(), Self::InitError> {
        // Load the parameters
        let params: Params = params::load(init_data.params_path)?;

        *self = Self::from_parts(params, init_data.drivers, init_data.heading_sensor);

        Ok(())
    }

    /// Perform cyclic processing of the Drivetrain.
    ///
    /// Each cycle:
    /// 1. Update odometry from the measured module states (in simulation the
    ///    commanded states are used instead, after they are computed).
    /// 2. If the latched demand is exactly zero and the defensive flag is
    ///    set, lock the wheels into the X stance, bypassing kinematics.
    /// 3. Otherwise scale the demand by the speed modifier, apply drift
    ///    correction, run the kinematics and desaturate.
    /// 4. Dispatch the resulting module states to the module controllers.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        // Clear the status report
        self.report = StatusReport::default();

        if self.modules.len() != NUM_MODULES || self.heading_sensor.is_none() {
            return Err(DrivetrainError::NotInitialised);
        }

        let heading_rad = self.gyro_rotation_deg().to_radians();

        let dt_s = match self.prev_time_s {
            Some(t0) => input_data.time_s - t0,
            None => 0.0,
        };
        self.prev_time_s = Some(input_data.time_s);

        // Measured module states, used both for odometry and for the output
        let mut measured = [ModuleState::default(); NUM_MODULES];
        for (i, module) in self.modules.iter().enumerate() {
            measured[i] = module.state();
        }

        // On hardware, odometry follows what the wheels actually did, not
        // what was requested of them
        if !self.params.sim_mode {
            let achieved = self.kinematics.to_chassis_speeds(&measured);
            let pose = self.odometry.update(input_data.time_s, heading_rad, &achieved);
            self.lag_comp.add_sample(input_data.time_s, pose);
        }

        let commanded: [ModuleState; NUM_MODULES];

        if self.desired_speeds.is_zero() && self.defensive {
            self.report.defensive_stance = true;

            let mut states = [ModuleState::default(); NUM_MODULES];
            for i in 0..NUM_MODULES {
                states[i] = ModuleState {
                    speed_ms: 0.0,
                    angle_rad: DEFENSIVE_ANGLES_DEG[i].to_radians(),
                };
            }

            for (i, module) in self.modules.iter_mut().enumerate() {
                module.set_velocity(states[i].speed_ms, states[i].angle_rad);
            }

            commanded = states;
        } else {
            // The modifier scales a copy, the latched demand itself is left
            // untouched so repeated cycles are idempotent
            let mut speeds = self.desired_speeds.scaled(self.speed_modifier);

            if let Some(ref mut corrector) = self.drift_corrector {
                let heading_deg = self.odometry.pose().heading_deg();
                self.report.drift_correction_active =
                    corrector.apply(&mut speeds, heading_deg, dt_s);
            }

            let mut states = self.kinematics.to_module_states(&speeds);
            self.report.wheel_speeds_limited =
                SwerveKinematics::desaturate_wheel_speeds(&mut states, self.params.max_speed_ms);

            for (i, module) in self.modules.iter_mut().enumerate() {
                module.set_velocity(states[i].speed_ms, states[i].angle_rad);
            }

            // Without real sensors the commanded states are the best
            // available estimate of the chassis motion
            if self.params.sim_mode {
                let achieved = self.kinematics.to_chassis_speeds(&states);
                let pose = self.odometry.update(input_data.time_s, heading_rad, &achieved);
                self.lag_comp.add_sample(input_data.time_s, pose);
            }

            commanded = states;
        }

        let output = OutputData {
            module_states: commanded,
            pose: self.odometry.pose(),
            chassis_speeds: self.kinematics.to_chassis_speeds(&measured),
        };

        trace!(
            "Drivetrain output:\n    states: {:?}\n    pose: {:?}",
            output.module_states,
            output.pose
        );

        Ok((output, self.report))
    }
}

impl Drivetrain {
    /// Build a Drivetrain from already-loaded parameters and the hardware
    /// collaborators.
    pub fn from_parts(
        params: Params,
        drivers: Vec<Box<dyn ModuleDriver>>,
        heading_sensor: Box<dyn HeadingSensor>,
    ) -> Self {
        let module_config = ModuleConfig {
            wheel_diameter_m: params.wheel_diameter_m,
            drive_reduction: params.drive_reduction,
            ticks_per_rev: params.ticks_per_rev,
        };

        let feedforward = FeedforwardConfig {
            normalised: params.enable_velocity_normalisation,
            max_speed_ms: params.max_speed_ms,
            max_power_v: params.max_power_v,
            static_gain_v: params.static_gain_v,
            velocity_gain_vs_m: params.velocity_gain_vs_m,
        };

        let mut modules = Vec::with_capacity(drivers.len());
        for driver in drivers {
            let mut builder = DriveCtrlBuilder::new();
            if let Some(gains) = params.drive_pid_gains {
                builder = builder.with_pid_gains(gains);
            }
            if let Some(voltage) = params.nominal_voltage_v {
                builder = builder.with_voltage_compensation(voltage);
            }
            if let Some(limit) = params.current_limit_a {
                builder = builder.with_current_limit(limit);
            }

            let mut module = builder.build(driver, &module_config, feedforward);
            if let Some(ramp_rate_s) = params.ramp_rate_s {
                module.config_ramp_rate(ramp_rate_s);
            }

            modules.push(module);
        }

        let initial_pose = Pose::new(
            params.initial_pose_x_m,
            params.initial_pose_y_m,
            params.initial_heading_rad,
        );

        let gyro_base_deg = if params.invert_gyro { 360.0 } else { 0.0 };
        let gyro_heading_rad = (gyro_base_deg - heading_sensor.yaw_deg()).to_radians();

        let drift_corrector = if params.enable_drift_correction {
            Some(DriftCorrector::new(params.drift_pid_gains))
        } else {
            None
        };

        Self {
            kinematics: SwerveKinematics::from_chassis_dims(
                params.track_width_m,
                params.wheelbase_m,
            ),
            modules,
            heading_sensor: Some(heading_sensor),
            odometry: Odometry::new(initial_pose, gyro_heading_rad),
            lag_comp: Arc::new(LagCompBuffer::new(params.lag_comp_capacity)),
            drift_corrector,
            desired_speeds: ChassisSpeeds::default(),
            speed_modifier: 1.0,
            defensive: params.defensive,
            report: StatusReport::default(),
            prev_time_s: None,
            params,
        }
    }

    // ---- COMMAND SETTERS ----
    //
    // Setters only latch intent, the demand takes effect on the next cycle.

    /// Latch a chassis speed demand.
    ///
    /// With `field_oriented` the translation components are interpreted in
    /// the field frame and rotated into the body frame using the current
    /// heading.
    pub fn drive(&mut self, vx_ms: f64, vy_ms: f64, omega_rads: f64, field_oriented: bool) {
        self.desired_speeds = if field_oriented {
            let heading_rad = self.gyro_rotation_deg().to_radians();
            ChassisSpeeds::from_field_relative(vx_ms, vy_ms, omega_rads, heading_rad)
        } else {
            ChassisSpeeds::new(vx_ms, vy_ms, omega_rads)
        };
    }

    /// Latch a field-oriented translation demand while holding a heading.
    ///
    /// The angular demand is a proportional law on the heading error with a
    /// rate damping term.
    pub fn drive_with_heading(&mut self, vx_ms: f64, vy_ms: f64, heading_deg: f64) {
        let angle_deg = self.gyro_rotation_deg();
        let rate_dps = -self.turn_rate_dps();

        let error_deg = maths::angle_delta_deg(heading_deg, angle_deg);
        let yaw_cmd_dps = -error_deg * self.params.heading_kp - rate_dps;

        self.drive(vx_ms, vy_ms, yaw_cmd_dps.to_radians(), true);
    }

    /// Latch a zero demand, stopping all modules on the next cycle.
    pub fn stop_modules(&mut self) {
        self.desired_speeds = ChassisSpeeds::default();
    }

    /// Latch a chassis speed demand directly.
    pub fn set_chassis_speeds(&mut self, speeds: ChassisSpeeds) {
        self.desired_speeds = speeds;
    }

    /// Latch a demand expressed as explicit module states.
    ///
    /// The states are converted back to the equivalent chassis speeds so
    /// that the normal per-cycle pipeline (modifier, drift correction,
    /// desaturation) still applies.
    pub fn set_module_states(&mut self, states: &[ModuleState; NUM_MODULES]) {
        self.desired_speeds = self.kinematics.to_chassis_speeds(states);
    }

    /// Set the process-wide speed throttle.
    pub fn set_speed_modifier(&mut self, modifier: f64) {
        self.speed_modifier = modifier;
    }

    /// Enable or disable the defensive X stance on zero demand.
    pub fn set_defensive(&mut self, defensive: bool) {
        self.defensive = defensive;
    }

    /// Re-seed the pose estimate.
    pub fn reset_pose(&mut self, pose: Pose) {
        let heading_rad = self.gyro_rotation_deg().to_radians();
        self.odometry.reset_pose(pose, heading_rad);
    }

    /// Zero the gyro so the current facing becomes "forwards".
    pub fn zero_gyro(&mut self) {
        if let Some(sensor) = self.heading_sensor.as_mut() {
            sensor.reset();
        }
    }

    // ---- GETTERS ----

    /// The current pose estimate.
    pub fn pose(&self) -> Pose {
        self.odometry.pose()
    }

    /// The measured state of each module.
    pub fn module_states(&self) -> [ModuleState; NUM_MODULES] {
        let mut states = [ModuleState::default(); NUM_MODULES];
        for (i, module) in self.modules.iter().enumerate().take(NUM_MODULES) {
            states[i] = module.state();
        }
        states
    }

    /// The chassis speeds recovered from the measured module states.
    pub fn chassis_speeds(&self) -> ChassisSpeeds {
        self.kinematics.to_chassis_speeds(&self.module_states())
    }

    /// The currently latched chassis speed demand.
    pub fn desired_speeds(&self) -> ChassisSpeeds {
        self.desired_speeds
    }

    /// A shared handle to the pose history buffer.
    pub fn lag_comp(&self) -> Arc<LagCompBuffer> {
        Arc::clone(&self.lag_comp)
    }

    /// The pose estimate at a past timestamp.
    pub fn lag_comp_pose(&self, time_s: f64) -> Pose {
        self.lag_comp.get_sample(time_s)
    }

    /// The chassis heading in degrees, in the counter-clockwise-positive
    /// chassis convention.
    pub fn gyro_rotation_deg(&self) -> f64 {
        let yaw_deg = self
            .heading_sensor
            .as_ref()
            .map(|s| s.yaw_deg())
            .unwrap_or(0.0);

        let base_deg = if self.params.invert_gyro { 360.0 } else { 0.0 };
        base_deg - yaw_deg
    }

    /// The measured chassis yaw rate in degrees/second.
    pub fn turn_rate_dps(&self) -> f64 {
        self.heading_sensor
            .as_ref()
            .map(|s| s.rate_dps())
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::drive_ctrl::{PidGains, SimModuleDriver};
    use crate::imu::SimHeadingSensor;
    use std::sync::Mutex;
    use util::maths::epsilon_equals_eps;

    const TOL: f64 = 1e-9;

    /// Heading sensor handle that tests can keep mutating after handing the
    /// drivetrain its copy.
    #[derive(Clone, Default)]
    struct SharedHeadingSensor(Arc<Mutex<SimHeadingSensor>>);

    impl SharedHeadingSensor {
        fn set_yaw_deg(&self, yaw_deg: f64) {
            self.0.lock().unwrap().set_yaw_deg(yaw_deg);
        }
    }

    impl HeadingSensor for SharedHeadingSensor {
        fn yaw_deg(&self) -> f64 {
            self.0.lock().unwrap().yaw_deg()
        }

        fn rate_dps(&self) -> f64 {
            self.0.lock().unwrap().rate_dps()
        }

        fn reset(&mut self) {
            self.0.lock().unwrap().reset();
        }
    }

    fn test_params() -> Params {
        Params {
            track_width_m: 0.6,
            wheelbase_m: 0.5,
            wheel_diameter_m: 0.1016,
            drive_reduction: 1.0 / 6.86,
            ticks_per_rev: 2048.0,
            max_speed_ms: 4.0,
            max_power_v: 12.0,
            enable_velocity_normalisation: true,
            static_gain_v: 0.6,
            velocity_gain_vs_m: 2.5,
            drive_pid_gains: Some(PidGains {
                p: 0.02,
                i: 0.0,
                d: 0.01,
            }),
            nominal_voltage_v: None,
            current_limit_a: None,
            ramp_rate_s: None,
            invert_gyro: false,
            sim_mode: false,
            defensive: true,
            enable_drift_correction: true,
            drift_pid_gains: PidGains {
                p: 0.07,
                i: 0.0,
                d: 0.004,
            },
            heading_kp: 1.0,
            lag_comp_capacity: 25,
            initial_pose_x_m: 0.0,
            initial_pose_y_m: 0.0,
            initial_heading_rad: 0.0,
        }
    }

    fn test_drivetrain(params: Params) -> (Drivetrain, SharedHeadingSensor) {
        let sensor = SharedHeadingSensor::default();

        let drivers: Vec<Box<dyn ModuleDriver>> = (0..NUM_MODULES)
            .map(|_| Box::new(SimModuleDriver::new(2048.0, 6000.0)) as Box<dyn ModuleDriver>)
            .collect();

        let dt = Drivetrain::from_parts(params, drivers, Box::new(sensor.clone()));
        (dt, sensor)
    }

    #[test]
    fn test_proc_before_init_errors() {
        let mut dt = Drivetrain::default();
        assert!(dt.proc(&InputData { time_s: 0.0 }).is_err());
    }

    #[test]
    fn test_defensive_stance() {
        let (mut dt, _sensor) = test_drivetrain(test_params());

        dt.stop_modules();
        let (output, report) = dt.proc(&InputData { time_s: 0.0 }).unwrap();

        assert!(report.defensive_stance);

        // Angles are the exact X pattern, not kinematics-derived
        let expected_deg: [f64; 4] = [-45.0, 45.0, 45.0, -45.0];
        for i in 0..NUM_MODULES {
            assert_eq!(output.module_states[i].speed_ms, 0.0);
            assert!(epsilon_equals_eps(
                output.module_states[i].angle_rad,
                expected_deg[i].to_radians(),
                TOL
            ));
        }

        // Any nonzero demand leaves the stance
        dt.drive(1.0, 0.0, 0.0, false);
        let (_, report) = dt.proc(&InputData { time_s: 0.02 }).unwrap();
        assert!(!report.defensive_stance);
    }

    #[test]
    fn test_speed_modifier_is_idempotent() {
        let (mut dt, _sensor) = test_drivetrain(test_params());

        dt.set_speed_modifier(0.5);
        dt.drive(2.0, 0.0, 0.0, false);

        // The same demand cycled repeatedly always yields the same output:
        // the modifier scales a copy, never the latched demand itself
        for i in 0..5 {
            let (output, _) = dt.proc(&InputData { time_s: i as f64 * 0.02 }).unwrap();
            for state in output.module_states.iter() {
                assert!(epsilon_equals_eps(state.speed_ms, 1.0, TOL));
            }
        }

        assert!(epsilon_equals_eps(dt.desired_speeds().vx_ms, 2.0, TOL));
    }

    #[test]
    fn test_desaturation_reported() {
        let (mut dt, _sensor) = test_drivetrain(test_params());

        dt.drive(100.0, 0.0, 0.0, false);
        let (output, report) = dt.proc(&InputData { time_s: 0.0 }).unwrap();

        assert!(report.wheel_speeds_limited);
        for state in output.module_states.iter() {
            assert!(state.speed_ms.abs() <= 4.0 + TOL);
        }
    }

    #[test]
    fn test_drift_correction_opposes_heading_error() {
        let (mut dt, sensor) = test_drivetrain(test_params());
        let kin = SwerveKinematics::from_chassis_dims(0.6, 0.5);

        dt.drive(1.0, 0.0, 0.0, false);

        // First translating cycle latches the heading
        dt.proc(&InputData { time_s: 0.0 }).unwrap();

        // The chassis yaws away: gyro heading becomes +10 degrees
        sensor.set_yaw_deg(-10.0);

        let (output, report) = dt.proc(&InputData { time_s: 0.02 }).unwrap();
        assert!(report.drift_correction_active);

        // The commanded module states embed a restoring (negative) rotation
        let commanded = kin.to_chassis_speeds(&output.module_states);
        assert!(commanded.omega_rads < 0.0);
    }

    #[test]
    fn test_drift_correction_bounded_on_straight_line() {
        let mut params = test_params();
        params.sim_mode = true;
        let (mut dt, _sensor) = test_drivetrain(params);

        dt.drive(1.0, 0.0, 0.0, false);

        // With no actual drift the correction must not inject any rotation
        for i in 0..100 {
            let (output, _) = dt.proc(&InputData { time_s: i as f64 * 0.02 }).unwrap();
            assert!(epsilon_equals_eps(output.pose.heading_rad, 0.0, TOL));
        }
    }

    #[test]
    fn test_sim_mode_odometry_follows_commands() {
        let mut params = test_params();
        params.sim_mode = true;
        let (mut dt, _sensor) = test_drivetrain(params);

        dt.drive(1.0, 0.0, 0.0, false);
        dt.proc(&InputData { time_s: 0.0 }).unwrap();
        let (output, _) = dt.proc(&InputData { time_s: 1.0 }).unwrap();

        assert!(epsilon_equals_eps(output.pose.position_m[0], 1.0, TOL));
        assert!(epsilon_equals_eps(output.pose.position_m[1], 0.0, TOL));
    }

    #[test]
    fn test_lag_comp_samples_written() {
        let mut params = test_params();
        params.sim_mode = true;
        let (mut dt, _sensor) = test_drivetrain(params);

        let handle = dt.lag_comp();
        assert!(handle.is_empty());

        dt.drive(1.0, 0.0, 0.0, false);
        for i in 0..10 {
            dt.proc(&InputData { time_s: i as f64 }).unwrap();
        }

        assert_eq!(handle.len(), 10);

        // A past query interpolates between cycle samples
        let p = dt.lag_comp_pose(4.5);
        assert!(epsilon_equals_eps(p.position_m[0], 4.5, TOL));
    }

    #[test]
    fn test_drive_with_heading_law() {
        let (mut dt, _sensor) = test_drivetrain(test_params());

        // Heading 0, rate 0, target 90 degrees: the demand follows the
        // literal proportional law on the signed error
        dt.drive_with_heading(1.0, 0.0, 90.0);

        let expected_omega = (-90.0f64).to_radians();
        assert!(epsilon_equals_eps(
            dt.desired_speeds().omega_rads,
            expected_omega,
            TOL
        ));
    }

    #[test]
    fn test_gyro_inversion() {
        let mut params = test_params();
        params.invert_gyro = true;
        let (dt, sensor) = test_drivetrain(params);

        sensor.set_yaw_deg(90.0);
        assert!(epsilon_equals_eps(dt.gyro_rotation_deg(), 270.0, TOL));
    }

    #[test]
    fn test_reset_pose() {
        let (mut dt, _sensor) = test_drivetrain(test_params());

        dt.reset_pose(Pose::new(3.0, -2.0, 0.5));
        let pose = dt.pose();

        assert!(epsilon_equals_eps(pose.position_m[0], 3.0, TOL));
        assert!(epsilon_equals_eps(pose.position_m[1], -2.0, TOL));
        assert!(epsilon_equals_eps(pose.heading_rad, 0.5, TOL));
    }
}
