//! Parameters structure for the Drivetrain

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::drive_ctrl::PidGains;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the Drivetrain.
#[derive(Debug, Default, Deserialize)]
pub struct Params {
    // ---- GEOMETRY ----
    /// Longitudinal distance between the front and back module pairs.
    ///
    /// Units: meters
    pub track_width_m: f64,

    /// Lateral distance between the left and right module pairs.
    ///
    /// Units: meters
    pub wheelbase_m: f64,

    /// Diameter of the drive wheels.
    ///
    /// Units: meters
    pub wheel_diameter_m: f64,

    /// Drive gear reduction, wheel revolutions per motor revolution.
    pub drive_reduction: f64,

    /// Drive encoder ticks per motor revolution.
    pub ticks_per_rev: f64,

    // ---- CAPABILITIES ----
    /// Maximum achievable module wheel speed, used for desaturation and for
    /// the normalised velocity-to-voltage law.
    ///
    /// Units: meters/second
    pub max_speed_ms: f64,

    /// Maximum voltage the drive motors may be commanded with.
    ///
    /// Units: volts
    pub max_power_v: f64,

    // ---- DRIVE MOTOR CONTROL ----
    /// If true the open-loop drive voltage is `speed / max_speed * max_power`,
    /// otherwise the calibrated static/velocity gain model is used.
    pub enable_velocity_normalisation: bool,

    /// Static gain of the calibrated velocity-to-voltage model.
    ///
    /// Units: volts
    pub static_gain_v: f64,

    /// Velocity gain of the calibrated velocity-to-voltage model.
    ///
    /// Units: volt-seconds/meter
    pub velocity_gain_vs_m: f64,

    /// Closed-loop drive velocity gains. When present the motor controllers
    /// run the velocity loop themselves and the open-loop law is unused.
    pub drive_pid_gains: Option<PidGains>,

    /// Voltage compensation saturation, or `None` to leave compensation off.
    ///
    /// Units: volts
    pub nominal_voltage_v: Option<f64>,

    /// Drive motor supply current limit, or `None` to leave the limit off.
    ///
    /// Units: amperes
    pub current_limit_a: Option<f64>,

    /// Open-loop ramp rate pushed to the drive motors, or `None` to leave
    /// the controller default.
    ///
    /// Units: seconds from neutral to full
    pub ramp_rate_s: Option<f64>,

    // ---- SENSORS ----
    /// True if the gyro yaw increases clockwise and must be inverted to match
    /// the counter-clockwise-positive chassis convention.
    pub invert_gyro: bool,

    /// In simulation there are no real module sensors, so odometry integrates
    /// the commanded module states instead of the measured ones.
    pub sim_mode: bool,

    // ---- SUPERVISORY CONTROL ----
    /// Start with the defensive (locked X) stance behaviour enabled.
    pub defensive: bool,

    /// Enable the heading drift correction applied during pure translation.
    pub enable_drift_correction: bool,

    /// Gains of the drift correction heading controller.
    pub drift_pid_gains: PidGains,

    /// Proportional gain of the heading-hold law used by
    /// [`super::Drivetrain::drive_with_heading`].
    pub heading_kp: f64,

    /// Number of pose history entries kept for latency compensation.
    pub lag_comp_capacity: usize,

    // ---- INITIAL STATE ----
    /// Field x position the pose estimate starts from.
    ///
    /// Units: meters
    pub initial_pose_x_m: f64,

    /// Field y position the pose estimate starts from.
    ///
    /// Units: meters
    pub initial_pose_y_m: f64,

    /// Heading the pose estimate starts from.
    ///
    /// Units: radians
    pub initial_heading_rad: f64,
}
