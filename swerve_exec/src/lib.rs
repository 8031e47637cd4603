//! # Swerve drive library.
//!
//! This library allows other crates in the workspace to access items defined
//! inside the swerve drive crate.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Global data store for the executable
pub mod data_store;

/// Per-module drive controller - converts physical speed demands into motor
/// controller commands
pub mod drive_ctrl;

/// Drivetrain control module - the per-cycle supervisor composing kinematics,
/// odometry and the module controllers
pub mod drivetrain;

/// Heading sensor interface - yaw angle and angular rate from the gyro
/// collaborator
pub mod imu;

/// Kinematics - transform between chassis speeds and module states
pub mod kinematics;

/// Localisation module - odometry integration and the lag compensation pose
/// buffer
pub mod loc;
