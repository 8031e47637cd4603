//! Main swerve drive executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Command acquisition (here a scripted bench sequence)
//!         - Drivetrain control processing
//!         - Cycle management
//!
//! # Modules
//!
//! All modules (e.g. `drivetrain`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use swerve_lib::{
    data_store::DataStore,
    drive_ctrl::{ModuleDriver, SimModuleDriver},
    drivetrain,
    imu::SimHeadingSensor,
    kinematics::NUM_MODULES,
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{info, warn};
use std::thread;
use std::time::{Duration, Instant};

// Internal
use util::{
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.02;

/// Number of cycles per second
const CYCLE_FREQUENCY_HZ: f64 = 1.0 / CYCLE_PERIOD_S;

/// Number of cycles the bench sequence runs for.
const NUM_DEMO_CYCLES: u128 = 1000;

/// Encoder resolution of the simulated drive motors.
const SIM_TICKS_PER_REV: f64 = 2048.0;

/// Free speed of the simulated drive motors.
const SIM_FREE_SPEED_RPM: f64 = 6380.0;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("swerve_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Swerve Drive Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- INITIALISE DATASTORE ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    // ---- INITIALISE MODULES ----

    // Simulated hardware collaborators, in the fixed FL/FR/BL/BR ordering
    let drivers: Vec<Box<dyn ModuleDriver>> = (0..NUM_MODULES)
        .map(|_| {
            Box::new(SimModuleDriver::new(SIM_TICKS_PER_REV, SIM_FREE_SPEED_RPM))
                as Box<dyn ModuleDriver>
        })
        .collect();

    ds.drivetrain
        .init(
            drivetrain::InitData {
                params_path: "drivetrain.toml",
                drivers,
                heading_sensor: Box::new(SimHeadingSensor::new()),
            },
            &session,
        )
        .wrap_err("Failed to initialise Drivetrain")?;
    info!("Drivetrain init complete");

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(CYCLE_FREQUENCY_HZ);

        // ---- COMMAND PROCESSING ----

        exec_demo_command(&mut ds);

        // ---- CONTROL ALGORITHM PROCESSING ----

        // Drivetrain processing
        match ds.drivetrain.proc(&ds.drivetrain_input) {
            Ok((o, r)) => {
                ds.drivetrain_output = o;
                ds.drivetrain_status_rpt = r;
            }
            Err(e) => warn!("Error during Drivetrain processing: {}", e),
        };

        // ---- TELEMETRY ----

        if ds.is_1_hz_cycle {
            let pose = ds.drivetrain_output.pose;
            info!(
                "Pose: ({:.02}, {:.02}) m, {:.01} deg",
                pose.position_m[0],
                pose.position_m[1],
                pose.heading_deg()
            );
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(CYCLE_PERIOD_S).checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - CYCLE_PERIOD_S
                );
                ds.num_consec_cycle_overruns += 1;
            }
        }

        // Increment cycle counter
        ds.num_cycles += 1;

        if ds.num_cycles >= NUM_DEMO_CYCLES {
            info!("End of bench sequence reached, stopping");
            break;
        }
    }

    // ---- SHUTDOWN ----

    info!("End of execution");

    Ok(())
}

/// Scripted bench sequence exercising the drivetrain command surface.
///
/// Heading-hold demands sample the current heading, so they are re-latched
/// every cycle of their phase rather than once.
fn exec_demo_command(ds: &mut DataStore) {
    match ds.num_cycles {
        0 => {
            info!("Driving forward");
            ds.drivetrain.drive(1.0, 0.0, 0.0, false);
        }
        200 => {
            info!("Strafing left, field oriented");
            ds.drivetrain.drive(0.0, 1.0, 0.0, true);
        }
        400 => {
            info!("Rotating in place");
            ds.drivetrain.drive(0.0, 0.0, 1.0, false);
        }
        600 => {
            info!("Translating while holding a 90 degree heading");
        }
        800 => {
            info!("Stopping, defensive stance");
            ds.drivetrain.stop_modules();
        }
        _ => (),
    }

    if (600..800).contains(&ds.num_cycles) {
        ds.drivetrain.drive_with_heading(0.5, 0.0, 90.0);
    }
}
