//! # Data Store

use crate::drivetrain;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    /// Session-elapsed time at the start of this cycle
    pub cycle_time_s: f64,

    // Drivetrain
    pub drivetrain: drivetrain::Drivetrain,
    pub drivetrain_input: drivetrain::InputData,
    pub drivetrain_output: drivetrain::OutputData,
    pub drivetrain_status_rpt: drivetrain::StatusReport,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle, sets
    /// the 1Hz cycle flag and latches this cycle's timestamp.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64) {
        self.is_1_hz_cycle = self.num_cycles % (cycle_frequency_hz as u128) == 0;

        self.drivetrain_output = drivetrain::OutputData::default();
        self.drivetrain_status_rpt = drivetrain::StatusReport::default();

        self.cycle_time_s = util::session::get_elapsed_seconds();
        self.drivetrain_input = drivetrain::InputData {
            time_s: self.cycle_time_s,
        };
    }
}
