//! Simulation calendar snapshot.

/// Calendar and time fields read from the engine at one callback.
///
/// All fields use the engine's own conventions: months 1-12, days of the
/// month 1-31, hours 0-23, minutes 1-60.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimClock {
    /// The "current" simulation year.
    pub year: i32,
    /// Month of the year (1-12).
    pub month: u32,
    /// Day of the month (1-31).
    pub day_of_month: u32,
    /// Day of the year (1-366).
    pub day_of_year: u32,
    /// Day of the week (1-7).
    pub day_of_week: u32,
    /// Hour of the day (0-23).
    pub hour: u32,
    /// Minutes into the hour (1-60).
    pub minutes: u32,
    /// Time of day in hours at the end of the current time step.
    pub current_time: f64,
    /// Cumulative simulation time from the start of the environment, in hours.
    pub current_sim_time: f64,
    /// Zone time steps per hour; constant for a run.
    pub num_time_steps_in_hour: u32,
    /// Index of the current zone time step within the hour (1-based).
    pub zone_time_step_number: u32,
}
