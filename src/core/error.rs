use chrono::NaiveDate;
use thiserror::Error;

/// Failures a simulation run can report before its day loop starts. The loop
/// itself never fails: price lookups are total and ledger math is plain
/// arithmetic.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SimulationError {
    #[error("end date {end} precedes start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },

    #[error("date range spans {days} days, more than the {limit}-day limit")]
    RangeTooLong { days: i64, limit: i64 },
}
