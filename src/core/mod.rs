mod engine;
mod error;
mod prices;
mod schedule;
mod types;

pub use engine::{MAX_SIMULATED_DAYS, run_simulation, sample_chart};
pub use error::SimulationError;
pub use prices::{FALLBACK_PRICE, PriceLookup, PriceOracle, PriceRow, PriceSource};
pub use schedule::{days_in_month, is_expense_due, is_leap_year, is_salary_due};
pub use types::{
    ChartPoint, Expense, Inputs, Precision, Schedule, SimulationDataPoint, SimulationResults,
};
