use chrono::Datelike;

use super::error::SimulationError;
use super::prices::PriceOracle;
use super::schedule::{is_expense_due, is_salary_due};
use super::types::{
    ChartPoint, Inputs, Precision, SimulationDataPoint, SimulationResults,
};

/// Upper bound on the day loop (~100 years), so a malformed date range can
/// never turn into unbounded work.
pub const MAX_SIMULATED_DAYS: i64 = 36_600;

/// Target number of chart points; the sampler strides the full series down
/// to roughly this many entries.
const CHART_TARGET_POINTS: usize = 50;

/// Cash plus BTC units for one scenario. The fiat-only scenario simply
/// never touches `btc_units`.
#[derive(Debug, Default)]
struct Holdings {
    cash: f64,
    btc_units: f64,
}

impl Holdings {
    /// Converts the entire positive cash balance into BTC at the day's
    /// price. A negative balance is left alone; it carries forward until
    /// future salary lifts it above zero.
    fn sweep_into_btc(&mut self, price: f64) {
        if self.cash > 0.0 {
            self.btc_units += self.cash / price;
            self.cash = 0.0;
        }
    }

    /// Waterfall for the liquidation scenario: cash first, then a partial
    /// sale sized to the shortfall, then a full liquidation. Whatever still
    /// cannot be covered is absorbed; cash never goes negative here.
    fn pay_expense_liquidating(&mut self, amount: f64, price: f64) {
        if self.cash >= amount {
            self.cash -= amount;
            return;
        }
        let shortfall = amount - self.cash;
        let units_needed = shortfall / price;
        if self.btc_units >= units_needed {
            self.btc_units -= units_needed;
            self.cash = 0.0;
        } else {
            self.cash += self.btc_units * price;
            self.btc_units = 0.0;
            if self.cash >= amount {
                self.cash -= amount;
            } else {
                self.cash = 0.0;
            }
        }
    }
}

/// Two independent compounding multipliers, each advanced exactly once per
/// calendar-year transition. The first year of a run always uses 1.0.
#[derive(Debug)]
struct InflationTrack {
    salary_multiplier: f64,
    expense_multiplier: f64,
    last_year: i32,
}

impl InflationTrack {
    fn new(start_year: i32) -> Self {
        Self {
            salary_multiplier: 1.0,
            expense_multiplier: 1.0,
            last_year: start_year,
        }
    }

    // The driver advances one day at a time, so each boundary is seen once.
    fn advance_to(&mut self, year: i32, salary_growth_rate: f64, expense_inflation_rate: f64) {
        if year > self.last_year {
            self.salary_multiplier *= 1.0 + salary_growth_rate;
            self.expense_multiplier *= 1.0 + expense_inflation_rate;
            self.last_year = year;
        }
    }
}

#[derive(Debug, Default)]
struct RunningTotals {
    salary_fiat: f64,
    expenses_fiat: f64,
    salary_btc: f64,
    expenses_btc: f64,
}

/// Runs the day-by-day projection of all three scenarios over the inclusive
/// date range. Pure in `(inputs, oracle)`: the same pair always produces
/// bit-identical results.
pub fn run_simulation(
    inputs: &Inputs,
    oracle: &PriceOracle,
) -> Result<SimulationResults, SimulationError> {
    if inputs.end_date < inputs.start_date {
        return Err(SimulationError::EndBeforeStart {
            start: inputs.start_date,
            end: inputs.end_date,
        });
    }
    let total_days = (inputs.end_date - inputs.start_date).num_days() + 1;
    if total_days > MAX_SIMULATED_DAYS {
        return Err(SimulationError::RangeTooLong {
            days: total_days,
            limit: MAX_SIMULATED_DAYS,
        });
    }

    let mut fiat_only = Holdings::default();
    let mut accumulate = Holdings::default();
    let mut liquidate = Holdings::default();
    let mut totals = RunningTotals::default();
    let mut inflation = InflationTrack::new(inputs.start_date.year());

    let mut data_points: Vec<SimulationDataPoint> = Vec::new();
    let mut last_recorded_month = inputs.start_date.month();

    let mut date = inputs.start_date;
    while date <= inputs.end_date {
        inflation.advance_to(
            date.year(),
            inputs.salary_growth_rate,
            inputs.expense_inflation_rate,
        );
        let price = oracle.price_on_or_before(date);

        if is_salary_due(date, inputs.salary_day) {
            let salary = inputs.salary * inflation.salary_multiplier;
            fiat_only.cash += salary;
            accumulate.cash += salary;
            liquidate.cash += salary;
            totals.salary_fiat += salary;
            totals.salary_btc += salary / price;
        }

        // Declared order decides who gets paid first when the liquidation
        // scenario runs dry mid-day.
        for expense in &inputs.expenses {
            if !is_expense_due(expense, date) {
                continue;
            }
            let amount = expense.amount * inflation.expense_multiplier;
            fiat_only.cash -= amount;
            accumulate.cash -= amount;
            liquidate.pay_expense_liquidating(amount, price);
            totals.expenses_fiat += amount;
            totals.expenses_btc += amount / price;
        }

        accumulate.sweep_into_btc(price);
        liquidate.sweep_into_btc(price);

        let record = match inputs.precision {
            Precision::Daily => true,
            Precision::Monthly => {
                let weekly_sample = date.day() % 7 == 1;
                let month_changed = date.month() != last_recorded_month;
                if month_changed {
                    last_recorded_month = date.month();
                }
                weekly_sample || month_changed || date == inputs.end_date
            }
        };
        if record {
            data_points.push(SimulationDataPoint {
                date,
                fiat_balance: fiat_only.cash,
                btc_balance: accumulate.btc_units * price,
                btc_amount: accumulate.btc_units,
                btc_with_expenses_balance: liquidate.btc_units * price + liquidate.cash,
                btc_with_expenses_amount: liquidate.btc_units,
                total_salary_received: totals.salary_fiat,
                total_expenses_paid: totals.expenses_fiat,
            });
        }

        // One day at a time, recorded or not, so no due date is skipped.
        let Some(next) = date.succ_opt() else { break };
        date = next;
    }

    let last = *data_points
        .last()
        .expect("final day of a non-empty range is always recorded");

    Ok(SimulationResults {
        final_fiat_balance: last.fiat_balance,
        final_btc_balance: last.btc_balance,
        final_btc_amount: last.btc_amount,
        final_btc_with_expenses_balance: last.btc_with_expenses_balance,
        final_btc_with_expenses_amount: last.btc_with_expenses_amount,
        btc_gain_percentage: gain_percentage(last.btc_balance, last.fiat_balance),
        btc_with_expenses_gain_percentage: gain_percentage(
            last.btc_with_expenses_balance,
            last.fiat_balance,
        ),
        total_salary_received: totals.salary_fiat,
        total_expenses_paid: totals.expenses_fiat,
        total_salary_received_btc: totals.salary_btc,
        total_expenses_paid_btc: totals.expenses_btc,
        chart_data: sample_chart(&data_points),
        data_points,
    })
}

/// Relative gain of a BTC scenario over holding fiat. The absolute-value
/// denominator keeps the metric finite when the fiat balance is negative.
fn gain_percentage(final_btc: f64, final_fiat: f64) -> f64 {
    if final_fiat != 0.0 {
        (final_btc - final_fiat) / final_fiat.abs() * 100.0
    } else if final_btc > 0.0 {
        100.0
    } else {
        0.0
    }
}

/// Downsamples the full series for charting: every `stride`-th point plus
/// the final one, balances rounded to whole currency units. The last chart
/// entry always carries the last recorded date.
pub fn sample_chart(points: &[SimulationDataPoint]) -> Vec<ChartPoint> {
    let stride = (points.len() / CHART_TARGET_POINTS).max(1);
    points
        .iter()
        .enumerate()
        .filter(|(index, _)| index % stride == 0 || *index == points.len() - 1)
        .map(|(_, point)| ChartPoint {
            period: point.date,
            fiat: point.fiat_balance.round(),
            btc: point.btc_balance.round(),
            btc_with_expenses: point.btc_with_expenses_balance.round(),
        })
        .collect()
}
