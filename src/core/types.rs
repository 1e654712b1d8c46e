use chrono::NaiveDate;
use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Precision {
    Daily,
    Monthly,
}

/// Recurrence rule for an expense. Monthly days beyond the length of a short
/// month are clamped to its last day; weekly days count from Sunday (0-6).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Schedule {
    Monthly { day: u32 },
    Weekly { weekday: u32 },
}

#[derive(Debug, Clone)]
pub struct Expense {
    pub name: String,
    pub amount: f64,
    pub schedule: Schedule,
}

#[derive(Debug, Clone)]
pub struct Inputs {
    pub salary: f64,
    pub salary_day: u32,
    pub salary_growth_rate: f64,
    pub expenses: Vec<Expense>,
    pub expense_inflation_rate: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub precision: Precision,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationDataPoint {
    pub date: NaiveDate,
    pub fiat_balance: f64,
    pub btc_balance: f64,
    pub btc_amount: f64,
    pub btc_with_expenses_balance: f64,
    pub btc_with_expenses_amount: f64,
    pub total_salary_received: f64,
    pub total_expenses_paid: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub period: NaiveDate,
    pub fiat: f64,
    pub btc: f64,
    pub btc_with_expenses: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResults {
    pub data_points: Vec<SimulationDataPoint>,
    pub final_fiat_balance: f64,
    pub final_btc_balance: f64,
    pub final_btc_amount: f64,
    pub final_btc_with_expenses_balance: f64,
    pub final_btc_with_expenses_amount: f64,
    pub btc_gain_percentage: f64,
    pub btc_with_expenses_gain_percentage: f64,
    pub total_salary_received: f64,
    pub total_expenses_paid: f64,
    pub total_salary_received_btc: f64,
    pub total_expenses_paid_btc: f64,
    pub chart_data: Vec<ChartPoint>,
}
