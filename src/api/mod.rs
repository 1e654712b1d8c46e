use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::core::{
    Expense, Inputs, Precision, PriceOracle, PriceRow, Schedule, run_simulation,
};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliPrecision {
    Daily,
    Monthly,
}

impl From<CliPrecision> for Precision {
    fn from(value: CliPrecision) -> Self {
        match value {
            CliPrecision::Daily => Precision::Daily,
            CliPrecision::Monthly => Precision::Monthly,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ApiPrecision {
    Daily,
    Monthly,
}

impl From<ApiPrecision> for CliPrecision {
    fn from(value: ApiPrecision) -> Self {
        match value {
            ApiPrecision::Daily => CliPrecision::Daily,
            ApiPrecision::Monthly => CliPrecision::Monthly,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ApiFrequency {
    Monthly,
    Weekly,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExpensePayload {
    name: String,
    amount: f64,
    frequency: ApiFrequency,
    day: Option<u32>,
    day_of_week: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    salary: Option<f64>,
    salary_day: Option<u32>,
    salary_growth_rate: Option<f64>,
    expense_inflation_rate: Option<f64>,
    start_date: Option<String>,
    end_date: Option<String>,
    precision: Option<ApiPrecision>,
    expenses: Option<Vec<ExpensePayload>>,
}

#[derive(Parser, Debug)]
#[command(
    name = "hodlsim",
    about = "What-if bitcoin savings simulator (salary DCA vs fiat, with expense liquidation)"
)]
struct Cli {
    #[arg(long, default_value_t = 2500.0, help = "Monthly salary in fiat")]
    salary: f64,
    #[arg(
        long,
        default_value_t = 1,
        help = "Day of month the salary lands (1-31, clamped to short months)"
    )]
    salary_day: u32,
    #[arg(long, default_value_t = 0.0, help = "Annual salary growth in percent")]
    salary_growth_rate: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Annual expense inflation in percent"
    )]
    expense_inflation_rate: f64,
    #[arg(long, default_value = "2020-01-01", help = "First simulated day, YYYY-MM-DD")]
    start_date: String,
    #[arg(long, default_value = "2024-12-31", help = "Last simulated day, YYYY-MM-DD")]
    end_date: String,
    #[arg(
        long,
        value_enum,
        default_value_t = CliPrecision::Monthly,
        help = "Data-point recording density"
    )]
    precision: CliPrecision,
    #[arg(
        long,
        value_name = "SPEC",
        help = "Recurring expense as name:amount:monthly:DAY or name:amount:weekly:DOW (0=Sunday)"
    )]
    expense: Vec<String>,
}

#[derive(Clone)]
struct AppState {
    oracle: Arc<PriceOracle>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PriceRangeResponse {
    accepted_rows: usize,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

fn parse_iso_date(raw: &str, flag: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("{flag} must be a YYYY-MM-DD date, got {raw:?}"))
}

fn parse_expense_spec(raw: &str) -> Result<Expense, String> {
    let parts: Vec<&str> = raw.split(':').collect();
    let [name, amount, frequency, day] = parts.as_slice() else {
        return Err(format!(
            "--expense must be name:amount:frequency:day, got {raw:?}"
        ));
    };
    let amount: f64 = amount
        .parse()
        .map_err(|_| format!("--expense amount must be numeric, got {raw:?}"))?;
    if !amount.is_finite() || amount < 0.0 {
        return Err("--expense amount must be >= 0".to_string());
    }
    let schedule = match *frequency {
        "monthly" => {
            let day: u32 = day
                .parse()
                .map_err(|_| format!("--expense monthly day must be 1-31, got {raw:?}"))?;
            if !(1..=31).contains(&day) {
                return Err("--expense monthly day must be between 1 and 31".to_string());
            }
            Schedule::Monthly { day }
        }
        "weekly" => {
            let weekday: u32 = day
                .parse()
                .map_err(|_| format!("--expense weekly day must be 0-6, got {raw:?}"))?;
            if weekday > 6 {
                return Err("--expense weekly day must be between 0 (Sunday) and 6".to_string());
            }
            Schedule::Weekly { weekday }
        }
        other => {
            return Err(format!(
                "--expense frequency must be monthly or weekly, got {other:?}"
            ));
        }
    };
    Ok(Expense {
        name: name.to_string(),
        amount,
        schedule,
    })
}

fn build_inputs(cli: Cli) -> Result<Inputs, String> {
    if !cli.salary.is_finite() || cli.salary < 0.0 {
        return Err("--salary must be >= 0".to_string());
    }
    if !(1..=31).contains(&cli.salary_day) {
        return Err("--salary-day must be between 1 and 31".to_string());
    }
    if !cli.salary_growth_rate.is_finite() || cli.salary_growth_rate < 0.0 {
        return Err("--salary-growth-rate must be >= 0".to_string());
    }
    if !cli.expense_inflation_rate.is_finite() || cli.expense_inflation_rate < 0.0 {
        return Err("--expense-inflation-rate must be >= 0".to_string());
    }

    let start_date = parse_iso_date(&cli.start_date, "--start-date")?;
    let end_date = parse_iso_date(&cli.end_date, "--end-date")?;
    if end_date < start_date {
        return Err("--end-date must be >= --start-date".to_string());
    }

    let expenses = cli
        .expense
        .iter()
        .map(|spec| parse_expense_spec(spec))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Inputs {
        salary: cli.salary,
        salary_day: cli.salary_day,
        salary_growth_rate: cli.salary_growth_rate / 100.0,
        expenses,
        expense_inflation_rate: cli.expense_inflation_rate / 100.0,
        start_date,
        end_date,
        precision: cli.precision.into(),
    })
}

fn expense_from_payload(payload: ExpensePayload) -> Result<Expense, String> {
    if !payload.amount.is_finite() || payload.amount < 0.0 {
        return Err(format!("expense {:?} amount must be >= 0", payload.name));
    }
    let schedule = match payload.frequency {
        ApiFrequency::Monthly => {
            let day = payload
                .day
                .ok_or_else(|| format!("monthly expense {:?} needs a day", payload.name))?;
            if !(1..=31).contains(&day) {
                return Err(format!(
                    "monthly expense {:?} day must be between 1 and 31",
                    payload.name
                ));
            }
            Schedule::Monthly { day }
        }
        ApiFrequency::Weekly => {
            let weekday = payload
                .day_of_week
                .ok_or_else(|| format!("weekly expense {:?} needs a dayOfWeek", payload.name))?;
            if weekday > 6 {
                return Err(format!(
                    "weekly expense {:?} dayOfWeek must be between 0 and 6",
                    payload.name
                ));
            }
            Schedule::Weekly { weekday }
        }
    };
    Ok(Expense {
        name: payload.name,
        amount: payload.amount,
        schedule,
    })
}

fn inputs_from_payload(payload: SimulatePayload) -> Result<Inputs, String> {
    let mut cli = default_cli_for_api();
    if let Some(v) = payload.salary {
        cli.salary = v;
    }
    if let Some(v) = payload.salary_day {
        cli.salary_day = v;
    }
    if let Some(v) = payload.salary_growth_rate {
        cli.salary_growth_rate = v;
    }
    if let Some(v) = payload.expense_inflation_rate {
        cli.expense_inflation_rate = v;
    }
    if let Some(v) = payload.start_date {
        cli.start_date = v;
    }
    if let Some(v) = payload.end_date {
        cli.end_date = v;
    }
    if let Some(v) = payload.precision {
        cli.precision = v.into();
    }

    let mut inputs = build_inputs(cli)?;
    if let Some(expenses) = payload.expenses {
        inputs.expenses = expenses
            .into_iter()
            .map(expense_from_payload)
            .collect::<Result<Vec<_>, _>>()?;
    }
    Ok(inputs)
}

fn default_cli_for_api() -> Cli {
    Cli {
        salary: 2_500.0,
        salary_day: 1,
        salary_growth_rate: 0.0,
        expense_inflation_rate: 0.0,
        start_date: "2020-01-01".to_string(),
        end_date: "2024-12-31".to_string(),
        precision: CliPrecision::Monthly,
        expense: Vec::new(),
    }
}

#[derive(Debug, Deserialize)]
struct CsvPriceRecord {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Price")]
    price: String,
}

/// Reads an Investing.com-style historical price export. Columns other than
/// `Date` and `Price` are ignored; rows the CSV layer cannot decode are
/// skipped here, rows with bad values are skipped later by the oracle.
pub fn read_price_rows(path: &Path) -> std::io::Result<Vec<PriceRow>> {
    let file = File::open(path)?;
    let reader = ReaderBuilder::new().has_headers(true).from_reader(file);
    Ok(collect_price_rows(reader))
}

fn collect_price_rows<R: std::io::Read>(mut reader: csv::Reader<R>) -> Vec<PriceRow> {
    let mut rows = Vec::new();
    for (index, record) in reader.deserialize::<CsvPriceRecord>().enumerate() {
        match record {
            Ok(row) => rows.push(PriceRow {
                date: row.date,
                price: row.price,
            }),
            Err(e) => eprintln!("Skipping price CSV row {index}: {e}"),
        }
    }
    rows
}

pub async fn run_http_server(port: u16, prices_path: &Path) -> std::io::Result<()> {
    let rows = read_price_rows(prices_path)?;
    let oracle = PriceOracle::load(&rows);
    println!(
        "Loaded {} of {} price rows from {}",
        oracle.accepted_rows(),
        rows.len(),
        prices_path.display()
    );
    if let Some((start, end)) = oracle.available_range() {
        println!("Price data covers {start} to {end}");
    } else {
        println!("No usable price data; simulations will use the fallback price");
    }

    let state = AppState {
        oracle: Arc::new(oracle),
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/price-range", get(price_range_handler))
        .fallback(not_found_handler)
        .with_state(state);

    let listener = TcpListener::bind(addr).await?;
    println!("hodlsim HTTP API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn price_range_handler(State(state): State<AppState>) -> Response {
    let range = state.oracle.available_range();
    json_response(
        StatusCode::OK,
        PriceRangeResponse {
            accepted_rows: state.oracle.accepted_rows(),
            start: range.map(|(start, _)| start),
            end: range.map(|(_, end)| end),
        },
    )
}

async fn simulate_get_handler(
    State(state): State<AppState>,
    Query(payload): Query<SimulatePayload>,
) -> Response {
    simulate_handler_impl(state, payload).await
}

async fn simulate_post_handler(
    State(state): State<AppState>,
    Json(payload): Json<SimulatePayload>,
) -> Response {
    simulate_handler_impl(state, payload).await
}

async fn simulate_handler_impl(state: AppState, payload: SimulatePayload) -> Response {
    let inputs = match inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match run_simulation(&inputs, &state.oracle) {
        Ok(results) => json_response(StatusCode::OK, results),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    fn inputs_from_json(json: &str) -> Result<Inputs, String> {
        let payload = serde_json::from_str::<SimulatePayload>(json)
            .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
        inputs_from_payload(payload)
    }

    #[test]
    fn build_inputs_converts_percent_rates() {
        let mut cli = sample_cli();
        cli.salary_growth_rate = 10.0;
        cli.expense_inflation_rate = 2.5;
        let inputs = build_inputs(cli).expect("valid inputs");
        assert_approx(inputs.salary_growth_rate, 0.10);
        assert_approx(inputs.expense_inflation_rate, 0.025);
    }

    #[test]
    fn build_inputs_rejects_out_of_range_salary_day() {
        for bad_day in [0, 32] {
            let mut cli = sample_cli();
            cli.salary_day = bad_day;
            let err = build_inputs(cli).expect_err("must reject salary day");
            assert!(err.contains("--salary-day"));
        }
    }

    #[test]
    fn build_inputs_rejects_negative_rates() {
        let mut cli = sample_cli();
        cli.salary_growth_rate = -1.0;
        let err = build_inputs(cli).expect_err("must reject negative growth");
        assert!(err.contains("--salary-growth-rate"));
    }

    #[test]
    fn build_inputs_rejects_bad_and_inverted_dates() {
        let mut cli = sample_cli();
        cli.start_date = "01/02/2020".to_string();
        let err = build_inputs(cli).expect_err("must reject non-ISO date");
        assert!(err.contains("--start-date"));

        let mut cli = sample_cli();
        cli.start_date = "2024-01-01".to_string();
        cli.end_date = "2023-12-31".to_string();
        let err = build_inputs(cli).expect_err("must reject inverted range");
        assert!(err.contains("--end-date"));
    }

    #[test]
    fn expense_specs_parse_both_frequencies() {
        let rent = parse_expense_spec("rent:1200:monthly:3").expect("valid spec");
        assert_eq!(rent.name, "rent");
        assert_approx(rent.amount, 1200.0);
        assert_eq!(rent.schedule, Schedule::Monthly { day: 3 });

        let groceries = parse_expense_spec("groceries:85.5:weekly:6").expect("valid spec");
        assert_eq!(groceries.schedule, Schedule::Weekly { weekday: 6 });

        assert!(parse_expense_spec("rent:1200:monthly").is_err());
        assert!(parse_expense_spec("rent:abc:monthly:3").is_err());
        assert!(parse_expense_spec("rent:1200:monthly:0").is_err());
        assert!(parse_expense_spec("rent:1200:weekly:7").is_err());
        assert!(parse_expense_spec("rent:1200:yearly:3").is_err());
    }

    #[test]
    fn payload_expenses_require_matching_recurrence_field() {
        let missing_day = ExpensePayload {
            name: "rent".to_string(),
            amount: 900.0,
            frequency: ApiFrequency::Monthly,
            day: None,
            day_of_week: Some(2),
        };
        assert!(expense_from_payload(missing_day).is_err());

        let missing_weekday = ExpensePayload {
            name: "groceries".to_string(),
            amount: 60.0,
            frequency: ApiFrequency::Weekly,
            day: Some(5),
            day_of_week: None,
        };
        assert!(expense_from_payload(missing_weekday).is_err());

        let negative = ExpensePayload {
            name: "rent".to_string(),
            amount: -1.0,
            frequency: ApiFrequency::Monthly,
            day: Some(1),
            day_of_week: None,
        };
        assert!(expense_from_payload(negative).is_err());
    }

    #[test]
    fn payload_json_parses_web_keys() {
        let json = r#"{
          "salary": 3200,
          "salaryDay": 25,
          "salaryGrowthRate": 4,
          "expenseInflationRate": 2,
          "startDate": "2021-03-01",
          "endDate": "2022-03-01",
          "precision": "daily",
          "expenses": [
            { "name": "rent", "amount": 950, "frequency": "monthly", "day": 2 },
            { "name": "groceries", "amount": 70, "frequency": "weekly", "dayOfWeek": 6 }
          ]
        }"#;
        let inputs = inputs_from_json(json).expect("json should parse");

        assert_approx(inputs.salary, 3200.0);
        assert_eq!(inputs.salary_day, 25);
        assert_approx(inputs.salary_growth_rate, 0.04);
        assert_approx(inputs.expense_inflation_rate, 0.02);
        assert_eq!(inputs.precision, Precision::Daily);
        assert_eq!(inputs.expenses.len(), 2);
        assert_eq!(inputs.expenses[0].schedule, Schedule::Monthly { day: 2 });
        assert_eq!(inputs.expenses[1].schedule, Schedule::Weekly { weekday: 6 });
        assert_eq!(
            inputs.start_date,
            NaiveDate::from_ymd_opt(2021, 3, 1).expect("valid date")
        );
    }

    #[test]
    fn empty_payload_falls_back_to_defaults() {
        let inputs = inputs_from_json("{}").expect("defaults should be valid");
        assert_approx(inputs.salary, 2_500.0);
        assert_eq!(inputs.salary_day, 1);
        assert!(inputs.expenses.is_empty());
        assert_eq!(inputs.precision, Precision::Monthly);
    }

    #[test]
    fn csv_reader_keeps_date_and_price_columns() {
        let csv_text = "\
\"Date\",\"Price\",\"Open\",\"High\",\"Low\",\"Vol.\",\"Change %\"
\"01/03/2020\",\"7,200.0\",\"7,150.0\",\"7,250.0\",\"7,100.0\",\"42.1K\",\"0.5%\"
\"01/06/2020\",\"7,350.5\",\"7,200.0\",\"7,400.0\",\"7,180.0\",\"38.0K\",\"2.1%\"
";
        let reader = ReaderBuilder::new()
            .has_headers(true)
            .from_reader(csv_text.as_bytes());
        let rows = collect_price_rows(reader);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, "01/03/2020");
        assert_eq!(rows[0].price, "7,200.0");

        let oracle = PriceOracle::load(&rows);
        assert_eq!(oracle.accepted_rows(), 2);
    }

    #[test]
    fn simulate_response_serialization_contains_expected_fields() {
        let json = r#"{
          "salary": 7200,
          "startDate": "2020-01-01",
          "endDate": "2020-01-31",
          "precision": "daily"
        }"#;
        let inputs = inputs_from_json(json).expect("valid inputs");
        let oracle = PriceOracle::load(&[PriceRow {
            date: "01/01/2020".to_string(),
            price: "7,200.0".to_string(),
        }]);
        let results = run_simulation(&inputs, &oracle).expect("valid run");
        let body = serde_json::to_string(&results).expect("results should serialize");

        assert!(body.contains("\"dataPoints\""));
        assert!(body.contains("\"chartData\""));
        assert!(body.contains("\"finalFiatBalance\""));
        assert!(body.contains("\"finalBtcAmount\""));
        assert!(body.contains("\"btcGainPercentage\""));
        assert!(body.contains("\"totalSalaryReceivedBtc\""));
        assert!(body.contains("\"btcWithExpensesBalance\""));
    }
}
