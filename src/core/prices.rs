use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};

/// Price returned when no historical price exists within the look-back
/// window.
pub const FALLBACK_PRICE: f64 = 42_250.0;

/// How many calendar days before the requested date a lookup will probe.
/// Covers weekends plus extended exchange holidays.
const LOOKBACK_DAYS: u64 = 7;

/// One raw row of a historical price export: a `MM/DD/YYYY` date and a
/// decimal price that may carry thousands separators.
#[derive(Debug, Clone)]
pub struct PriceRow {
    pub date: String,
    pub price: String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PriceSource {
    Exact,
    Nearby { days_back: u32 },
    Fallback,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PriceLookup {
    pub price: f64,
    pub source: PriceSource,
}

/// Immutable date-to-price series. Built once, then shared by reference
/// across any number of simulation runs.
#[derive(Debug)]
pub struct PriceOracle {
    series: BTreeMap<NaiveDate, f64>,
    accepted: usize,
}

impl PriceOracle {
    /// Builds the series from raw rows. Rows with an unparseable date or
    /// price are skipped rather than failing the load; `accepted_rows`
    /// reports how many made it in. A later row for the same date replaces
    /// the earlier one.
    pub fn load(rows: &[PriceRow]) -> Self {
        let mut series = BTreeMap::new();
        let mut accepted = 0;
        for row in rows {
            let Some(date) = parse_row_date(&row.date) else {
                eprintln!("Skipping price row with unparseable date {:?}", row.date);
                continue;
            };
            let Some(price) = parse_row_price(&row.price) else {
                eprintln!("Skipping price row for {date} with bad price {:?}", row.price);
                continue;
            };
            series.insert(date, price);
            accepted += 1;
        }
        Self { series, accepted }
    }

    pub fn accepted_rows(&self) -> usize {
        self.accepted
    }

    /// Total lookup: the exact date, then up to `LOOKBACK_DAYS` earlier
    /// days one at a time, then the fixed fallback. The source tag tells
    /// the caller how degraded the answer is.
    pub fn lookup(&self, date: NaiveDate) -> PriceLookup {
        if let Some(&price) = self.series.get(&date) {
            return PriceLookup {
                price,
                source: PriceSource::Exact,
            };
        }
        for days_back in 1..=LOOKBACK_DAYS {
            let Some(earlier) = date.checked_sub_days(Days::new(days_back)) else {
                break;
            };
            if let Some(&price) = self.series.get(&earlier) {
                return PriceLookup {
                    price,
                    source: PriceSource::Nearby {
                        days_back: days_back as u32,
                    },
                };
            }
        }
        PriceLookup {
            price: FALLBACK_PRICE,
            source: PriceSource::Fallback,
        }
    }

    pub fn price_on_or_before(&self, date: NaiveDate) -> f64 {
        self.lookup(date).price
    }

    /// First and last dated price, or `None` for an empty series.
    pub fn available_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = *self.series.keys().next()?;
        let last = *self.series.keys().next_back()?;
        Some((first, last))
    }
}

fn parse_row_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%m/%d/%Y").ok()
}

fn parse_row_price(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|price| price.is_finite() && *price > 0.0)
}
