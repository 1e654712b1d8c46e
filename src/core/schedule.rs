use chrono::{Datelike, NaiveDate};

use super::types::{Expense, Schedule};

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        _ => 28,
    }
}

/// Salary lands on `salary_day`, clamped to the last day of short months so
/// a day-31 payday still fires in February instead of being skipped.
pub fn is_salary_due(date: NaiveDate, salary_day: u32) -> bool {
    let target = salary_day.min(days_in_month(date.year(), date.month()));
    date.day() == target
}

pub fn is_expense_due(expense: &Expense, date: NaiveDate) -> bool {
    match expense.schedule {
        Schedule::Monthly { day } => {
            let target = day.min(days_in_month(date.year(), date.month()));
            date.day() == target
        }
        Schedule::Weekly { weekday } => date.weekday().num_days_from_sunday() == weekday,
    }
}
