use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One employee's payroll for one month, as entered by the payroll process.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct MonthlyPayroll {
    pub id: u64,
    pub employee_id: u64,

    /// Always the first day of the month.
    #[schema(value_type = String, format = "date", example = "2026-01-01")]
    pub month: NaiveDate,

    #[schema(example = 160.5)]
    pub total_hours: f64,
    #[schema(example = 50000.0)]
    pub base_salary: f64,
    #[schema(example = 5000.0)]
    pub bonus: f64,
    #[schema(example = 2000.0)]
    pub deductions: f64,
    #[schema(example = 53000.0)]
    pub net_salary: f64,
}

pub fn net_salary(base_salary: f64, bonus: f64, deductions: f64) -> f64 {
    base_salary + bonus - deductions
}

/// Snaps any date to the first day of its month.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

#[cfg(test)]
pub(crate) fn sample(employee_id: u64, month: NaiveDate, hours: f64, net: f64) -> MonthlyPayroll {
    MonthlyPayroll {
        id: 0,
        employee_id,
        month,
        total_hours: hours,
        base_salary: net,
        bonus: 0.0,
        deductions: 0.0,
        net_salary: net,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_is_base_plus_bonus_minus_deductions() {
        assert_eq!(net_salary(50000.0, 5000.0, 2000.0), 53000.0);
    }

    #[test]
    fn month_start_snaps_to_first() {
        let d = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(month_start(d), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }
}
