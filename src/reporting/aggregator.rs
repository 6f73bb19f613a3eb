use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

use crate::model::{
    attendance::DailyAttendance,
    employee::Employee,
    leave_request::{LeaveRequest, LeaveStatus},
    payroll::MonthlyPayroll,
};

use super::period::{Period, month_of, overlap_days};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkSource {
    /// Hours entered by the payroll process.
    Payroll,
    /// Minutes derived from reduced clock events.
    Attendance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub employee_id: u64,
    pub period: Period,
    pub work_minutes: i64,
    pub work_source: WorkSource,
    pub leave_days: i64,
    pub net_salary: Option<f64>,
}

/// Approved leave days falling inside `period`.
pub fn leave_days(leaves: &[LeaveRequest], period: &Period) -> i64 {
    leaves
        .iter()
        .filter(|l| l.status == LeaveStatus::Approved)
        .map(|l| overlap_days(l.start_date, l.end_date, period))
        .sum()
}

fn payroll_in<'a>(
    payrolls: &'a [MonthlyPayroll],
    employee_id: u64,
    period: &'a Period,
) -> impl Iterator<Item = &'a MonthlyPayroll> + 'a {
    payrolls
        .iter()
        .filter(move |p| p.employee_id == employee_id && period.contains(p.month))
}

/// Totals for one employee over one period.
///
/// Work time comes from payroll rows when any exist for the period; the
/// reduced attendance days are only used when payroll has nothing.
pub fn summarize(
    employee_id: u64,
    period: Period,
    leaves: &[LeaveRequest],
    payrolls: &[MonthlyPayroll],
    days: &[DailyAttendance],
) -> PeriodSummary {
    let own_leaves: Vec<LeaveRequest> = leaves
        .iter()
        .filter(|l| l.employee_id == employee_id)
        .cloned()
        .collect();

    let rows: Vec<&MonthlyPayroll> = payroll_in(payrolls, employee_id, &period).collect();

    let (work_minutes, work_source) = if rows.is_empty() {
        let minutes = days
            .iter()
            .filter(|d| d.employee_id == employee_id && period.contains(d.date))
            .filter_map(DailyAttendance::worked_minutes)
            .sum();
        (minutes, WorkSource::Attendance)
    } else {
        let hours: f64 = rows.iter().map(|p| p.total_hours).sum();
        ((hours * 60.0).round() as i64, WorkSource::Payroll)
    };

    let net_salary = if rows.is_empty() {
        None
    } else {
        Some(rows.iter().map(|p| p.net_salary).sum())
    };

    PeriodSummary {
        employee_id,
        period,
        work_minutes,
        work_source,
        leave_days: leave_days(&own_leaves, &period),
        net_salary,
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Metric {
    NetSalary,
    Hours,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub employee_id: u64,
    pub label: String,
    pub cells: Vec<Option<f64>>,
    pub total: Option<f64>,
}

/// Rows are employees, columns are months followed by a total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTable {
    pub title: String,
    pub metric: Metric,
    pub columns: Vec<String>,
    pub rows: Vec<ReportRow>,
}

impl ReportTable {
    pub fn column_totals(&self) -> Vec<Option<f64>> {
        let width = self.columns.len().saturating_sub(1);
        (0..width)
            .map(|i| sum_present(self.rows.iter().map(|r| r.cells.get(i).copied().flatten())))
            .collect()
    }
}

fn sum_present(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values.flatten().fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

/// Per-month payroll figures for every employee employed during `year`.
pub fn monthly_table(
    employees: &[Employee],
    year: i32,
    payrolls: &[MonthlyPayroll],
    metric: Metric,
) -> ReportTable {
    let period = Period::Year(year);
    let months = period.months();

    let mut columns: Vec<String> = months.iter().map(Period::label).collect();
    columns.push("Total".to_string());

    let rows = employees
        .iter()
        .filter(|e| e.employed_during(period.start(), period.end()))
        .map(|e| {
            let cells: Vec<Option<f64>> = months
                .iter()
                .map(|m| {
                    sum_present(
                        payrolls
                            .iter()
                            .filter(|p| p.employee_id == e.id && month_of(p.month) == *m)
                            .map(|p| Some(value_of(p, metric))),
                    )
                })
                .collect();

            ReportRow {
                employee_id: e.id,
                label: e.full_name(),
                total: sum_present(cells.iter().copied()),
                cells,
            }
        })
        .collect();

    let title = match metric {
        Metric::NetSalary => format!("Net salary {}", year),
        Metric::Hours => format!("Work hours {}", year),
    };

    ReportTable {
        title,
        metric,
        columns,
        rows,
    }
}

fn value_of(p: &MonthlyPayroll, metric: Metric) -> f64 {
    match metric {
        Metric::NetSalary => p.net_salary,
        Metric::Hours => p.total_hours,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{employee, leave_request, payroll};
    use chrono::{NaiveDate, NaiveTime};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn approved(id: u64, employee_id: u64, start: &str, end: &str) -> LeaveRequest {
        let mut l = leave_request::sample(id, employee_id, d(start), d(end));
        l.status = LeaveStatus::Approved;
        l
    }

    fn worked(employee_id: u64, date: &str, from: &str, to: &str) -> DailyAttendance {
        let t = |s: &str| NaiveTime::parse_from_str(s, "%H:%M").ok();
        DailyAttendance {
            employee_id,
            date: d(date),
            check_in: t(from),
            check_out: t(to),
        }
    }

    #[test]
    fn only_approved_leaves_count() {
        let june = Period::month(2024, 6).unwrap();
        let mut pending = leave_request::sample(2, 7, d("2024-06-10"), d("2024-06-12"));
        pending.status = LeaveStatus::Pending;
        let mut rejected = pending.clone();
        rejected.status = LeaveStatus::Rejected;

        let leaves = vec![approved(1, 7, "2024-06-25", "2024-07-05"), pending, rejected];

        assert_eq!(leave_days(&leaves, &june), 6);
        assert_eq!(leave_days(&leaves, &Period::month(2024, 7).unwrap()), 5);
    }

    #[test]
    fn payroll_hours_take_precedence_over_attendance() {
        let june = Period::month(2024, 6).unwrap();
        let payrolls = vec![payroll::sample(7, d("2024-06-01"), 150.5, 3000.0)];
        let days = vec![worked(7, "2024-06-03", "09:00", "17:00")];

        let summary = summarize(7, june, &[], &payrolls, &days);

        assert_eq!(summary.work_source, WorkSource::Payroll);
        assert_eq!(summary.work_minutes, 9030);
        assert_eq!(summary.net_salary, Some(3000.0));
    }

    #[test]
    fn attendance_fills_in_without_payroll() {
        let june = Period::month(2024, 6).unwrap();
        let days = vec![
            worked(7, "2024-06-03", "09:00", "17:00"),
            worked(7, "2024-06-04", "09:00", "12:30"),
            worked(7, "2024-06-05", "09:00", ""),
            worked(7, "2024-07-01", "09:00", "17:00"),
            worked(8, "2024-06-03", "09:00", "17:00"),
        ];

        let summary = summarize(7, june, &[], &[], &days);

        assert_eq!(summary.work_source, WorkSource::Attendance);
        assert_eq!(summary.work_minutes, 8 * 60 + 3 * 60 + 30);
        assert_eq!(summary.net_salary, None);
    }

    #[test]
    fn yearly_summary_adds_months() {
        let payrolls = vec![
            payroll::sample(7, d("2024-01-01"), 100.0, 1000.0),
            payroll::sample(7, d("2024-02-01"), 110.0, 1100.0),
            payroll::sample(7, d("2023-12-01"), 90.0, 900.0),
            payroll::sample(8, d("2024-01-01"), 10.0, 100.0),
        ];
        let leaves = vec![
            approved(1, 7, "2023-12-30", "2024-01-02"),
            approved(2, 8, "2024-03-01", "2024-03-10"),
        ];

        let summary = summarize(7, Period::Year(2024), &leaves, &payrolls, &[]);

        assert_eq!(summary.work_minutes, 210 * 60);
        assert_eq!(summary.net_salary, Some(2100.0));
        assert_eq!(summary.leave_days, 2);
    }

    #[test]
    fn monthly_table_has_twelve_months_and_total() {
        let mut gone = employee::sample(9);
        gone.leaving_date = Some(d("2023-06-30"));
        let employees = vec![employee::sample(7), employee::sample(8), gone];
        let payrolls = vec![
            payroll::sample(7, d("2024-01-01"), 100.0, 1000.0),
            payroll::sample(7, d("2024-03-01"), 100.0, 1200.0),
            payroll::sample(8, d("2024-03-01"), 100.0, 800.0),
        ];

        let table = monthly_table(&employees, 2024, &payrolls, Metric::NetSalary);

        assert_eq!(table.columns.len(), 13);
        assert_eq!(table.columns[12], "Total");
        assert_eq!(table.rows.len(), 2);

        let first = &table.rows[0];
        assert_eq!(first.cells[0], Some(1000.0));
        assert_eq!(first.cells[1], None);
        assert_eq!(first.total, Some(2200.0));

        let totals = table.column_totals();
        assert_eq!(totals.len(), 12);
        assert_eq!(totals[2], Some(2000.0));
        assert_eq!(totals[5], None);
    }

    #[test]
    fn hours_metric_reads_total_hours() {
        let employees = vec![employee::sample(7)];
        let payrolls = vec![payroll::sample(7, d("2024-05-01"), 162.5, 1000.0)];

        let table = monthly_table(&employees, 2024, &payrolls, Metric::Hours);

        assert_eq!(table.title, "Work hours 2024");
        assert_eq!(table.rows[0].cells[4], Some(162.5));
    }
}
