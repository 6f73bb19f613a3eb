use serde::Serialize;

use super::aggregator::{Metric, PeriodSummary, ReportTable};

/// Shown wherever a value is missing.
pub const PLACEHOLDER: &str = "-";

/// `1234.5` -> `$1,234.50`. Missing or non-finite values render as `-`.
pub fn format_currency(value: Option<f64>, symbol: &str) -> String {
    let v = match value {
        Some(v) if v.is_finite() => v,
        _ => return PLACEHOLDER.to_string(),
    };

    let cents = (v.abs() * 100.0).round() as u64;
    let whole = group_thousands(cents / 100);
    let sign = if v < 0.0 && cents > 0 { "-" } else { "" };

    format!("{}{}{}.{:02}", sign, symbol, whole, cents % 100)
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `135` -> `2h 15m`, `45` -> `45m`, `180` -> `3h`.
pub fn format_minutes(minutes: Option<i64>) -> String {
    let m = match minutes {
        Some(m) => m,
        None => return PLACEHOLDER.to_string(),
    };

    let sign = if m < 0 { "-" } else { "" };
    let m = m.abs();
    let (h, rest) = (m / 60, m % 60);

    match (h, rest) {
        (0, r) => format!("{}{}m", sign, r),
        (h, 0) => format!("{}{}h", sign, h),
        (h, r) => format!("{}{}h {}m", sign, h, r),
    }
}

/// Fractional hours as a label, e.g. `160.5` -> `160h 30m`.
pub fn format_hours(hours: Option<f64>) -> String {
    match hours {
        Some(h) if h.is_finite() => format_minutes(Some((h * 60.0).round() as i64)),
        _ => PLACEHOLDER.to_string(),
    }
}

pub fn format_days(days: i64) -> String {
    if days == 1 {
        "1 day".to_string()
    } else {
        format!("{} days", days)
    }
}

pub fn format_cell(value: Option<f64>, metric: Metric, currency: &str) -> String {
    match metric {
        Metric::NetSalary => format_currency(value, currency),
        Metric::Hours => format_hours(value),
    }
}

#[derive(Debug, Serialize)]
pub struct SummaryLabels {
    pub work: String,
    pub leave: String,
    pub net_salary: String,
}

pub fn summary_labels(summary: &PeriodSummary, currency: &str) -> SummaryLabels {
    SummaryLabels {
        work: format_minutes(Some(summary.work_minutes)),
        leave: format_days(summary.leave_days),
        net_salary: format_currency(summary.net_salary, currency),
    }
}

/// The table as display strings: header row, one row per employee and a
/// closing totals row.
pub fn table_cells(table: &ReportTable, currency: &str) -> Vec<Vec<String>> {
    let mut out = Vec::with_capacity(table.rows.len() + 2);

    let mut header = vec!["Employee".to_string()];
    header.extend(table.columns.iter().cloned());
    out.push(header);

    for row in &table.rows {
        let mut line = vec![row.label.clone()];
        line.extend(row.cells.iter().map(|c| format_cell(*c, table.metric, currency)));
        line.push(format_cell(row.total, table.metric, currency));
        out.push(line);
    }

    let totals = table.column_totals();
    let grand = totals
        .iter()
        .flatten()
        .fold(None, |acc: Option<f64>, v| Some(acc.unwrap_or(0.0) + v));
    let mut footer = vec!["Total".to_string()];
    footer.extend(totals.iter().map(|c| format_cell(*c, table.metric, currency)));
    footer.push(format_cell(grand, table.metric, currency));
    out.push(footer);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_salary_is_a_placeholder() {
        assert_eq!(format_currency(None, "$"), "-");
        assert_eq!(format_currency(Some(f64::NAN), "$"), "-");
        assert_eq!(format_currency(Some(f64::INFINITY), "$"), "-");
    }

    #[test]
    fn currency_groups_thousands() {
        assert_eq!(format_currency(Some(0.0), "$"), "$0.00");
        assert_eq!(format_currency(Some(999.999), "$"), "$1,000.00");
        assert_eq!(format_currency(Some(1234567.5), "$"), "$1,234,567.50");
        assert_eq!(format_currency(Some(-42.1), "€"), "-€42.10");
    }

    #[test]
    fn minute_labels() {
        assert_eq!(format_minutes(Some(135)), "2h 15m");
        assert_eq!(format_minutes(Some(45)), "45m");
        assert_eq!(format_minutes(Some(180)), "3h");
        assert_eq!(format_minutes(Some(0)), "0m");
        assert_eq!(format_minutes(None), "-");
        assert_eq!(format_hours(Some(160.5)), "160h 30m");
    }

    #[test]
    fn day_labels() {
        assert_eq!(format_days(1), "1 day");
        assert_eq!(format_days(6), "6 days");
    }
}
