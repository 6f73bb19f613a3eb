use actix_web::{HttpResponse, http::header, web};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::{
        employee::{EMPLOYEE_COLUMNS, find_employee},
        payroll::{PAYROLL_COLUMNS, year_bounds},
    },
    auth::auth::AuthUser,
    clock::Clock,
    config::Config,
    error::{AppError, FieldErrors, db_error},
    model::{
        attendance::AttendanceEvent, employee::Employee, leave_request::LeaveRequest,
        leave_request::LeaveStatus, payroll::MonthlyPayroll,
    },
    reporting::{
        aggregator::{Metric, PeriodSummary, ReportTable, monthly_table, summarize},
        export,
        period::{Period, month_of},
        reducer::reduce_daily,
        render::{SummaryLabels, summary_labels, table_cells},
    },
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct SummaryQuery {
    /// Defaults to the caller's own employee record
    pub employee_id: Option<u64>,
    /// `YYYY-MM` or `YYYY`; defaults to the current month
    #[param(example = "2024-06")]
    pub period: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SummaryResponse {
    #[schema(example = "John Doe")]
    pub employee: String,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub summary: PeriodSummary,
    #[schema(value_type = Object, example = json!({
        "work": "152h 30m", "leave": "3 days", "net_salary": "$4,250.00"
    }))]
    pub labels: SummaryLabels,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
    Pdf,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PayrollReportQuery {
    /// Defaults to the current year
    #[param(example = 2024)]
    pub year: Option<i32>,
    #[serde(default)]
    #[param(inline)]
    pub format: ExportFormat,
    /// `net_salary` (default) or `hours`
    pub metric: Option<Metric>,
}

#[derive(Serialize, ToSchema)]
pub struct PayrollReportResponse {
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub table: ReportTable,
    /// Display strings, header and totals rows included
    pub rendered: Vec<Vec<String>>,
}

fn parse_period(raw: Option<&str>, clock: &dyn Clock) -> Result<Period, AppError> {
    match raw.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => p
            .parse()
            .map_err(|e: crate::reporting::period::PeriodParseError| {
                FieldErrors::single("period", e.to_string())
            }),
        None => Ok(month_of(clock.today())),
    }
}

/// Totals for one employee and period: work time, approved leave days and
/// net salary, with display labels.
#[utoipa::path(
    get,
    path = "/api/reports/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Period summary", body = SummaryResponse),
        (status = 403, description = "Employees may only read their own summary"),
        (status = 404, description = "Employee not found"),
        (status = 422, description = "Malformed period")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn period_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    clock: web::Data<dyn Clock>,
    query: web::Query<SummaryQuery>,
) -> Result<HttpResponse, AppError> {
    let employee_id = match query.employee_id {
        Some(id) => id,
        None => auth.own_employee_id()?,
    };
    if !auth.can_read_employee(employee_id) {
        return Err(AppError::Forbidden("Not allowed to view this summary".into()));
    }

    let period = parse_period(query.period.as_deref(), clock.get_ref())?;

    let employee = find_employee(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| AppError::not_found("Employee"))?;

    let leaves = sqlx::query_as::<_, LeaveRequest>(
        r#"
        SELECT id, employee_id, start_date, end_date, leave_type, reason, status,
               manager_notes, decided_by, version, created_at, updated_at
        FROM leave_requests
        WHERE employee_id = ? AND status = ? AND start_date <= ? AND end_date >= ?
        "#,
    )
    .bind(employee_id)
    .bind(LeaveStatus::Approved.as_ref())
    .bind(period.end())
    .bind(period.start())
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("Failed to load leave for summary"))?;

    let payrolls = sqlx::query_as::<_, MonthlyPayroll>(&format!(
        "SELECT {} FROM monthly_payrolls WHERE employee_id = ? AND month BETWEEN ? AND ?",
        PAYROLL_COLUMNS
    ))
    .bind(employee_id)
    .bind(period.start())
    .bind(period.end())
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("Failed to load payroll for summary"))?;

    // attendance is only needed when payroll has no hours for the period
    let days = if payrolls.is_empty() {
        let events = sqlx::query_as::<_, AttendanceEvent>(
            r#"
            SELECT id, employee_id, occurred_at, kind, source
            FROM attendance_log
            WHERE employee_id = ? AND occurred_at >= ? AND occurred_at < ?
            ORDER BY occurred_at, id
            "#,
        )
        .bind(employee_id)
        .bind(period.start().and_time(chrono::NaiveTime::MIN))
        .bind((period.end() + chrono::Duration::days(1)).and_time(chrono::NaiveTime::MIN))
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("Failed to load attendance for summary"))?;
        reduce_daily(&events)
    } else {
        Vec::new()
    };

    let summary = summarize(employee_id, period, &leaves, &payrolls, &days);
    let labels = summary_labels(&summary, &config.currency_symbol);

    Ok(HttpResponse::Ok().json(SummaryResponse {
        employee: employee.full_name(),
        summary,
        labels,
    }))
}

fn attachment(content_type: &str, filename: String, body: Vec<u8>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(content_type)
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ))
        .body(body)
}

fn export_failed(e: anyhow::Error) -> AppError {
    error!(error = %e, "Failed to export payroll report");
    AppError::Backend
}

/// Monthly payroll figures for every employee employed during the year.
#[utoipa::path(
    get,
    path = "/api/reports/payroll",
    params(PayrollReportQuery),
    responses(
        (status = 200, description = "JSON table, or a CSV/PDF attachment", body = PayrollReportResponse),
        (status = 403, description = "HR/Admin only"),
        (status = 422, description = "Year out of range")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn payroll_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    clock: web::Data<dyn Clock>,
    query: web::Query<PayrollReportQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;

    let year = query.year.unwrap_or_else(|| clock.today().year());
    let (start, end) = year_bounds(year)?;
    let metric = query.metric.unwrap_or(Metric::NetSalary);

    let employees = sqlx::query_as::<_, Employee>(&format!(
        "SELECT {} FROM employees WHERE hire_date <= ? ORDER BY last_name, first_name, id",
        EMPLOYEE_COLUMNS
    ))
    .bind(end)
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("Failed to load employees for report"))?;

    let payrolls = sqlx::query_as::<_, MonthlyPayroll>(&format!(
        "SELECT {} FROM monthly_payrolls WHERE month BETWEEN ? AND ?",
        PAYROLL_COLUMNS
    ))
    .bind(start)
    .bind(end)
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("Failed to load payrolls for report"))?;

    let table = monthly_table(&employees, year, &payrolls, metric);
    let currency = config.currency_symbol.as_str();
    let stem = format!("payroll-{}-{}", metric.as_ref(), year);

    info!(year, rows = table.rows.len(), format = ?query.format, "Payroll report built");

    let response = match query.format {
        ExportFormat::Json => HttpResponse::Ok().json(PayrollReportResponse {
            rendered: table_cells(&table, currency),
            table,
        }),
        ExportFormat::Csv => attachment(
            "text/csv; charset=utf-8",
            format!("{}.csv", stem),
            export::to_csv(&table, currency).map_err(export_failed)?,
        ),
        ExportFormat::Pdf => attachment(
            "application/pdf",
            format!("{}.pdf", stem),
            export::to_pdf(&table, currency).map_err(export_failed)?,
        ),
    };

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::NaiveDate;

    fn clock() -> FixedClock {
        FixedClock(NaiveDate::from_ymd_opt(2024, 6, 17).unwrap().and_hms_opt(9, 0, 0).unwrap())
    }

    #[test]
    fn period_defaults_to_current_month() {
        assert_eq!(
            parse_period(None, &clock()).unwrap(),
            Period::Month { year: 2024, month: 6 }
        );
        assert_eq!(parse_period(Some(" "), &clock()).unwrap().to_string(), "2024-06");
    }

    #[test]
    fn explicit_periods_parse() {
        assert_eq!(parse_period(Some("2023"), &clock()).unwrap(), Period::Year(2023));
        match parse_period(Some("2024-13"), &clock()) {
            Err(AppError::Validation(errors)) => assert!(errors.get("period").is_some()),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn export_format_defaults_to_json() {
        let q: PayrollReportQuery = serde_json::from_str(r#"{"year": 2024}"#).unwrap();
        assert_eq!(q.format, ExportFormat::Json);
        assert_eq!(q.metric, None);

        let q: PayrollReportQuery =
            serde_json::from_str(r#"{"format": "csv", "metric": "hours"}"#).unwrap();
        assert_eq!(q.format, ExportFormat::Csv);
        assert_eq!(q.metric, Some(Metric::Hours));
    }

    #[test]
    fn attachments_carry_a_filename() {
        let resp = attachment("text/csv", "payroll-net_salary-2024.csv".into(), b"a,b".to_vec());
        let disposition = resp
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap();
        assert_eq!(disposition, "attachment; filename=\"payroll-net_salary-2024.csv\"");
    }
}
