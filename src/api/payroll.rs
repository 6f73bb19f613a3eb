use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::employee::find_employee,
    auth::auth::AuthUser,
    error::{AppError, FieldErrors, db_error, is_duplicate_key},
    model::payroll::{MonthlyPayroll, month_start, net_salary},
    services::{
        audit::{self, AuditRecord},
        feed::{ChangeEvent, ChangeFeed, ChangeKind, Collection},
    },
    utils::{
        db_utils::{FilterValue, Filters, paginate},
        validation::{self, Validate},
    },
};

pub(crate) const PAYROLL_COLUMNS: &str =
    "id, employee_id, month, total_hours, base_salary, bonus, deductions, net_salary";

#[derive(Deserialize, ToSchema)]
pub struct CreatePayroll {
    #[schema(example = 1001)]
    pub employee_id: u64,

    /// Any day of the month; stored as the first day.
    #[schema(example = "2026-01-01", value_type = String, format = "date")]
    pub month: NaiveDate,

    #[schema(example = 160.5)]
    #[serde(default)]
    pub total_hours: f64,

    #[schema(example = 50000.0)]
    pub base_salary: f64,

    #[schema(example = 5000.0)]
    #[serde(default)]
    pub bonus: f64,

    #[schema(example = 2000.0)]
    #[serde(default)]
    pub deductions: f64,
}

impl Validate for CreatePayroll {
    fn validate(&self, errors: &mut FieldErrors) {
        validation::non_negative(errors, "total_hours", Some(self.total_hours));
        validation::non_negative(errors, "base_salary", Some(self.base_salary));
        validation::non_negative(errors, "bonus", Some(self.bonus));
        validation::non_negative(errors, "deductions", Some(self.deductions));
    }
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePayroll {
    #[schema(example = 158.0)]
    pub total_hours: Option<f64>,

    #[schema(example = 52000.0)]
    pub base_salary: Option<f64>,

    #[schema(example = 6000.0)]
    pub bonus: Option<f64>,

    #[schema(example = 2500.0)]
    pub deductions: Option<f64>,
}

impl Validate for UpdatePayroll {
    fn validate(&self, errors: &mut FieldErrors) {
        if self.total_hours.is_none()
            && self.base_salary.is_none()
            && self.bonus.is_none()
            && self.deductions.is_none()
        {
            errors.add("body", "no fields provided for update");
        }
        validation::non_negative(errors, "total_hours", self.total_hours);
        validation::non_negative(errors, "base_salary", self.base_salary);
        validation::non_negative(errors, "bonus", self.bonus);
        validation::non_negative(errors, "deductions", self.deductions);
    }
}

impl UpdatePayroll {
    /// Applies the present fields and recomputes the net salary.
    fn apply_to(&self, payroll: &mut MonthlyPayroll) {
        if let Some(v) = self.total_hours {
            payroll.total_hours = v;
        }
        if let Some(v) = self.base_salary {
            payroll.base_salary = v;
        }
        if let Some(v) = self.bonus {
            payroll.bonus = v;
        }
        if let Some(v) = self.deductions {
            payroll.deductions = v;
        }
        payroll.net_salary = net_salary(payroll.base_salary, payroll.bonus, payroll.deductions);
    }
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct PayrollQuery {
    #[schema(example = 1)]
    pub page: Option<u32>,

    #[schema(example = 10)]
    pub per_page: Option<u32>,

    /// Employees always see only their own rows
    #[schema(example = 1001)]
    pub employee_id: Option<u64>,

    #[schema(example = 2026)]
    pub year: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedPayrollResponse {
    pub data: Vec<MonthlyPayroll>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

async fn fetch_payroll(pool: &MySqlPool, payroll_id: u64) -> Result<MonthlyPayroll, AppError> {
    sqlx::query_as::<_, MonthlyPayroll>(&format!(
        "SELECT {} FROM monthly_payrolls WHERE id = ?",
        PAYROLL_COLUMNS
    ))
    .bind(payroll_id)
    .fetch_optional(pool)
    .await
    .map_err(db_error("Failed to fetch payroll"))?
    .ok_or_else(|| AppError::not_found("Payroll"))
}

fn publish(feed: &ChangeFeed, payroll: &MonthlyPayroll, kind: ChangeKind) {
    feed.publish(ChangeEvent {
        collection: Collection::Payroll,
        kind,
        id: payroll.id,
        employee_id: Some(payroll.employee_id),
    });
}

#[utoipa::path(
    post,
    path = "/api/payroll",
    request_body = CreatePayroll,
    responses(
        (status = 201, description = "Payroll created", body = MonthlyPayroll),
        (status = 401),
        (status = 403),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Payroll for this employee and month already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn create_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    payload: web::Json<CreatePayroll>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    payload.check()?;

    if find_employee(pool.get_ref(), payload.employee_id).await?.is_none() {
        return Err(AppError::not_found("Employee"));
    }

    let month = month_start(payload.month);
    let net = net_salary(payload.base_salary, payload.bonus, payload.deductions);

    let inserted = sqlx::query(
        r#"
        INSERT INTO monthly_payrolls
        (employee_id, month, total_hours, base_salary, bonus, deductions, net_salary)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_id)
    .bind(month)
    .bind(payload.total_hours)
    .bind(payload.base_salary)
    .bind(payload.bonus)
    .bind(payload.deductions)
    .bind(net)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        if is_duplicate_key(&e) {
            AppError::Conflict(format!(
                "Payroll for employee {} in {} already exists",
                payload.employee_id,
                month.format("%Y-%m")
            ))
        } else {
            error!(error = %e, employee_id = payload.employee_id, "Failed to create payroll");
            AppError::Backend
        }
    })?;

    let payroll = fetch_payroll(pool.get_ref(), inserted.last_insert_id()).await?;

    audit::record(
        pool.get_ref(),
        AuditRecord::new(&auth, "payroll.create")
            .target("monthly_payrolls", payroll.id)
            .after(&payroll),
    )
    .await;
    publish(&feed, &payroll, ChangeKind::Created);

    info!(payroll_id = payroll.id, employee_id = payroll.employee_id, "Payroll created");
    Ok(HttpResponse::Created().json(payroll))
}

#[utoipa::path(
    put,
    path = "/api/payroll/{payroll_id}",
    request_body = UpdatePayroll,
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll updated", body = MonthlyPayroll),
        (status = 404, description = "Payroll not found"),
        (status = 422, description = "Negative amounts or empty body")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
    payload: web::Json<UpdatePayroll>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    payload.check()?;

    let payroll_id = path.into_inner();
    let before = fetch_payroll(pool.get_ref(), payroll_id).await?;

    let mut payroll = before.clone();
    payload.apply_to(&mut payroll);

    sqlx::query(
        r#"
        UPDATE monthly_payrolls
        SET total_hours = ?, base_salary = ?, bonus = ?, deductions = ?, net_salary = ?
        WHERE id = ?
        "#,
    )
    .bind(payroll.total_hours)
    .bind(payroll.base_salary)
    .bind(payroll.bonus)
    .bind(payroll.deductions)
    .bind(payroll.net_salary)
    .bind(payroll_id)
    .execute(pool.get_ref())
    .await
    .map_err(db_error("Failed to update payroll"))?;

    audit::record(
        pool.get_ref(),
        AuditRecord::new(&auth, "payroll.update")
            .target("monthly_payrolls", payroll_id)
            .before(&before)
            .after(&payroll),
    )
    .await;
    publish(&feed, &payroll, ChangeKind::Updated);

    Ok(HttpResponse::Ok().json(payroll))
}

#[utoipa::path(
    get,
    path = "/api/payroll/{payroll_id}",
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, body = MonthlyPayroll),
        (status = 403, description = "Not your payroll"),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let payroll = fetch_payroll(pool.get_ref(), path.into_inner()).await?;

    if !auth.is_hr_or_admin() && auth.employee_id != Some(payroll.employee_id) {
        return Err(AppError::Forbidden("Not allowed to view this payroll".into()));
    }

    Ok(HttpResponse::Ok().json(payroll))
}

#[utoipa::path(
    get,
    path = "/api/payroll",
    params(PayrollQuery),
    responses(
        (status = 200, body = PaginatedPayrollResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollQuery>,
) -> Result<HttpResponse, AppError> {
    let (page, per_page, offset) = paginate(query.page, query.per_page, 12);

    let employee_scope = if auth.is_hr_or_admin() {
        query.employee_id
    } else {
        Some(auth.own_employee_id()?)
    };

    let mut filters = Filters::new();
    filters.eq_u64("employee_id", employee_scope);
    if let Some(year) = query.year {
        let (start, end) = year_bounds(year)?;
        filters.push(
            "month BETWEEN ? AND ?",
            [FilterValue::Date(start), FilterValue::Date(end)],
        );
    }
    let where_sql = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM monthly_payrolls {}", where_sql);
    let total: i64 = filters
        .bind_scalar(sqlx::query_scalar(&count_sql))
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_error("Failed to count payrolls"))?;

    let data_sql = format!(
        "SELECT {} FROM monthly_payrolls {} ORDER BY month DESC, employee_id LIMIT ? OFFSET ?",
        PAYROLL_COLUMNS, where_sql
    );
    let data = filters
        .bind_as(sqlx::query_as::<_, MonthlyPayroll>(&data_sql))
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("Failed to list payrolls"))?;

    Ok(HttpResponse::Ok().json(PaginatedPayrollResponse {
        data,
        page,
        per_page,
        total,
    }))
}

pub(crate) fn year_bounds(year: i32) -> Result<(NaiveDate, NaiveDate), AppError> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1);
    let end = NaiveDate::from_ymd_opt(year, 12, 31);
    start
        .zip(end)
        .ok_or_else(|| FieldErrors::single("year", "is out of range"))
}
