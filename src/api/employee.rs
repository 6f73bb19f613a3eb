use crate::{
    auth::{auth::AuthUser, password},
    error::{AppError, FieldErrors, db_error, is_duplicate_key},
    model::{
        employee::{Employee, EmployeeStatus},
        role::Role,
    },
    services::{
        audit::{self, AuditRecord},
        feed::{ChangeEvent, ChangeFeed, ChangeKind, Collection},
        notifier::{self, Notification, Notifier},
    },
    utils::{
        db_utils::{Filters, build_update_sql, execute_update, paginate, patch_fields},
        login_index,
        validation::{self, Validate},
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

pub(crate) const EMPLOYEE_COLUMNS: &str = "id, employee_code, first_name, last_name, email, phone, \
     department, role, campus, stage, status, hire_date, leaving_date, hourly_rate, manager, created_at";

/// Columns a partial update may touch. The login email is fixed once the
/// account exists.
const UPDATABLE_COLUMNS: &[&str] = &[
    "employee_code",
    "first_name",
    "last_name",
    "phone",
    "department",
    "role",
    "campus",
    "stage",
    "status",
    "hire_date",
    "hourly_rate",
    "manager",
];

/// Access level of the account provisioned alongside the employee.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    #[default]
    Employee,
    Manager,
    Hr,
}

impl From<AccountRole> for Role {
    fn from(r: AccountRole) -> Self {
        match r {
            AccountRole::Employee => Role::Employee,
            AccountRole::Manager => Role::Manager,
            AccountRole::Hr => Role::Hr,
        }
    }
}

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "John")]
    pub first_name: String,
    #[schema(example = "Doe")]
    pub last_name: String,
    #[schema(example = "john@company.com", format = "email")]
    pub email: String,
    #[schema(example = "+8801712345678")]
    pub phone: Option<String>,
    #[schema(example = "Engineering")]
    pub department: Option<String>,
    #[schema(example = "Teacher")]
    pub role: Option<String>,
    pub campus: Option<String>,
    pub stage: Option<String>,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub hire_date: NaiveDate,
    #[schema(example = 18.5)]
    pub hourly_rate: Option<f64>,
    #[schema(example = "jane.roe@company.com")]
    pub manager: Option<String>,
    #[serde(default)]
    pub account_role: AccountRole,
}

impl Validate for CreateEmployee {
    fn validate(&self, errors: &mut FieldErrors) {
        validation::require_text(errors, "employee_code", &self.employee_code);
        validation::max_len(errors, "employee_code", &self.employee_code, 32);
        validation::require_text(errors, "first_name", &self.first_name);
        validation::require_text(errors, "last_name", &self.last_name);
        validation::email(errors, "email", &self.email);
        validation::phone(errors, "phone", self.phone.as_deref());
        validation::non_negative(errors, "hourly_rate", self.hourly_rate);
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department: Option<String>,
    pub role: Option<String>,
    pub campus: Option<String>,
    pub status: Option<String>,
    /// Matches code, names or email
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

#[derive(Serialize, ToSchema)]
pub struct CreatedEmployee {
    pub employee: Employee,
    #[schema(example = "john@company.com")]
    pub username: String,
    /// Shown once; the employee is expected to change it.
    pub temporary_password: String,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateEmployee {
    pub employee_code: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub role: Option<String>,
    pub campus: Option<String>,
    pub stage: Option<String>,
    pub status: Option<EmployeeStatus>,
    #[schema(example = "2026-01-01", format = "date", value_type = Option<String>)]
    pub hire_date: Option<NaiveDate>,
    pub hourly_rate: Option<f64>,
    pub manager: Option<String>,
}

impl Validate for UpdateEmployee {
    fn validate(&self, errors: &mut FieldErrors) {
        validation::optional_text(errors, "employee_code", self.employee_code.as_deref());
        validation::optional_text(errors, "first_name", self.first_name.as_deref());
        validation::optional_text(errors, "last_name", self.last_name.as_deref());
        validation::phone(errors, "phone", self.phone.as_deref());
        validation::non_negative(errors, "hourly_rate", self.hourly_rate);
    }
}

#[derive(Deserialize, ToSchema)]
pub struct DeactivateEmployee {
    #[schema(example = "2026-06-30", format = "date", value_type = String)]
    pub leaving_date: NaiveDate,
}

pub(crate) async fn find_employee(pool: &MySqlPool, id: u64) -> Result<Option<Employee>, AppError> {
    sqlx::query_as::<_, Employee>(&format!(
        "SELECT {} FROM employees WHERE id = ?",
        EMPLOYEE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(db_error("Failed to fetch employee"))
}

async fn fetch_employee(pool: &MySqlPool, id: u64) -> Result<Employee, AppError> {
    find_employee(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Employee"))
}

/// Undoes an employee insert whose account could not be provisioned.
async fn discard_employee(pool: &MySqlPool, employee_id: u64) {
    match sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(pool)
        .await
    {
        Ok(_) => warn!(employee_id, "Employee removed after account provisioning failed"),
        Err(e) => error!(
            error = %e,
            employee_id,
            "Compensating delete failed; employee has no login account"
        ),
    }
}

/// Awaits `provision`; when it fails, runs `undo` before handing the error back.
async fn provision_or_undo<T, P, U, F>(provision: P, undo: U) -> Result<T, AppError>
where
    P: Future<Output = Result<T, AppError>>,
    U: FnOnce() -> F,
    F: Future<Output = ()>,
{
    match provision.await {
        Ok(value) => Ok(value),
        Err(e) => {
            undo().await;
            Err(e)
        }
    }
}

async fn provision_account(
    pool: &MySqlPool,
    employee_id: u64,
    username: &str,
    role: Role,
) -> Result<String, AppError> {
    let temporary = password::temporary_password();
    let hashed = password::hash_password(&temporary).map_err(|e| {
        error!(error = %e, "Failed to hash temporary password");
        AppError::Backend
    })?;

    sqlx::query(
        r#"
        INSERT INTO users (username, password, role_id, employee_id)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(username)
    .bind(hashed)
    .bind(role.id())
    .bind(employee_id)
    .execute(pool)
    .await
    .map_err(|e| {
        if is_duplicate_key(&e) {
            info!(username, "Login already taken");
            AppError::Conflict("A login with this email already exists".into())
        } else {
            error!(error = %e, employee_id, "Failed to provision account");
            AppError::Backend
        }
    })?;

    Ok(temporary)
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employee",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee and login account created", body = CreatedEmployee),
        (status = 409, description = "Employee code or email already in use"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error", body = Object, example = json!({
            "message": "Something went wrong, Contact with system admin"
        }))
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
#[instrument(name = "create_employee", skip_all, fields(actor = %auth.username))]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<dyn Notifier>,
    feed: web::Data<ChangeFeed>,
    payload: web::Json<CreateEmployee>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    payload.check()?;

    if matches!(payload.account_role, AccountRole::Hr) {
        auth.require_admin()?;
    }

    let username = login_index::normalize(&payload.email);
    if !login_index::is_available(pool.get_ref(), &username).await? {
        return Err(FieldErrors::single("email", "is already in use"));
    }

    let inserted = sqlx::query(
        r#"
        INSERT INTO employees
            (employee_code, first_name, last_name, email, phone, department, role,
             campus, stage, hire_date, hourly_rate, manager)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_code.trim())
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(&username)
    .bind(&payload.phone)
    .bind(&payload.department)
    .bind(&payload.role)
    .bind(&payload.campus)
    .bind(&payload.stage)
    .bind(payload.hire_date)
    .bind(payload.hourly_rate)
    .bind(&payload.manager)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        if is_duplicate_key(&e) {
            AppError::Conflict("Employee code or email already exists".into())
        } else {
            error!(error = %e, "Failed to create employee");
            AppError::Backend
        }
    })?;

    let employee_id = inserted.last_insert_id();
    debug!(employee_id, "Employee row inserted");

    let temporary_password = provision_or_undo(
        provision_account(pool.get_ref(), employee_id, &username, payload.account_role.into()),
        || discard_employee(pool.get_ref(), employee_id),
    )
    .await?;

    login_index::record_taken(&username).await;

    let employee = fetch_employee(pool.get_ref(), employee_id).await?;

    audit::record(
        pool.get_ref(),
        AuditRecord::new(&auth, "employee.create")
            .target("employees", employee_id)
            .after(&employee),
    )
    .await;

    notifier::notify(
        notifier.get_ref(),
        Notification {
            recipient: employee.email.clone(),
            subject: "Welcome aboard".into(),
            body: format!(
                "Hi {}, your account is ready. Sign in with {} and the temporary password you were given.",
                employee.first_name, username
            ),
            path: Some("/login".into()),
        },
    )
    .await;

    feed.publish(ChangeEvent {
        collection: Collection::Employees,
        kind: ChangeKind::Created,
        id: employee_id,
        employee_id: Some(employee_id),
    });

    info!(employee_id, "Employee created");

    Ok(HttpResponse::Created().json(CreatedEmployee {
        employee,
        username,
        temporary_password,
    }))
}

#[utoipa::path(
    get,
    path = "/api/employee",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 403, description = "Forbidden")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_approver()?;

    let (page, per_page, offset) = paginate(query.page, query.per_page, 20);

    let mut filters = Filters::new();
    filters.eq_str("department", query.department.as_deref());
    filters.eq_str("role", query.role.as_deref());
    filters.eq_str("campus", query.campus.as_deref());
    filters.eq_str("status", query.status.as_deref());
    filters.search(
        &["employee_code", "first_name", "last_name", "email"],
        query.search.as_deref(),
    );
    let where_sql = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM employees {}", where_sql);
    let total: i64 = filters
        .bind_scalar(sqlx::query_scalar(&count_sql))
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_error("Failed to count employees"))?;

    let data_sql = format!(
        "SELECT {} FROM employees {} ORDER BY id DESC LIMIT ? OFFSET ?",
        EMPLOYEE_COLUMNS, where_sql
    );
    let data = filters
        .bind_as(sqlx::query_as::<_, Employee>(&data_sql))
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("Failed to list employees"))?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/employee/{id}",
    params(
        ("id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        }))
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let employee_id = path.into_inner();

    if !auth.can_read_employee(employee_id) {
        return Err(AppError::Forbidden("Not allowed to view this employee".into()));
    }

    let employee = fetch_employee(pool.get_ref(), employee_id).await?;
    Ok(HttpResponse::Ok().json(employee))
}

/// The caller's own employee record.
#[utoipa::path(
    get,
    path = "/api/employee/me",
    responses(
        (status = 200, description = "Own employee record", body = Employee),
        (status = 403, description = "Account has no employee profile")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_me(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let employee_id = auth.own_employee_id()?;
    let employee = fetch_employee(pool.get_ref(), employee_id).await?;
    Ok(HttpResponse::Ok().json(employee))
}

/// Partial update. Only whitelisted columns are accepted.
#[utoipa::path(
    put,
    path = "/api/employee/{id}",
    params(
        ("id" = u64, Path, description = "Employee ID")
    ),
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Employee updated", body = Employee),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Employee code already in use"),
        (status = 422, description = "Unknown or invalid fields")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
#[instrument(name = "update_employee", skip_all, fields(actor = %auth.username))]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
    payload: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();

    // reject unknown keys first, then check the types of the known ones
    build_update_sql(
        "employees",
        &payload,
        UPDATABLE_COLUMNS,
        "id",
        employee_id,
    )?;

    let patch: UpdateEmployee = serde_json::from_value(payload.into_inner())
        .map_err(|e| FieldErrors::single("body", e.to_string()))?;
    patch.check()?;

    let before = fetch_employee(pool.get_ref(), employee_id).await?;

    let update = build_update_sql(
        "employees",
        &patch_fields(&patch),
        UPDATABLE_COLUMNS,
        "id",
        employee_id,
    )?;

    execute_update(pool.get_ref(), update).await.map_err(|e| {
        if is_duplicate_key(&e) {
            AppError::Conflict("Employee code already exists".into())
        } else {
            error!(error = %e, employee_id, "Failed to update employee");
            AppError::Backend
        }
    })?;

    let after = fetch_employee(pool.get_ref(), employee_id).await?;

    audit::record(
        pool.get_ref(),
        AuditRecord::new(&auth, "employee.update")
            .target("employees", employee_id)
            .before(&before)
            .after(&after),
    )
    .await;

    feed.publish(ChangeEvent {
        collection: Collection::Employees,
        kind: ChangeKind::Updated,
        id: employee_id,
        employee_id: Some(employee_id),
    });

    Ok(HttpResponse::Ok().json(after))
}

/// Soft delete: records the leaving date and marks the employee terminated.
/// The login account is disabled; history is kept.
#[utoipa::path(
    put,
    path = "/api/employee/{id}/deactivate",
    params(
        ("id" = u64, Path, description = "Employee ID")
    ),
    request_body = DeactivateEmployee,
    responses(
        (status = 200, description = "Employee deactivated", body = Employee),
        (status = 404, description = "Employee not found"),
        (status = 422, description = "Leaving date before hire date")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn deactivate_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
    payload: web::Json<DeactivateEmployee>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();

    let before = fetch_employee(pool.get_ref(), employee_id).await?;

    let mut errors = FieldErrors::new();
    validation::date_range(
        &mut errors,
        "hire_date",
        before.hire_date,
        "leaving_date",
        payload.leaving_date,
    );
    errors.into_result()?;

    sqlx::query("UPDATE employees SET leaving_date = ?, status = ? WHERE id = ?")
        .bind(payload.leaving_date)
        .bind(EmployeeStatus::Terminated.as_ref())
        .bind(employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(db_error("Failed to deactivate employee"))?;

    sqlx::query("UPDATE users SET is_active = FALSE WHERE employee_id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(db_error("Failed to disable employee login"))?;

    let after = fetch_employee(pool.get_ref(), employee_id).await?;

    audit::record(
        pool.get_ref(),
        AuditRecord::new(&auth, "employee.deactivate")
            .target("employees", employee_id)
            .before(&before)
            .after(&after),
    )
    .await;

    feed.publish(ChangeEvent {
        collection: Collection::Employees,
        kind: ChangeKind::Updated,
        id: employee_id,
        employee_id: Some(employee_id),
    });

    Ok(HttpResponse::Ok().json(after))
}

/// Hard delete, Admin only. Attendance, leave and payroll rows go with it.
#[utoipa::path(
    delete,
    path = "/api/employee/{id}",
    params(
        ("id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 204, description = "Employee deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    let before = fetch_employee(pool.get_ref(), employee_id).await?;

    sqlx::query("DELETE FROM users WHERE employee_id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(db_error("Failed to delete employee login"))?;

    sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(db_error("Failed to delete employee"))?;

    login_index::release(&before.email).await;

    audit::record(
        pool.get_ref(),
        AuditRecord::new(&auth, "employee.delete")
            .target("employees", employee_id)
            .before(&before),
    )
    .await;

    feed.publish(ChangeEvent {
        collection: Collection::Employees,
        kind: ChangeKind::Deleted,
        id: employee_id,
        employee_id: Some(employee_id),
    });

    info!(employee_id, "Employee deleted");
    Ok(HttpResponse::NoContent().finish())
}
