use crate::{
    api::employee::find_employee,
    auth::auth::AuthUser,
    error::{AppError, FieldErrors, db_error},
    model::{
        employee::Employee,
        leave_request::{LeaveAction, LeaveChanges, LeaveRequest, LeaveStatus, TransitionError},
        reference::ReferenceList,
    },
    services::{
        audit::{self, AuditRecord},
        feed::{ChangeEvent, ChangeFeed, ChangeKind, Collection, FeedItem, SubscriptionFilter},
        notifier::{self, Notification, Notifier},
    },
    utils::{
        db_utils::{FilterValue, Filters, paginate},
        validation::{self, Validate},
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{debug, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

const LEAVE_COLUMNS: &str = "id, employee_id, start_date, end_date, leave_type, reason, status, \
     manager_notes, decided_by, version, created_at, updated_at";

/// Upper bound on rows in one live snapshot.
const SNAPSHOT_LIMIT: u32 = 200;

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "sick")]
    pub leave_type: String,
    #[schema(example = "Flu")]
    pub reason: Option<String>,
}

impl Validate for CreateLeave {
    fn validate(&self, errors: &mut FieldErrors) {
        validation::date_range(errors, "start_date", self.start_date, "end_date", self.end_date);
        validation::require_text(errors, "leave_type", &self.leave_type);
        validation::max_len(errors, "leave_type", &self.leave_type, 64);
    }
}

/// Replacement body for an existing request. `version` is the one last read.
#[derive(Deserialize, ToSchema)]
pub struct EditLeave {
    #[schema(example = 2)]
    pub version: u32,
    #[schema(example = "2026-01-02", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-04", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "annual")]
    pub leave_type: String,
    pub reason: Option<String>,
}

impl Validate for EditLeave {
    fn validate(&self, errors: &mut FieldErrors) {
        validation::date_range(errors, "start_date", self.start_date, "end_date", self.end_date);
        validation::require_text(errors, "leave_type", &self.leave_type);
        validation::max_len(errors, "leave_type", &self.leave_type, 64);
    }
}

#[derive(Deserialize, ToSchema)]
pub struct LeaveDecision {
    /// Version of the request the approver looked at
    #[schema(example = 0)]
    pub version: u32,
    #[schema(example = "Enjoy the break")]
    pub manager_notes: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    /// Filter by employee ID (ignored for employees, who only see their own)
    #[schema(example = 123)]
    pub employee_id: Option<u64>,
    /// Filter by leave status
    #[schema(example = "pending")]
    pub status: Option<LeaveStatus>,
    /// Requests overlapping this date or later
    #[schema(example = "2026-01-01", format = "date", value_type = Option<String>)]
    pub from: Option<NaiveDate>,
    /// Pagination page number (start with 1)
    #[schema(example = 1)]
    pub page: Option<u32>,
    #[schema(example = 10)]
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

impl From<TransitionError> for AppError {
    fn from(e: TransitionError) -> Self {
        AppError::Conflict(e.to_string())
    }
}

fn stale() -> AppError {
    AppError::Conflict(
        "Leave request was changed by someone else; reload it and try again".into(),
    )
}

/// Approves or rejects `leave` as read at `expected_version`.
fn apply_decision(
    leave: &mut LeaveRequest,
    expected_version: u32,
    action: LeaveAction,
    decided_by: &str,
    notes: Option<String>,
) -> Result<(), AppError> {
    if leave.version != expected_version {
        return Err(stale());
    }
    leave.decide(action, decided_by, notes)?;
    Ok(())
}

/// Replaces the body of `leave` as read at `expected_version`.
fn apply_edit(
    leave: &mut LeaveRequest,
    expected_version: u32,
    changes: LeaveChanges,
) -> Result<(), AppError> {
    if leave.version != expected_version {
        return Err(stale());
    }
    leave.edit(changes)?;
    Ok(())
}

async fn fetch_leave(pool: &MySqlPool, leave_id: u64) -> Result<LeaveRequest, AppError> {
    sqlx::query_as::<_, LeaveRequest>(&format!(
        "SELECT {} FROM leave_requests WHERE id = ?",
        LEAVE_COLUMNS
    ))
    .bind(leave_id)
    .fetch_optional(pool)
    .await
    .map_err(db_error("Failed to fetch leave request"))?
    .ok_or_else(|| AppError::not_found("Leave request"))
}

/// When the `leave_types` list is configured, only its values are accepted.
async fn check_leave_type(pool: &MySqlPool, leave_type: &str) -> Result<(), AppError> {
    let allowed: Vec<String> =
        sqlx::query_scalar("SELECT value FROM reference_items WHERE list_name = ?")
            .bind(ReferenceList::LeaveTypes.as_ref())
            .fetch_all(pool)
            .await
            .map_err(db_error("Failed to load leave types"))?;

    let wanted = leave_type.trim();
    if allowed.is_empty() || allowed.iter().any(|t| t.eq_ignore_ascii_case(wanted)) {
        Ok(())
    } else {
        Err(FieldErrors::single(
            "leave_type",
            format!("must be one of: {}", allowed.join(", ")),
        ))
    }
}

/// Writes the in-memory request back if nobody else wrote it in between.
async fn save_versioned(pool: &MySqlPool, leave: &LeaveRequest) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET start_date = ?, end_date = ?, leave_type = ?, reason = ?,
            status = ?, manager_notes = ?, decided_by = ?, version = version + 1
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(leave.start_date)
    .bind(leave.end_date)
    .bind(&leave.leave_type)
    .bind(&leave.reason)
    .bind(leave.status.as_ref())
    .bind(&leave.manager_notes)
    .bind(&leave.decided_by)
    .bind(leave.id)
    .bind(leave.version)
    .execute(pool)
    .await
    .map_err(db_error("Failed to update leave request"))?;

    if result.rows_affected() == 0 {
        info!(leave_id = leave.id, version = leave.version, "Stale leave write rejected");
        return Err(stale());
    }
    Ok(())
}

/// Stored copy of a leave just saved by [`save_versioned`]. If the read
/// fails the write still stands, so the saved copy is returned instead.
async fn reread(pool: &MySqlPool, mut saved: LeaveRequest) -> LeaveRequest {
    match fetch_leave(pool, saved.id).await {
        Ok(stored) => stored,
        Err(_) => {
            saved.version += 1;
            saved
        }
    }
}

/// The owner of `leave`, or `None` when it cannot be looked up. Lookup
/// failures are logged and never fail the write that came before.
async fn leave_owner(pool: &MySqlPool, leave: &LeaveRequest) -> Option<Employee> {
    match find_employee(pool, leave.employee_id).await {
        Ok(employee) => employee,
        Err(_) => {
            warn!(
                leave_id = leave.id,
                employee_id = leave.employee_id,
                "Skipping leave notification; owner lookup failed"
            );
            None
        }
    }
}

/// Tells the employee's manager, if the manager is reachable by email.
async fn notify_manager(
    pool: &MySqlPool,
    notifier: &dyn Notifier,
    leave: &LeaveRequest,
    subject: &str,
) {
    let Some(employee) = leave_owner(pool, leave).await else {
        return;
    };
    let Some(manager) = employee.manager_email() else {
        debug!(employee_id = employee.id, "No manager email; skipping notification");
        return;
    };

    notifier::notify(
        notifier,
        Notification {
            recipient: manager.to_string(),
            subject: subject.to_string(),
            body: format!(
                "{} requested {} leave from {} to {} ({} days).",
                employee.full_name(),
                leave.leave_type,
                leave.start_date,
                leave.end_date,
                leave.days()
            ),
            path: Some(format!("/leave/{}", leave.id)),
        },
    )
    .await;
}

/// Tells the employee how their request was decided.
async fn notify_decided(pool: &MySqlPool, notifier: &dyn Notifier, leave: &LeaveRequest, by: &str) {
    let Some(employee) = leave_owner(pool, leave).await else {
        return;
    };

    notifier::notify(
        notifier,
        Notification {
            recipient: employee.email.clone(),
            subject: format!("Leave request {}", leave.status),
            body: format!(
                "Your {} leave from {} to {} was {} by {}.{}",
                leave.leave_type,
                leave.start_date,
                leave.end_date,
                leave.status,
                by,
                leave
                    .manager_notes
                    .as_deref()
                    .map(|n| format!(" Notes: {}", n))
                    .unwrap_or_default()
            ),
            path: Some(format!("/leave/{}", leave.id)),
        },
    )
    .await;
}

fn publish(feed: &ChangeFeed, leave: &LeaveRequest, kind: ChangeKind) {
    feed.publish(ChangeEvent {
        collection: Collection::LeaveRequests,
        kind,
        id: leave.id,
        employee_id: Some(leave.employee_id),
    });
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 422, description = "Invalid dates or leave type")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
#[instrument(name = "create_leave", skip_all, fields(actor = %auth.username))]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<dyn Notifier>,
    feed: web::Data<ChangeFeed>,
    payload: web::Json<CreateLeave>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.own_employee_id()?;
    payload.check()?;
    check_leave_type(pool.get_ref(), &payload.leave_type).await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_id, start_date, end_date, leave_type, reason, status)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.leave_type.trim())
    .bind(&payload.reason)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(db_error("Failed to create leave request"))?;

    let leave = fetch_leave(pool.get_ref(), inserted.last_insert_id()).await?;

    audit::record(
        pool.get_ref(),
        AuditRecord::new(&auth, "leave.create")
            .target("leave_requests", leave.id)
            .after(&leave),
    )
    .await;

    notify_manager(pool.get_ref(), notifier.get_ref(), &leave, "New leave request").await;
    publish(&feed, &leave, ChangeKind::Created);

    info!(leave_id = leave.id, employee_id, "Leave request submitted");
    Ok(HttpResponse::Created().json(leave))
}

/// for getting leave applications endpoint
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> Result<HttpResponse, AppError> {
    let (page, per_page, offset) = paginate(query.page, query.per_page, 10);

    let employee_scope = if auth.role.is_approver() {
        query.employee_id
    } else {
        Some(auth.own_employee_id()?)
    };

    let mut filters = Filters::new();
    filters.eq_u64("employee_id", employee_scope);
    filters.eq_str("status", query.status.as_ref().map(|s| s.as_ref()));
    if let Some(from) = query.from {
        filters.push("end_date >= ?", [FilterValue::Date(from)]);
    }
    let where_sql = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM leave_requests {}", where_sql);
    let total: i64 = filters
        .bind_scalar(sqlx::query_scalar(&count_sql))
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_error("Failed to count leave requests"))?;

    let data_sql = format!(
        "SELECT {} FROM leave_requests {} ORDER BY start_date DESC, id DESC LIMIT ? OFFSET ?",
        LEAVE_COLUMNS, where_sql
    );
    let data = filters
        .bind_as(sqlx::query_as::<_, LeaveRequest>(&data_sql))
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("Failed to list leave requests"))?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

/// for getting a leave application details endpoint
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found", body = Object, example = json!({
            "message": "Leave request not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let leave = fetch_leave(pool.get_ref(), path.into_inner()).await?;

    if !auth.can_read_employee(leave.employee_id) {
        return Err(AppError::Forbidden("Not allowed to view this leave request".into()));
    }

    Ok(HttpResponse::Ok().json(leave))
}

async fn decide(
    auth: AuthUser,
    pool: &MySqlPool,
    notifier: &dyn Notifier,
    feed: &ChangeFeed,
    leave_id: u64,
    decision: LeaveDecision,
    action: LeaveAction,
) -> Result<HttpResponse, AppError> {
    auth.require_approver()?;

    let mut leave = fetch_leave(pool, leave_id).await?;

    if !auth.is_hr_or_admin() && auth.employee_id == Some(leave.employee_id) {
        return Err(AppError::Forbidden("Cannot decide on your own leave request".into()));
    }
    let before = leave.clone();
    apply_decision(
        &mut leave,
        decision.version,
        action,
        &auth.username,
        decision.manager_notes,
    )?;
    save_versioned(pool, &leave).await?;
    let leave = reread(pool, leave).await;

    audit::record(
        pool,
        AuditRecord::new(
            &auth,
            match action {
                LeaveAction::Approve => "leave.approve",
                _ => "leave.reject",
            },
        )
        .target("leave_requests", leave_id)
        .before(&before)
        .after(&leave),
    )
    .await;

    notify_decided(pool, notifier, &leave, &auth.username).await;
    publish(feed, &leave, ChangeKind::Updated);

    info!(leave_id, status = %leave.status, "Leave request decided");
    Ok(HttpResponse::Ok().json(leave))
}

/* =========================
Approve leave (HR/Admin/Manager)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    request_body = LeaveDecision,
    responses(
        (status = 200, description = "Leave approved", body = LeaveRequest),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Already decided, or changed since it was read", body = Object, example = json!({
            "message": "Cannot approve a approved leave request"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<dyn Notifier>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
    payload: web::Json<LeaveDecision>,
) -> Result<HttpResponse, AppError> {
    decide(
        auth,
        pool.get_ref(),
        notifier.get_ref(),
        &feed,
        path.into_inner(),
        payload.into_inner(),
        LeaveAction::Approve,
    )
    .await
}

/* =========================
Reject leave (HR/Admin/Manager)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    request_body = LeaveDecision,
    responses(
        (status = 200, description = "Leave rejected", body = LeaveRequest),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Already decided, or changed since it was read")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<dyn Notifier>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
    payload: web::Json<LeaveDecision>,
) -> Result<HttpResponse, AppError> {
    decide(
        auth,
        pool.get_ref(),
        notifier.get_ref(),
        &feed,
        path.into_inner(),
        payload.into_inner(),
        LeaveAction::Reject,
    )
    .await
}

/// Replaces dates, type and reason. Any decision is discarded and the request
/// goes back to pending.
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to edit")
    ),
    request_body = EditLeave,
    responses(
        (status = 200, description = "Leave request updated and pending again", body = LeaveRequest),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Changed since it was read"),
        (status = 422, description = "Invalid dates or leave type")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
#[instrument(name = "edit_leave", skip_all, fields(actor = %auth.username))]
pub async fn edit_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<dyn Notifier>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
    payload: web::Json<EditLeave>,
) -> Result<HttpResponse, AppError> {
    let leave_id = path.into_inner();
    payload.check()?;

    let mut leave = fetch_leave(pool.get_ref(), leave_id).await?;

    if !auth.is_hr_or_admin() && auth.employee_id != Some(leave.employee_id) {
        return Err(AppError::Forbidden("Only the owner or HR can edit this request".into()));
    }
    check_leave_type(pool.get_ref(), &payload.leave_type).await?;

    let before = leave.clone();
    let payload = payload.into_inner();
    apply_edit(
        &mut leave,
        payload.version,
        LeaveChanges {
            start_date: payload.start_date,
            end_date: payload.end_date,
            leave_type: payload.leave_type.trim().to_string(),
            reason: payload.reason,
        },
    )?;
    save_versioned(pool.get_ref(), &leave).await?;
    let leave = reread(pool.get_ref(), leave).await;

    audit::record(
        pool.get_ref(),
        AuditRecord::new(&auth, "leave.edit")
            .target("leave_requests", leave_id)
            .before(&before)
            .after(&leave),
    )
    .await;

    notify_manager(pool.get_ref(), notifier.get_ref(), &leave, "Leave request changed").await;
    publish(&feed, &leave, ChangeKind::Updated);

    Ok(HttpResponse::Ok().json(leave))
}

#[utoipa::path(
    delete,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to delete")
    ),
    responses(
        (status = 204, description = "Leave request deleted"),
        (status = 403, description = "Only HR, or the owner while pending"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn delete_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let leave_id = path.into_inner();
    let leave = fetch_leave(pool.get_ref(), leave_id).await?;

    let owner_while_pending =
        auth.employee_id == Some(leave.employee_id) && leave.status == LeaveStatus::Pending;
    if !auth.is_hr_or_admin() && !owner_while_pending {
        return Err(AppError::Forbidden(
            "Only HR, or the owner while pending, can delete this request".into(),
        ));
    }

    sqlx::query("DELETE FROM leave_requests WHERE id = ?")
        .bind(leave_id)
        .execute(pool.get_ref())
        .await
        .map_err(db_error("Failed to delete leave request"))?;

    audit::record(
        pool.get_ref(),
        AuditRecord::new(&auth, "leave.delete")
            .target("leave_requests", leave_id)
            .before(&leave),
    )
    .await;

    publish(&feed, &leave, ChangeKind::Deleted);
    Ok(HttpResponse::NoContent().finish())
}

async fn snapshot(pool: &MySqlPool, scope: Option<u64>) -> Result<Vec<LeaveRequest>, AppError> {
    let mut filters = Filters::new();
    filters.eq_u64("employee_id", scope);

    let sql = format!(
        "SELECT {} FROM leave_requests {} ORDER BY start_date DESC, id DESC LIMIT ?",
        LEAVE_COLUMNS,
        filters.where_clause()
    );

    filters
        .bind_as(sqlx::query_as::<_, LeaveRequest>(&sql))
        .bind(SNAPSHOT_LIMIT)
        .fetch_all(pool)
        .await
        .map_err(db_error("Failed to load leave snapshot"))
}

fn sse_frame<T: Serialize>(event: &str, data: &T) -> Result<web::Bytes, AppError> {
    let json = serde_json::to_string(data).map_err(|e| {
        tracing::error!(error = %e, "Failed to encode live frame");
        AppError::Backend
    })?;
    Ok(web::Bytes::from(format!("event: {}\ndata: {}\n\n", event, json)))
}

/// Live view of the caller's visible leave requests as Server-Sent Events.
///
/// Sends a `snapshot` right away and again after every matching change. If
/// the subscriber falls behind, the next snapshot carries the current state.
#[utoipa::path(
    get,
    path = "/api/leave/live",
    responses(
        (status = 200, description = "text/event-stream of leave snapshots"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn live_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
) -> Result<HttpResponse, AppError> {
    let scope = if auth.role.is_approver() {
        None
    } else {
        Some(auth.own_employee_id()?)
    };

    let subscription = feed.subscribe(SubscriptionFilter {
        collection: Collection::LeaveRequests,
        employee_id: scope,
    });
    debug!(
        user_id = auth.user_id,
        ?scope,
        subscribers = feed.subscriber_count(),
        "Live leave subscriber attached"
    );

    let pool = pool.get_ref().clone();
    let initial = {
        let pool = pool.clone();
        stream::once(async move { sse_frame("snapshot", &snapshot(&pool, scope).await?) })
    };
    let updates = subscription.into_stream().then(move |item| {
        let pool = pool.clone();
        async move {
            if let FeedItem::Lagged(missed) = item {
                debug!(missed, "Live leave subscriber lagged; resending snapshot");
            }
            sse_frame("snapshot", &snapshot(&pool, scope).await?)
        }
    });

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(initial.chain(updates)))
}
