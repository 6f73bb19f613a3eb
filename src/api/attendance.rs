use crate::{
    auth::auth::AuthUser,
    clock::Clock,
    error::{AppError, FieldErrors, db_error},
    model::attendance::{AttendanceEvent, DailyAttendance, EventKind, EventSource},
    reporting::{
        reducer::{reduce_daily, total_worked_minutes},
        render::format_minutes,
    },
    services::feed::{ChangeEvent, ChangeFeed, ChangeKind, Collection},
};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, QueryBuilder};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, instrument};
use utoipa::{IntoParams, ToSchema};

const EVENT_COLUMNS: &str = "id, employee_id, occurred_at, kind, source";

/// Largest terminal batch accepted in one request.
pub const MAX_BATCH: usize = 1000;

/// Longest range one daily query may cover.
const MAX_RANGE_DAYS: i64 = 366;

#[derive(Debug, Deserialize, ToSchema)]
pub struct TerminalEvent {
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "2024-06-03T08:58:00", format = "date-time", value_type = String)]
    pub occurred_at: NaiveDateTime,
    pub kind: EventKind,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TerminalBatch {
    pub events: Vec<TerminalEvent>,
}

#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct RejectedEvent {
    /// Position in the submitted batch
    pub index: usize,
    pub employee_code: String,
    pub reason: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected: Vec<RejectedEvent>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DailyQuery {
    /// Defaults to the caller's own employee record
    pub employee_id: Option<u64>,
    /// Defaults to the first day of the current month
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    /// Defaults to today
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DailyRow {
    #[serde(flatten)]
    pub day: DailyAttendance,
    pub worked_minutes: Option<i64>,
    #[schema(example = "8h 34m")]
    pub worked: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DailyReport {
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub from: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub to: NaiveDate,
    pub days: Vec<DailyRow>,
    pub total_minutes: i64,
    #[schema(example = "42h 10m")]
    pub total: String,
}

fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = date.and_time(chrono::NaiveTime::MIN);
    let end = start + chrono::Duration::days(1);
    (start, end)
}

async fn fetch_event(pool: &MySqlPool, id: u64) -> Result<AttendanceEvent, AppError> {
    sqlx::query_as::<_, AttendanceEvent>(&format!(
        "SELECT {} FROM attendance_log WHERE id = ?",
        EVENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(db_error("Failed to fetch attendance event"))?
    .ok_or_else(|| AppError::not_found("Attendance event"))
}

async fn record_event(
    pool: &MySqlPool,
    feed: &ChangeFeed,
    employee_id: u64,
    occurred_at: NaiveDateTime,
    kind: EventKind,
) -> Result<AttendanceEvent, AppError> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO attendance_log (employee_id, occurred_at, kind, source)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(occurred_at)
    .bind(kind.as_ref())
    .bind(EventSource::SelfService.as_ref())
    .execute(pool)
    .await
    .map_err(db_error("Failed to record attendance event"))?;

    let event = fetch_event(pool, inserted.last_insert_id()).await?;

    feed.publish(ChangeEvent {
        collection: Collection::Attendance,
        kind: ChangeKind::Created,
        id: event.id,
        employee_id: Some(employee_id),
    });

    Ok(event)
}

/// Check in at the current time.
#[utoipa::path(
    post,
    path = "/api/attendance",
    responses(
        (status = 201, description = "Check-in recorded", body = AttendanceEvent),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(name = "check_in", skip_all, fields(actor = %auth.username))]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    clock: web::Data<dyn Clock>,
    feed: web::Data<ChangeFeed>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.own_employee_id()?;

    let event = record_event(pool.get_ref(), &feed, employee_id, clock.now(), EventKind::In).await?;

    info!(employee_id, at = %event.occurred_at, "Checked in");
    Ok(HttpResponse::Created().json(event))
}

/// Check out at the current time. Requires a check-in earlier the same day.
#[utoipa::path(
    put,
    path = "/api/attendance",
    responses(
        (status = 201, description = "Check-out recorded", body = AttendanceEvent),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 422, description = "No check-in today", body = Object, example = json!({
            "message": "Validation failed",
            "errors": { "check_in": ["no check-in recorded today"] }
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(name = "check_out", skip_all, fields(actor = %auth.username))]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    clock: web::Data<dyn Clock>,
    feed: web::Data<ChangeFeed>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.own_employee_id()?;
    let now = clock.now();
    let (day_start, _) = day_bounds(now.date());

    let check_ins: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM attendance_log
        WHERE employee_id = ? AND kind = ? AND occurred_at >= ? AND occurred_at <= ?
        "#,
    )
    .bind(employee_id)
    .bind(EventKind::In.as_ref())
    .bind(day_start)
    .bind(now)
    .fetch_one(pool.get_ref())
    .await
    .map_err(db_error("Failed to look up check-in"))?;

    if check_ins == 0 {
        debug!(employee_id, "Check-out without check-in");
        return Err(FieldErrors::single("check_in", "no check-in recorded today"));
    }

    let event = record_event(pool.get_ref(), &feed, employee_id, now, EventKind::Out).await?;

    info!(employee_id, at = %event.occurred_at, "Checked out");
    Ok(HttpResponse::Created().json(event))
}

/// Splits a batch into rows with a known employee and per-row rejections.
fn resolve_batch<'a>(
    events: &'a [TerminalEvent],
    known: &HashMap<String, u64>,
) -> (Vec<(u64, &'a TerminalEvent)>, Vec<RejectedEvent>) {
    let mut accepted = Vec::with_capacity(events.len());
    let mut rejected = Vec::new();

    for (index, event) in events.iter().enumerate() {
        match known.get(event.employee_code.trim()) {
            Some(&employee_id) => accepted.push((employee_id, event)),
            None => rejected.push(RejectedEvent {
                index,
                employee_code: event.employee_code.clone(),
                reason: "unknown employee code".into(),
            }),
        }
    }

    (accepted, rejected)
}

/// Bulk ingestion from attendance terminals, keyed by employee code.
#[utoipa::path(
    post,
    path = "/api/attendance/events",
    request_body = TerminalBatch,
    responses(
        (status = 200, description = "Batch processed; unknown codes are listed per row", body = IngestReport),
        (status = 403, description = "Only terminal integrations and Admin"),
        (status = 422, description = "Empty or oversized batch")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(name = "ingest_attendance", skip_all, fields(actor = %auth.username))]
pub async fn ingest_events(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    payload: web::Json<TerminalBatch>,
) -> Result<HttpResponse, AppError> {
    if !auth.role.is_feed_writer() {
        return Err(AppError::Forbidden("Terminal integrations only".into()));
    }

    let events = &payload.events;
    if events.is_empty() {
        return Err(FieldErrors::single("events", "must not be empty"));
    }
    if events.len() > MAX_BATCH {
        return Err(FieldErrors::single(
            "events",
            format!("must contain at most {} entries", MAX_BATCH),
        ));
    }

    let codes: BTreeSet<&str> = events.iter().map(|e| e.employee_code.trim()).collect();

    let mut lookup = QueryBuilder::<MySql>::new("SELECT employee_code, id FROM employees WHERE employee_code IN (");
    let mut separated = lookup.separated(", ");
    for code in &codes {
        separated.push_bind(*code);
    }
    separated.push_unseparated(")");

    let known: HashMap<String, u64> = lookup
        .build_query_as::<(String, u64)>()
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("Failed to resolve employee codes"))?
        .into_iter()
        .collect();

    let (accepted, rejected) = resolve_batch(events, &known);

    if !accepted.is_empty() {
        let source = EventSource::Terminal;
        let mut insert = QueryBuilder::<MySql>::new(
            "INSERT INTO attendance_log (employee_id, occurred_at, kind, source) ",
        );
        insert.push_values(&accepted, |mut row, (employee_id, event)| {
            row.push_bind(*employee_id)
                .push_bind(event.occurred_at)
                .push_bind(event.kind.as_ref())
                .push_bind(source.as_ref());
        });
        insert
            .build()
            .execute(pool.get_ref())
            .await
            .map_err(db_error("Failed to store terminal events"))?;

        let touched: BTreeSet<u64> = accepted.iter().map(|(id, _)| *id).collect();
        for employee_id in touched {
            feed.publish(ChangeEvent {
                collection: Collection::Attendance,
                kind: ChangeKind::Created,
                id: employee_id,
                employee_id: Some(employee_id),
            });
        }
    }

    info!(
        accepted = accepted.len(),
        rejected = rejected.len(),
        "Terminal batch ingested"
    );

    Ok(HttpResponse::Ok().json(IngestReport {
        accepted: accepted.len(),
        rejected,
    }))
}

fn resolve_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), AppError> {
    let to = to.unwrap_or(today);
    let from = from.unwrap_or_else(|| to.with_day(1).unwrap_or(to));

    let mut errors = FieldErrors::new();
    crate::utils::validation::date_range(&mut errors, "from", from, "to", to);
    if (to - from).num_days() >= MAX_RANGE_DAYS {
        errors.add("to", format!("range must not exceed {} days", MAX_RANGE_DAYS));
    }
    errors.into_result()?;

    Ok((from, to))
}

/// Clock events reduced to one row per day.
#[utoipa::path(
    get,
    path = "/api/attendance/daily",
    params(DailyQuery),
    responses(
        (status = 200, description = "Daily attendance with worked time", body = DailyReport),
        (status = 403, description = "Employees may only read their own attendance"),
        (status = 422, description = "Invalid date range")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn daily_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    clock: web::Data<dyn Clock>,
    query: web::Query<DailyQuery>,
) -> Result<HttpResponse, AppError> {
    let employee_id = match query.employee_id {
        Some(id) => id,
        None => auth.own_employee_id()?,
    };
    if !auth.can_read_employee(employee_id) {
        return Err(AppError::Forbidden("Not allowed to view this attendance".into()));
    }

    let (from, to) = resolve_range(query.from, query.to, clock.today())?;
    let (range_start, _) = day_bounds(from);
    let (_, range_end) = day_bounds(to);

    let events = sqlx::query_as::<_, AttendanceEvent>(&format!(
        r#"
        SELECT {} FROM attendance_log
        WHERE employee_id = ? AND occurred_at >= ? AND occurred_at < ?
        ORDER BY occurred_at, id
        "#,
        EVENT_COLUMNS
    ))
    .bind(employee_id)
    .bind(range_start)
    .bind(range_end)
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("Failed to load attendance events"))?;

    let reduced = reduce_daily(&events);
    let total_minutes = total_worked_minutes(&reduced);

    let days = reduced
        .into_iter()
        .map(|day| {
            let worked_minutes = day.worked_minutes();
            DailyRow {
                worked: format_minutes(worked_minutes),
                worked_minutes,
                day,
            }
        })
        .collect();

    Ok(HttpResponse::Ok().json(DailyReport {
        employee_id,
        from,
        to,
        days,
        total_minutes,
        total: format_minutes(Some(total_minutes)),
    }))
}
