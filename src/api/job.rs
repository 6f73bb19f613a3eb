use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    error::{AppError, FieldErrors, db_error},
    model::job::{ApplicationStatus, JobApplication, JobPosting, JobStatus},
    services::{
        audit::{self, AuditRecord},
        feed::{ChangeEvent, ChangeFeed, ChangeKind, Collection},
    },
    utils::{
        db_utils::{Filters, build_update_sql, execute_update, paginate, patch_fields},
        validation::{self, Validate},
    },
};

const JOB_COLUMNS: &str = "id, title, department, location, description, status, posted_at";
const APPLICATION_COLUMNS: &str =
    "id, job_id, applicant_name, email, phone, resume_url, cover_letter, status, applied_at";

const UPDATABLE_COLUMNS: &[&str] = &["title", "department", "location", "description", "status"];

#[derive(Deserialize, ToSchema)]
pub struct CreateJob {
    #[schema(example = "Mathematics Teacher")]
    pub title: String,
    pub department: Option<String>,
    pub location: Option<String>,
    pub description: String,
}

impl Validate for CreateJob {
    fn validate(&self, errors: &mut FieldErrors) {
        validation::require_text(errors, "title", &self.title);
        validation::max_len(errors, "title", &self.title, 200);
        validation::require_text(errors, "description", &self.description);
    }
}

#[derive(Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateJob {
    pub title: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub status: Option<JobStatus>,
}

impl Validate for UpdateJob {
    fn validate(&self, errors: &mut FieldErrors) {
        validation::optional_text(errors, "title", self.title.as_deref());
        validation::optional_text(errors, "description", self.description.as_deref());
    }
}

#[derive(Deserialize, IntoParams)]
pub struct JobQuery {
    pub status: Option<JobStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct JobListResponse {
    pub data: Vec<JobPosting>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateApplication {
    #[schema(example = "Ada Lovelace")]
    pub applicant_name: String,
    #[schema(example = "ada@example.com", format = "email")]
    pub email: String,
    pub phone: Option<String>,
    pub resume_url: Option<String>,
    pub cover_letter: Option<String>,
}

impl Validate for CreateApplication {
    fn validate(&self, errors: &mut FieldErrors) {
        validation::require_text(errors, "applicant_name", &self.applicant_name);
        validation::email(errors, "email", &self.email);
        validation::phone(errors, "phone", self.phone.as_deref());
        if let Some(url) = &self.resume_url {
            validation::max_len(errors, "resume_url", url, 1024);
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ApplicationStatusUpdate {
    pub status: ApplicationStatus,
}

async fn fetch_job(pool: &MySqlPool, job_id: u64) -> Result<JobPosting, AppError> {
    sqlx::query_as::<_, JobPosting>(&format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS))
        .bind(job_id)
        .fetch_optional(pool)
        .await
        .map_err(db_error("Failed to fetch job"))?
        .ok_or_else(|| AppError::not_found("Job"))
}

async fn fetch_application(pool: &MySqlPool, id: u64) -> Result<JobApplication, AppError> {
    sqlx::query_as::<_, JobApplication>(&format!(
        "SELECT {} FROM job_applications WHERE id = ?",
        APPLICATION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(db_error("Failed to fetch application"))?
    .ok_or_else(|| AppError::not_found("Application"))
}

fn publish(feed: &ChangeFeed, id: u64, kind: ChangeKind) {
    feed.publish(ChangeEvent {
        collection: Collection::Jobs,
        kind,
        id,
        employee_id: None,
    });
}

#[utoipa::path(
    post,
    path = "/api/jobs",
    request_body = CreateJob,
    responses(
        (status = 201, description = "Job posted", body = JobPosting),
        (status = 403, description = "HR/Admin only"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Jobs"
)]
pub async fn create_job(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    payload: web::Json<CreateJob>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    payload.check()?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO jobs (title, department, location, description, status)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.title.trim())
    .bind(&payload.department)
    .bind(&payload.location)
    .bind(&payload.description)
    .bind(JobStatus::Open.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(db_error("Failed to create job"))?;

    let job = fetch_job(pool.get_ref(), inserted.last_insert_id()).await?;

    audit::record(
        pool.get_ref(),
        AuditRecord::new(&auth, "job.create")
            .target("jobs", job.id)
            .after(&job),
    )
    .await;
    publish(&feed, job.id, ChangeKind::Created);

    info!(job_id = job.id, "Job posted");
    Ok(HttpResponse::Created().json(job))
}

#[utoipa::path(
    get,
    path = "/api/jobs",
    params(JobQuery),
    responses(
        (status = 200, body = JobListResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Jobs"
)]
pub async fn list_jobs(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<JobQuery>,
) -> Result<HttpResponse, AppError> {
    let (page, per_page, offset) = paginate(query.page, query.per_page, 20);

    let mut filters = Filters::new();
    filters.eq_str("status", query.status.as_ref().map(|s| s.as_ref()));
    let where_sql = filters.where_clause();

    let total: i64 = filters
        .bind_scalar(sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM jobs {}",
            where_sql
        )))
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_error("Failed to count jobs"))?;

    let data_sql = format!(
        "SELECT {} FROM jobs {} ORDER BY posted_at DESC, id DESC LIMIT ? OFFSET ?",
        JOB_COLUMNS, where_sql
    );
    let data = filters
        .bind_as(sqlx::query_as::<_, JobPosting>(&data_sql))
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("Failed to list jobs"))?;

    Ok(HttpResponse::Ok().json(JobListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/jobs/{id}",
    params(("id" = u64, Path, description = "Job ID")),
    responses(
        (status = 200, body = JobPosting),
        (status = 404, description = "Job not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Jobs"
)]
pub async fn get_job(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let job = fetch_job(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(job))
}

#[utoipa::path(
    put,
    path = "/api/jobs/{id}",
    params(("id" = u64, Path, description = "Job ID")),
    request_body = UpdateJob,
    responses(
        (status = 200, body = JobPosting),
        (status = 404, description = "Job not found"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Jobs"
)]
pub async fn update_job(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
    payload: web::Json<UpdateJob>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    payload.check()?;
    let job_id = path.into_inner();

    let before = fetch_job(pool.get_ref(), job_id).await?;

    let update = build_update_sql(
        "jobs",
        &patch_fields(&payload.into_inner()),
        UPDATABLE_COLUMNS,
        "id",
        job_id,
    )?;
    execute_update(pool.get_ref(), update)
        .await
        .map_err(db_error("Failed to update job"))?;

    let after = fetch_job(pool.get_ref(), job_id).await?;

    audit::record(
        pool.get_ref(),
        AuditRecord::new(&auth, "job.update")
            .target("jobs", job_id)
            .before(&before)
            .after(&after),
    )
    .await;
    publish(&feed, job_id, ChangeKind::Updated);

    Ok(HttpResponse::Ok().json(after))
}

#[utoipa::path(
    delete,
    path = "/api/jobs/{id}",
    params(("id" = u64, Path, description = "Job ID")),
    responses(
        (status = 204, description = "Job and its applications deleted"),
        (status = 404, description = "Job not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Jobs"
)]
pub async fn delete_job(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let job_id = path.into_inner();

    let before = fetch_job(pool.get_ref(), job_id).await?;

    sqlx::query("DELETE FROM jobs WHERE id = ?")
        .bind(job_id)
        .execute(pool.get_ref())
        .await
        .map_err(db_error("Failed to delete job"))?;

    audit::record(
        pool.get_ref(),
        AuditRecord::new(&auth, "job.delete")
            .target("jobs", job_id)
            .before(&before),
    )
    .await;
    publish(&feed, job_id, ChangeKind::Deleted);

    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/jobs/{id}/applications",
    params(("id" = u64, Path, description = "Job ID")),
    request_body = CreateApplication,
    responses(
        (status = 201, body = JobApplication),
        (status = 404, description = "Job not found"),
        (status = 409, description = "Job is closed"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Jobs"
)]
pub async fn apply_to_job(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<CreateApplication>,
) -> Result<HttpResponse, AppError> {
    payload.check()?;
    let job = fetch_job(pool.get_ref(), path.into_inner()).await?;

    if job.status == JobStatus::Closed {
        return Err(AppError::Conflict("Job posting is closed".into()));
    }

    let inserted = sqlx::query(
        r#"
        INSERT INTO job_applications
            (job_id, applicant_name, email, phone, resume_url, cover_letter, status)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(job.id)
    .bind(payload.applicant_name.trim())
    .bind(payload.email.trim())
    .bind(&payload.phone)
    .bind(&payload.resume_url)
    .bind(&payload.cover_letter)
    .bind(ApplicationStatus::New.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(db_error("Failed to store application"))?;

    let application = fetch_application(pool.get_ref(), inserted.last_insert_id()).await?;

    info!(job_id = job.id, application_id = application.id, "Application received");
    Ok(HttpResponse::Created().json(application))
}

#[utoipa::path(
    get,
    path = "/api/jobs/{id}/applications",
    params(("id" = u64, Path, description = "Job ID")),
    responses(
        (status = 200, body = [JobApplication]),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Job not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Jobs"
)]
pub async fn list_applications(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let job = fetch_job(pool.get_ref(), path.into_inner()).await?;

    let applications = sqlx::query_as::<_, JobApplication>(&format!(
        "SELECT {} FROM job_applications WHERE job_id = ? ORDER BY applied_at DESC, id DESC",
        APPLICATION_COLUMNS
    ))
    .bind(job.id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("Failed to list applications"))?;

    Ok(HttpResponse::Ok().json(applications))
}

#[utoipa::path(
    put,
    path = "/api/applications/{id}/status",
    params(("id" = u64, Path, description = "Application ID")),
    request_body = ApplicationStatusUpdate,
    responses(
        (status = 200, body = JobApplication),
        (status = 404, description = "Application not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Jobs"
)]
pub async fn set_application_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ApplicationStatusUpdate>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let application_id = path.into_inner();

    let before = fetch_application(pool.get_ref(), application_id).await?;

    sqlx::query("UPDATE job_applications SET status = ? WHERE id = ?")
        .bind(payload.status.as_ref())
        .bind(application_id)
        .execute(pool.get_ref())
        .await
        .map_err(db_error("Failed to update application status"))?;

    let after = fetch_application(pool.get_ref(), application_id).await?;

    audit::record(
        pool.get_ref(),
        AuditRecord::new(&auth, "application.status")
            .target("job_applications", application_id)
            .before(&before)
            .after(&after),
    )
    .await;

    Ok(HttpResponse::Ok().json(after))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closing_a_job_is_a_plain_column_update() {
        let patch = UpdateJob {
            status: Some(JobStatus::Closed),
            ..Default::default()
        };
        let update =
            build_update_sql("jobs", &patch_fields(&patch), UPDATABLE_COLUMNS, "id", 9).unwrap();
        assert_eq!(update.sql, "UPDATE jobs SET status = ? WHERE id = ?");
    }

    #[test]
    fn applications_need_a_name_and_valid_email() {
        let app = CreateApplication {
            applicant_name: "".into(),
            email: "ada-at-example".into(),
            phone: None,
            resume_url: None,
            cover_letter: None,
        };
        match app.check() {
            Err(AppError::Validation(errors)) => {
                assert!(errors.get("applicant_name").is_some());
                assert!(errors.get("email").is_some());
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
