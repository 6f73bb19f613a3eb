use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    error::{AppError, db_error},
    model::system_log::SystemLogEntry,
    utils::db_utils::{Filters, paginate},
};

#[derive(Deserialize, IntoParams)]
pub struct SystemLogQuery {
    /// Username that performed the action
    pub actor: Option<String>,
    /// e.g. `leave.approve`
    pub action: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct SystemLogListResponse {
    pub data: Vec<SystemLogEntry>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Audit trail, newest first.
#[utoipa::path(
    get,
    path = "/api/system-logs",
    params(SystemLogQuery),
    responses(
        (status = 200, body = SystemLogListResponse),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "System"
)]
pub async fn list_system_logs(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SystemLogQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let (page, per_page, offset) = paginate(query.page, query.per_page, 50);

    let mut filters = Filters::new();
    filters.eq_str("actor", query.actor.as_deref());
    filters.eq_str("action", query.action.as_deref());
    let where_sql = filters.where_clause();

    let total: i64 = filters
        .bind_scalar(sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM system_logs {}",
            where_sql
        )))
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_error("Failed to count system logs"))?;

    let data_sql = format!(
        "SELECT id, actor, action, target, before_state, after_state, created_at \
         FROM system_logs {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        where_sql
    );
    let data = filters
        .bind_as(sqlx::query_as::<_, SystemLogEntry>(&data_sql))
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("Failed to list system logs"))?;

    Ok(HttpResponse::Ok().json(SystemLogListResponse {
        data,
        page,
        per_page,
        total,
    }))
}
