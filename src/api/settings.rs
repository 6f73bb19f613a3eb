use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use std::str::FromStr;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::{
    auth::auth::AuthUser,
    error::{AppError, FieldErrors, db_error, is_duplicate_key},
    model::reference::{ReferenceItem, ReferenceList},
    utils::validation,
};

#[derive(Deserialize, ToSchema)]
pub struct NewReferenceItem {
    #[schema(example = "annual")]
    pub value: String,
}

fn list_from_path(raw: &str) -> Result<ReferenceList, AppError> {
    ReferenceList::from_str(raw).map_err(|_| AppError::not_found("Settings list"))
}

#[utoipa::path(
    get,
    path = "/api/settings/{list}",
    params(("list" = ReferenceList, Path, description = "Which list")),
    responses(
        (status = 200, body = [ReferenceItem]),
        (status = 404, description = "Unknown list")
    ),
    security(("bearer_auth" = [])),
    tag = "Settings"
)]
pub async fn list_items(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let list = list_from_path(&path)?;

    let items = sqlx::query_as::<_, ReferenceItem>(
        "SELECT id, list_name, value FROM reference_items WHERE list_name = ? ORDER BY value",
    )
    .bind(list.as_ref())
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("Failed to load settings list"))?;

    Ok(HttpResponse::Ok().json(items))
}

#[utoipa::path(
    post,
    path = "/api/settings/{list}",
    params(("list" = ReferenceList, Path, description = "Which list")),
    request_body = NewReferenceItem,
    responses(
        (status = 201, body = ReferenceItem),
        (status = 404, description = "Unknown list"),
        (status = 409, description = "Value already present"),
        (status = 422, description = "Empty value")
    ),
    security(("bearer_auth" = [])),
    tag = "Settings"
)]
pub async fn add_item(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
    payload: web::Json<NewReferenceItem>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let list = list_from_path(&path)?;

    let value = payload.value.trim();
    let mut errors = FieldErrors::new();
    validation::require_text(&mut errors, "value", value);
    validation::max_len(&mut errors, "value", value, 100);
    errors.into_result()?;

    let inserted = sqlx::query("INSERT INTO reference_items (list_name, value) VALUES (?, ?)")
        .bind(list.as_ref())
        .bind(value)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::Conflict(format!("'{}' is already in {}", value, list))
            } else {
                error!(error = %e, %list, "Failed to add settings item");
                AppError::Backend
            }
        })?;

    info!(%list, value, actor = %auth.username, "Settings item added");

    Ok(HttpResponse::Created().json(ReferenceItem {
        id: inserted.last_insert_id(),
        list_name: list.to_string(),
        value: value.to_string(),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/settings/{list}/{id}",
    params(
        ("list" = ReferenceList, Path, description = "Which list"),
        ("id" = u64, Path, description = "Item ID")
    ),
    responses(
        (status = 204, description = "Item removed"),
        (status = 404, description = "Unknown list or item")
    ),
    security(("bearer_auth" = [])),
    tag = "Settings"
)]
pub async fn delete_item(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(String, u64)>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let (raw, item_id) = path.into_inner();
    let list = list_from_path(&raw)?;

    let result = sqlx::query("DELETE FROM reference_items WHERE id = ? AND list_name = ?")
        .bind(item_id)
        .bind(list.as_ref())
        .execute(pool.get_ref())
        .await
        .map_err(db_error("Failed to delete settings item"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Settings item"));
    }

    info!(%list, item_id, actor = %auth.username, "Settings item removed");
    Ok(HttpResponse::NoContent().finish())
}
