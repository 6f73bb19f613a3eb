use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;

pub const GENERIC_FAILURE: &str = "Something went wrong, Contact with system admin";

/// Per-field validation messages, keyed by the request field name.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation error.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }

    pub fn single(field: &str, message: impl Into<String>) -> AppError {
        let mut errors = Self::new();
        errors.add(field, message);
        AppError::Validation(errors)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

#[derive(Debug, Display)]
pub enum AppError {
    #[display(fmt = "Validation failed: {}", _0)]
    Validation(FieldErrors),

    #[display(fmt = "{}", _0)]
    NotFound(String),

    #[display(fmt = "{}", _0)]
    Conflict(String),

    #[display(fmt = "{}", _0)]
    Forbidden(String),

    #[display(fmt = "{}", _0)]
    Unauthorized(String),

    /// Details are logged where the failure happened, never sent to clients.
    #[display(fmt = "backend failure")]
    Backend,
}

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{} not found", what))
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Backend => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Validation(errors) => json!({
                "message": "Validation failed",
                "errors": errors.0,
            }),
            AppError::Backend => json!({ "message": GENERIC_FAILURE }),
            other => json!({ "message": other.to_string() }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Logs a database error with context and maps it to [`AppError::Backend`].
///
/// ```ignore
/// .await
/// .map_err(db_error("Failed to fetch employee"))?;
/// ```
pub fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| {
        tracing::error!(error = %e, "{}", context);
        AppError::Backend
    }
}

/// MySQL reports duplicate keys as SQLSTATE 23000.
pub fn is_duplicate_key(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23000"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn empty_field_errors_pass() {
        assert!(FieldErrors::new().into_result().is_ok());
    }

    #[test]
    fn field_errors_group_messages_by_field() {
        let mut errors = FieldErrors::new();
        errors.add("email", "must not be empty");
        errors.add("email", "must be a valid email address");
        errors.add("first_name", "must not be empty");

        assert_eq!(errors.get("email").map(|m| m.len()), Some(2));
        assert_eq!(errors.to_string(), "invalid fields: email, first_name");
    }

    #[test]
    fn status_codes_follow_error_class() {
        assert_eq!(
            FieldErrors::single("x", "bad").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::not_found("Employee").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Conflict("stale".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::Backend.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn backend_errors_hide_details() {
        let resp = AppError::Backend.error_response();
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["message"], GENERIC_FAILURE);
    }

    #[actix_web::test]
    async fn validation_errors_list_fields() {
        let resp = FieldErrors::single("end_date", "must not be before start_date").error_response();
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["errors"]["end_date"][0], "must not be before start_date");
    }
}
