use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};

/// 401 in the same `{"message": ..}` shape as every other failure.
fn reject(req: ServiceRequest, message: impl Into<String>) -> ServiceResponse<BoxBody> {
    let resp = AppError::Unauthorized(message.into()).error_response();
    req.into_response(resp)
}

/// Verifies the bearer access token and stores the caller as [`AuthUser`].
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let header_value = match req.headers().get("Authorization") {
        Some(h) => match h.to_str() {
            Ok(v) => v.to_string(),
            Err(_) => {
                return Ok(reject(req, "Invalid Authorization header encoding"));
            }
        },
        None => return Ok(reject(req, "Missing Authorization header")),
    };

    let token = match header_value.strip_prefix("Bearer ") {
        Some(t) => t,
        None => {
            return Ok(reject(req, "Authorization header must start with Bearer"));
        }
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected bearer token");
            return Ok(reject(req, "Invalid or expired token"));
        }
    };

    let auth_user = match AuthUser::from_claims(claims) {
        Ok(u) => u,
        Err(e) => return Ok(reject(req, e.to_string())),
    };

    tracing::debug!(user_id = auth_user.user_id, role = ?auth_user.role, "Authenticated");
    req.extensions_mut().insert(auth_user);

    next.call(req).await
}
