use crate::{
    auth::{
        jwt::{Claims, Identity, TokenType, issue_token, verify_token},
        password::verify_password,
    },
    config::Config,
    error::{AppError, db_error},
    model::user::User,
    utils::login_index,
};
use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

#[derive(Deserialize)]
pub struct LoginReqDto {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Issues an access/refresh pair and stores the refresh token's jti.
async fn issue_pair(
    identity: &Identity,
    pool: &MySqlPool,
    config: &Config,
) -> Result<TokenPair, AppError> {
    let token_err = |e: jsonwebtoken::errors::Error| {
        error!(error = %e, "Failed to sign token");
        AppError::Backend
    };

    let (access_token, _) = issue_token(
        identity,
        TokenType::Access,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(token_err)?;

    let (refresh_token, refresh_claims) = issue_token(
        identity,
        TokenType::Refresh,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(token_err)?;

    debug!(user_id = identity.user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(identity.user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await
    .map_err(db_error("Failed to store refresh token"))?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    let username = login_index::normalize(&user.username);
    if username.is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        let mut errors = crate::error::FieldErrors::new();
        if username.is_empty() {
            errors.add("username", "must not be empty");
        }
        if user.password.is_empty() {
            errors.add("password", "must not be empty");
        }
        return Err(AppError::Validation(errors));
    }

    let invalid = || AppError::Unauthorized("Invalid credentials".into());

    let db_user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role_id, employee_id, is_active
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(&username)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(db_error("Database error while fetching user"))?
    .ok_or_else(|| {
        info!("Invalid credentials: user not found");
        invalid()
    })?;

    if !db_user.is_active {
        info!(user_id = db_user.id, "Login refused: account disabled");
        return Err(invalid());
    }

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(invalid());
    }

    let identity = Identity {
        user_id: db_user.id,
        username: db_user.username.clone(),
        role: db_user.role_id,
        employee_id: db_user.employee_id,
    };

    let pair = issue_pair(&identity, pool.get_ref(), &config).await?;

    // non-fatal
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    login_index::record_taken(&db_user.username).await;
    info!(user_id = db_user.id, "Login successful");

    Ok(HttpResponse::Ok().json(pair))
}

fn refresh_claims(req: &HttpRequest, config: &Config) -> Result<Claims, AppError> {
    let token = bearer_token(req).ok_or_else(|| AppError::Unauthorized("No token".into()))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid token".into()))?;

    if claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized("Refresh token required".into()));
    }

    Ok(claims)
}

/// Rotates a refresh token: the presented one is revoked, a new pair issued.
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let claims = refresh_claims(&req, &config)?;

    // revoke only if still live; a second use of the same token finds nothing
    let revoked = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = TRUE
        WHERE jti = ? AND revoked = FALSE
        "#,
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await
    .map_err(db_error("Failed to revoke refresh token"))?;

    if revoked.rows_affected() == 0 {
        info!(user_id = claims.user_id, "Refresh with unknown or revoked token");
        return Err(AppError::Unauthorized("Refresh token revoked".into()));
    }

    let pair = issue_pair(&Identity::from(&claims), pool.get_ref(), &config).await?;

    Ok(HttpResponse::Ok().json(pair))
}

/// Revokes the presented refresh token. Always answers 204.
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    let claims = match refresh_claims(&req, &config) {
        Ok(c) => c,
        Err(_) => return HttpResponse::NoContent().finish(),
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token on logout");
    }

    HttpResponse::NoContent().finish()
}
