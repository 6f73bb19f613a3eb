use crate::auth::jwt::{Claims, TokenType, verify_token};
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl AuthUser {
    /// Builds the caller from verified access-token claims.
    pub fn from_claims(claims: Claims) -> Result<Self, AppError> {
        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }

        let role = Role::from_id(claims.role)
            .ok_or_else(|| AppError::Unauthorized("Invalid role".into()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            employee_id: claims.employee_id,
        })
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin only".into()))
        }
    }

    pub fn require_hr_or_admin(&self) -> Result<(), AppError> {
        if matches!(self.role, Role::Admin | Role::Hr) {
            Ok(())
        } else {
            Err(AppError::Forbidden("HR/Admin only".into()))
        }
    }

    pub fn require_approver(&self) -> Result<(), AppError> {
        if self.role.is_approver() {
            Ok(())
        } else {
            Err(AppError::Forbidden("HR/Admin/Manager only".into()))
        }
    }

    pub fn is_hr_or_admin(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Hr)
    }

    /// The caller's own employee id, required for self-service endpoints.
    pub fn own_employee_id(&self) -> Result<u64, AppError> {
        self.employee_id
            .ok_or_else(|| AppError::Forbidden("No employee profile".into()))
    }

    /// Staff roles may read anyone; everybody else only themselves.
    pub fn can_read_employee(&self, employee_id: u64) -> bool {
        self.role.is_approver() || self.employee_id == Some(employee_id)
    }
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match bearer(req) {
            Some(t) => t,
            None => return ready(Err(AppError::Unauthorized("Missing token".into()))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                tracing::error!("Config missing from app data");
                return ready(Err(AppError::Backend));
            }
        };

        let result = verify_token(token, &config.jwt_secret)
            .map_err(|_| AppError::Unauthorized("Invalid token".into()))
            .and_then(AuthUser::from_claims);

        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, employee_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "u".into(),
            role,
            employee_id,
        }
    }

    #[test]
    fn role_guards() {
        assert!(user(Role::Admin, None).require_admin().is_ok());
        assert!(user(Role::Hr, None).require_admin().is_err());
        assert!(user(Role::Hr, None).require_hr_or_admin().is_ok());
        assert!(user(Role::Manager, None).require_hr_or_admin().is_err());
        assert!(user(Role::Manager, None).require_approver().is_ok());
        assert!(user(Role::Employee, Some(3)).require_approver().is_err());
    }

    #[test]
    fn employees_read_only_themselves() {
        let me = user(Role::Employee, Some(3));
        assert!(me.can_read_employee(3));
        assert!(!me.can_read_employee(4));
        assert!(user(Role::Manager, None).can_read_employee(4));
    }

    #[test]
    fn refresh_tokens_do_not_authenticate_requests() {
        let claims = Claims {
            user_id: 1,
            sub: "u".into(),
            role: 3,
            exp: 0,
            jti: "j".into(),
            token_type: TokenType::Refresh,
            employee_id: None,
        };
        assert!(AuthUser::from_claims(claims).is_err());
    }

    #[test]
    fn missing_profile_is_forbidden() {
        assert!(matches!(
            user(Role::Hr, None).own_employee_id(),
            Err(AppError::Forbidden(_))
        ));
    }
}
