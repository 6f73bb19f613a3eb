use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub sub: String,
    pub role: u8, // role id
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}

/// Who a token is issued for.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: u64,
    pub username: String,
    pub role: u8,
    pub employee_id: Option<u64>,
}

impl From<&Claims> for Identity {
    fn from(c: &Claims) -> Self {
        Identity {
            user_id: c.user_id,
            username: c.sub.clone(),
            role: c.role,
            employee_id: c.employee_id,
        }
    }
}

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or(0)
}

pub fn issue_token(
    identity: &Identity,
    token_type: TokenType,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let claims = Claims {
        user_id: identity.user_id,
        sub: identity.username.clone(),
        role: identity.role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
        employee_id: identity.employee_id,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            user_id: 5,
            username: "jane@company.com".into(),
            role: 3,
            employee_id: Some(12),
        }
    }

    #[test]
    fn issued_token_verifies() {
        let (token, issued) = issue_token(&identity(), TokenType::Access, "secret", 900).unwrap();
        let claims = verify_token(&token, "secret").unwrap();

        assert_eq!(claims.jti, issued.jti);
        assert_eq!(claims.employee_id, Some(12));
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn wrong_secret_fails() {
        let (token, _) = issue_token(&identity(), TokenType::Refresh, "secret", 900).unwrap();
        assert!(verify_token(&token, "other").is_err());
    }

    #[test]
    fn expired_token_fails() {
        let mut claims = issue_token(&identity(), TokenType::Access, "secret", 0).unwrap().1;
        claims.exp = 1;
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert!(verify_token(&token, "secret").is_err());
    }
}
