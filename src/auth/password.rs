use argon2::{
    Argon2,
    password_hash::{
        Error, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use uuid::Uuid;

pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
}

pub fn verify_password(password: &str, hashed: &str) -> Result<(), Error> {
    let parsed = PasswordHash::new(hashed)?;

    Argon2::default().verify_password(password.as_bytes(), &parsed)
}

/// One-time password handed out with a freshly provisioned account.
pub fn temporary_password() -> String {
    Uuid::new_v4().to_simple().to_string()[..16].to_string()
}
