use sqlx::FromRow;

/// Login account. `employee_id` links the identity to its employee record.
#[derive(Debug, FromRow)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub password: String,
    pub role_id: u8,
    pub employee_id: Option<u64>,
    pub is_active: bool,
}
