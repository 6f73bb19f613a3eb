use serde::Serialize;
use serde_json::Value;
use sqlx::{MySqlPool, types::Json};
use tracing::{debug, error};

use crate::auth::auth::AuthUser;

/// An audit entry before it is written.
#[derive(Debug)]
pub struct AuditRecord {
    pub actor: String,
    pub action: &'static str,
    pub target: Option<String>,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl AuditRecord {
    pub fn new(auth: &AuthUser, action: &'static str) -> Self {
        Self {
            actor: auth.username.clone(),
            action,
            target: None,
            before: None,
            after: None,
        }
    }

    pub fn target(mut self, table: &str, id: u64) -> Self {
        self.target = Some(format!("{}/{}", table, id));
        self
    }

    pub fn before<T: Serialize>(mut self, state: &T) -> Self {
        self.before = serde_json::to_value(state).ok();
        self
    }

    pub fn after<T: Serialize>(mut self, state: &T) -> Self {
        self.after = serde_json::to_value(state).ok();
        self
    }
}

/// Appends an entry to `system_logs`.
///
/// A failed audit write is logged and swallowed; the business operation it
/// describes has already happened.
pub async fn record(pool: &MySqlPool, entry: AuditRecord) {
    debug!(actor = %entry.actor, action = entry.action, "Writing audit entry");

    let result = sqlx::query(
        r#"
        INSERT INTO system_logs (actor, action, target, before_state, after_state)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.actor)
    .bind(entry.action)
    .bind(&entry.target)
    .bind(entry.before.map(Json))
    .bind(entry.after.map(Json))
    .execute(pool)
    .await;

    if let Err(e) = result {
        error!(error = %e, action = entry.action, target = ?entry.target, "Failed to write audit entry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;
    use serde_json::json;

    #[test]
    fn builder_captures_diff() {
        let auth = AuthUser {
            user_id: 1,
            username: "hr@company.com".into(),
            role: Role::Hr,
            employee_id: None,
        };

        let entry = AuditRecord::new(&auth, "employee.update")
            .target("employees", 42)
            .before(&json!({"campus": "North"}))
            .after(&json!({"campus": "South"}));

        assert_eq!(entry.actor, "hr@company.com");
        assert_eq!(entry.target.as_deref(), Some("employees/42"));
        assert_eq!(entry.before.unwrap()["campus"], "North");
        assert_eq!(entry.after.unwrap()["campus"], "South");
    }
}
