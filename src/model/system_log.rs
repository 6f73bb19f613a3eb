use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use utoipa::ToSchema;

/// An audit record. Rows are inserted once and never changed.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct SystemLogEntry {
    pub id: u64,
    /// Username of the acting account, or `system`.
    pub actor: String,
    #[schema(example = "leave.approve")]
    pub action: String,
    #[schema(example = "leave_requests/42")]
    pub target: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub before_state: Option<Json<Value>>,
    #[schema(value_type = Option<Object>)]
    pub after_state: Option<Json<Value>>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
