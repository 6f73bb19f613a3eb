use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// The small admin-managed lists that feed form dropdowns.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReferenceList {
    Roles,
    Departments,
    Campuses,
    Stages,
    LeaveTypes,
    JobTitles,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ReferenceItem {
    pub id: u64,
    #[schema(example = "leave_types")]
    pub list_name: String,
    #[schema(example = "annual")]
    pub value: String,
}
