use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::string_column;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    Open,
    Closed,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApplicationStatus {
    New,
    Reviewing,
    Interview,
    Offered,
    Rejected,
    Hired,
}

string_column!(JobStatus, ApplicationStatus);

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct JobPosting {
    pub id: u64,
    #[schema(example = "Mathematics Teacher")]
    pub title: String,
    pub department: Option<String>,
    pub location: Option<String>,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    #[schema(value_type = String, format = "date-time")]
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct JobApplication {
    pub id: u64,
    pub job_id: u64,
    pub applicant_name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Location of the uploaded resume in the object store.
    pub resume_url: Option<String>,
    pub cover_letter: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ApplicationStatus,
    #[schema(value_type = String, format = "date-time")]
    pub applied_at: DateTime<Utc>,
}
