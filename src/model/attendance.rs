use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::string_column;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventKind {
    In,
    Out,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventSource {
    /// Clocked through the API by the employee.
    #[serde(rename = "self")]
    #[strum(serialize = "self")]
    SelfService,
    /// Pushed by a physical attendance terminal.
    Terminal,
}

string_column!(EventKind, EventSource);

/// One raw clock event. `id` is the ingestion sequence.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceEvent {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date-time", example = "2024-06-03T08:58:00")]
    pub occurred_at: NaiveDateTime,
    #[sqlx(try_from = "String")]
    pub kind: EventKind,
    #[sqlx(try_from = "String")]
    pub source: EventSource,
}

/// The logical attendance of one employee on one date.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DailyAttendance {
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, example = "08:58:00")]
    pub check_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "17:32:00")]
    pub check_out: Option<NaiveTime>,
}

impl DailyAttendance {
    /// Minutes between check-in and check-out.
    ///
    /// `None` when either side is missing or the check-out precedes the
    /// check-in; such days count as zero worked time.
    pub fn worked_minutes(&self) -> Option<i64> {
        match (self.check_in, self.check_out) {
            (Some(i), Some(o)) if o >= i => Some((o - i).num_minutes()),
            _ => None,
        }
    }
}
