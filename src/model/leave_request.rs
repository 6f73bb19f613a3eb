use chrono::{DateTime, NaiveDate, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumString};
use utoipa::ToSchema;

use super::string_column;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    EnumString,
    StrumDisplay,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

string_column!(LeaveStatus);

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum LeaveAction {
    Approve,
    Reject,
    Edit,
}

#[derive(Debug, Display, PartialEq, Eq)]
#[display(fmt = "Cannot {} a {} leave request", action, from)]
pub struct TransitionError {
    pub from: LeaveStatus,
    pub action: LeaveAction,
}

impl LeaveStatus {
    /// `pending -> approved | rejected`; `edit` reopens any request.
    pub fn apply(self, action: LeaveAction) -> Result<LeaveStatus, TransitionError> {
        match (self, action) {
            (LeaveStatus::Pending, LeaveAction::Approve) => Ok(LeaveStatus::Approved),
            (LeaveStatus::Pending, LeaveAction::Reject) => Ok(LeaveStatus::Rejected),
            (_, LeaveAction::Edit) => Ok(LeaveStatus::Pending),
            (from, action) => Err(TransitionError { from, action }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "employee_id": 1000,
    "start_date": "2026-01-01",
    "end_date": "2026-01-03",
    "leave_type": "sick",
    "reason": "Flu",
    "status": "pending",
    "manager_notes": null,
    "decided_by": null,
    "version": 0,
    "created_at": "2026-01-01T00:00:00Z",
    "updated_at": "2026-01-01T00:00:00Z"
}))]
pub struct LeaveRequest {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    /// Inclusive.
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub leave_type: String,
    pub reason: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: LeaveStatus,
    pub manager_notes: Option<String>,
    pub decided_by: Option<String>,
    /// Bumped on every write; writers must present the version they read.
    pub version: u32,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

/// Fields an edit may replace.
#[derive(Debug, Clone)]
pub struct LeaveChanges {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub leave_type: String,
    pub reason: Option<String>,
}

impl LeaveRequest {
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    pub fn decide(
        &mut self,
        action: LeaveAction,
        decided_by: &str,
        notes: Option<String>,
    ) -> Result<(), TransitionError> {
        if action == LeaveAction::Edit {
            return Err(TransitionError {
                from: self.status,
                action,
            });
        }
        self.status = self.status.apply(action)?;
        self.decided_by = Some(decided_by.to_string());
        self.manager_notes = notes;
        Ok(())
    }

    /// Replaces the request body and sends it back for approval.
    pub fn edit(&mut self, changes: LeaveChanges) -> Result<(), TransitionError> {
        self.status = self.status.apply(LeaveAction::Edit)?;
        self.start_date = changes.start_date;
        self.end_date = changes.end_date;
        self.leave_type = changes.leave_type;
        self.reason = changes.reason;
        self.manager_notes = None;
        self.decided_by = None;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample(id: u64, employee_id: u64, start: NaiveDate, end: NaiveDate) -> LeaveRequest {
    LeaveRequest {
        id,
        employee_id,
        start_date: start,
        end_date: end,
        leave_type: "annual".into(),
        reason: None,
        status: LeaveStatus::Pending,
        manager_notes: None,
        decided_by: None,
        version: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn pending_can_be_decided_once() {
        assert_eq!(
            LeaveStatus::Pending.apply(LeaveAction::Approve),
            Ok(LeaveStatus::Approved)
        );
        assert_eq!(
            LeaveStatus::Pending.apply(LeaveAction::Reject),
            Ok(LeaveStatus::Rejected)
        );

        for decided in [LeaveStatus::Approved, LeaveStatus::Rejected] {
            for action in [LeaveAction::Approve, LeaveAction::Reject] {
                assert!(decided.apply(action).is_err());
            }
        }
    }

    #[test]
    fn edit_reopens_from_any_state() {
        for from in [LeaveStatus::Pending, LeaveStatus::Approved, LeaveStatus::Rejected] {
            assert_eq!(from.apply(LeaveAction::Edit), Ok(LeaveStatus::Pending));
        }
    }

    #[test]
    fn approve_then_edit_resets_status_and_notes() {
        let mut leave = sample(1, 7, d(2024, 6, 25), d(2024, 7, 5));
        leave
            .decide(LeaveAction::Approve, "hr@company.com", Some("enjoy".into()))
            .unwrap();
        assert_eq!(leave.status, LeaveStatus::Approved);
        assert_eq!(leave.manager_notes.as_deref(), Some("enjoy"));

        leave
            .edit(LeaveChanges {
                start_date: d(2024, 6, 26),
                end_date: d(2024, 7, 5),
                leave_type: "annual".into(),
                reason: Some("shorter".into()),
            })
            .unwrap();

        assert_eq!(leave.status, LeaveStatus::Pending);
        assert_eq!(leave.manager_notes, None);
        assert_eq!(leave.decided_by, None);
        assert_eq!(leave.start_date, d(2024, 6, 26));
    }

    #[test]
    fn decide_rejects_edit_action() {
        let mut leave = sample(1, 7, d(2024, 1, 1), d(2024, 1, 1));
        let err = leave.decide(LeaveAction::Edit, "hr", None).unwrap_err();
        assert_eq!(err.to_string(), "Cannot edit a pending leave request");
    }

    #[test]
    fn second_decision_is_refused() {
        let mut leave = sample(1, 7, d(2024, 1, 1), d(2024, 1, 2));
        leave.decide(LeaveAction::Reject, "hr", None).unwrap();

        let err = leave.decide(LeaveAction::Approve, "hr", None).unwrap_err();
        assert_eq!(err.to_string(), "Cannot approve a rejected leave request");
        assert_eq!(leave.days(), 2);
    }
}
