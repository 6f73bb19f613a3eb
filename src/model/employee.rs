use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::string_column;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmployeeStatus {
    Active,
    OnLeave,
    Terminated,
}

string_column!(EmployeeStatus);

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP-001",
        "first_name": "John",
        "last_name": "Doe",
        "email": "john.doe@company.com",
        "phone": "+8801712345678",
        "department": "Engineering",
        "role": "Teacher",
        "campus": "North",
        "stage": "Secondary",
        "status": "active",
        "hire_date": "2024-01-01",
        "leaving_date": null,
        "hourly_rate": 18.5,
        "manager": "jane.roe@company.com",
        "created_at": "2024-01-01T09:00:00Z"
    })
)]
pub struct Employee {
    pub id: u64,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub role: Option<String>,
    pub campus: Option<String>,
    pub stage: Option<String>,

    #[sqlx(try_from = "String")]
    pub status: EmployeeStatus,

    #[schema(value_type = String, format = "date")]
    pub hire_date: NaiveDate,

    /// Set when the employee is deactivated; the row itself is kept.
    #[schema(value_type = Option<String>, format = "date")]
    pub leaving_date: Option<NaiveDate>,

    pub hourly_rate: Option<f64>,

    /// Reporting manager, stored as a display name or an email address.
    pub manager: Option<String>,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// The manager reference, when it is an address we can notify.
    pub fn manager_email(&self) -> Option<&str> {
        self.manager.as_deref().filter(|m| m.contains('@'))
    }

    /// Hired on or before `end` and not gone before `start`.
    pub fn employed_during(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.hire_date <= end && self.leaving_date.map_or(true, |left| left >= start)
    }
}

#[cfg(test)]
pub(crate) fn sample(id: u64) -> Employee {
    Employee {
        id,
        employee_code: format!("EMP-{:03}", id),
        first_name: "John".into(),
        last_name: "Doe".into(),
        email: format!("john{}@company.com", id),
        phone: None,
        department: Some("Engineering".into()),
        role: None,
        campus: None,
        stage: None,
        status: EmployeeStatus::Active,
        hire_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        leaving_date: None,
        hourly_rate: Some(20.0),
        manager: Some("Jane Roe".into()),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_column_text() {
        assert_eq!(EmployeeStatus::OnLeave.as_ref(), "on_leave");
        assert_eq!(
            EmployeeStatus::try_from("terminated".to_string()).unwrap(),
            EmployeeStatus::Terminated
        );
        assert!(EmployeeStatus::try_from("retired".to_string()).is_err());
    }

    #[test]
    fn manager_email_only_when_address() {
        let mut e = sample(1);
        assert_eq!(e.manager_email(), None);

        e.manager = Some("jane.roe@company.com".into());
        assert_eq!(e.manager_email(), Some("jane.roe@company.com"));
    }

    #[test]
    fn employment_window() {
        let mut e = sample(1);
        let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day).unwrap();

        assert!(e.employed_during(d(5, 1), d(5, 31)));

        e.leaving_date = Some(d(4, 30));
        assert!(e.employed_during(d(4, 1), d(4, 30)));
        assert!(!e.employed_during(d(5, 1), d(5, 31)));

        e.hire_date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(!e.employed_during(d(4, 1), d(4, 30)));
    }
}
