use crate::api::attendance::{
    DailyReport, DailyRow, IngestReport, RejectedEvent, TerminalBatch, TerminalEvent,
};
use crate::api::employee::{
    AccountRole, CreateEmployee, CreatedEmployee, DeactivateEmployee, EmployeeListResponse,
    UpdateEmployee,
};
use crate::api::job::{
    ApplicationStatusUpdate, CreateApplication, CreateJob, JobListResponse, UpdateJob,
};
use crate::api::leave_request::{
    CreateLeave, EditLeave, LeaveDecision, LeaveFilter, LeaveListResponse,
};
use crate::api::payroll::{CreatePayroll, PaginatedPayrollResponse, PayrollQuery, UpdatePayroll};
use crate::api::report::{ExportFormat, PayrollReportResponse, SummaryResponse};
use crate::api::settings::NewReferenceItem;
use crate::api::system_log::SystemLogListResponse;
use crate::model::attendance::{AttendanceEvent, DailyAttendance, EventKind, EventSource};
use crate::model::employee::{Employee, EmployeeStatus};
use crate::model::job::{ApplicationStatus, JobApplication, JobPosting, JobStatus};
use crate::model::leave_request::{LeaveRequest, LeaveStatus};
use crate::model::payroll::MonthlyPayroll;
use crate::model::reference::{ReferenceItem, ReferenceList};
use crate::model::system_log::SystemLogEntry;
use crate::reporting::aggregator::{Metric, WorkSource};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM System API",
        version = "2.0.0",
        description = r#"
## Human Resource Management (HRM) System

Staff records, leave, attendance, payroll and recruiting for one organization.

### 🔹 Key Features
- **Employee Management**
  - Create (with login account), update, deactivate and view employee profiles
- **Leave Management**
  - Apply, edit, approve/reject with optimistic versioning, live updates over SSE
- **Attendance Management**
  - Self check-in/out, bulk terminal ingestion, daily worked time
- **Payroll & Reports**
  - Monthly payroll rows, period summaries, yearly tables as JSON, CSV or PDF
- **Recruiting & Settings**
  - Job postings, applications and the dropdown lists used by forms

### 🔐 Security
Every endpoint under `/api` requires a **JWT Bearer** access token from `/auth/login`.
Roles: Admin, HR, Manager, Employee, System and API user.

### 📦 Response Format
- JSON bodies; errors as `{"message": ..., "errors": {field: [..]}}`
- Pagination supported for list endpoints

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::edit_leave,
        crate::api::leave_request::delete_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::live_leave,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::ingest_events,
        crate::api::attendance::daily_attendance,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::get_me,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::deactivate_employee,
        crate::api::employee::delete_employee,

        crate::api::payroll::create_payroll,
        crate::api::payroll::update_payroll,
        crate::api::payroll::get_payroll,
        crate::api::payroll::list_payrolls,

        crate::api::report::period_summary,
        crate::api::report::payroll_report,

        crate::api::job::create_job,
        crate::api::job::list_jobs,
        crate::api::job::get_job,
        crate::api::job::update_job,
        crate::api::job::delete_job,
        crate::api::job::apply_to_job,
        crate::api::job::list_applications,
        crate::api::job::set_application_status,

        crate::api::settings::list_items,
        crate::api::settings::add_item,
        crate::api::settings::delete_item,

        crate::api::system_log::list_system_logs
    ),
    components(
        schemas(
            LeaveFilter,
            LeaveRequest,
            LeaveStatus,
            LeaveListResponse,
            CreateLeave,
            EditLeave,
            LeaveDecision,
            AttendanceEvent,
            DailyAttendance,
            EventKind,
            EventSource,
            TerminalEvent,
            TerminalBatch,
            RejectedEvent,
            IngestReport,
            DailyRow,
            DailyReport,
            CreateEmployee,
            CreatedEmployee,
            AccountRole,
            UpdateEmployee,
            DeactivateEmployee,
            Employee,
            EmployeeStatus,
            EmployeeListResponse,
            MonthlyPayroll,
            PaginatedPayrollResponse,
            CreatePayroll,
            UpdatePayroll,
            PayrollQuery,
            SummaryResponse,
            PayrollReportResponse,
            ExportFormat,
            Metric,
            WorkSource,
            JobPosting,
            JobStatus,
            JobApplication,
            ApplicationStatus,
            CreateJob,
            UpdateJob,
            JobListResponse,
            CreateApplication,
            ApplicationStatusUpdate,
            ReferenceItem,
            ReferenceList,
            NewReferenceItem,
            SystemLogEntry,
            SystemLogListResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Leave", description = "Leave management APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Payroll", description = "Payroll management APIs"),
        (name = "Reports", description = "Period summaries and payroll exports"),
        (name = "Jobs", description = "Job postings and applications"),
        (name = "Settings", description = "Reference lists for forms"),
        (name = "System", description = "Audit trail"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
