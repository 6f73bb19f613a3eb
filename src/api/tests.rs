//! Request-level checks that stop before the database: authentication, role
//! guards and payload validation.

use actix_web::{
    App,
    http::StatusCode,
    middleware::from_fn,
    test,
    web::{self, Data},
};
use chrono::NaiveDate;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use std::sync::Arc;

use crate::{
    auth::{
        jwt::{Identity, TokenType, issue_token},
        middleware::auth_middleware,
    },
    clock::{Clock, FixedClock},
    config::Config,
    model::role::Role,
    routes::protected_routes,
    services::{
        feed::ChangeFeed,
        notifier::{Notifier, testing::RecordingNotifier},
    },
};

fn lazy_pool() -> MySqlPool {
    MySqlPool::connect_lazy("mysql://nobody@127.0.0.1:1/none").unwrap()
}

fn token_for(role: Role, employee_id: Option<u64>, token_type: TokenType) -> String {
    let identity = Identity {
        user_id: 1,
        username: "tester@company.com".into(),
        role: role.id(),
        employee_id,
    };
    issue_token(&identity, token_type, &Config::for_tests().jwt_secret, 900)
        .unwrap()
        .0
}

fn bearer(role: Role, employee_id: Option<u64>) -> (&'static str, String) {
    (
        "Authorization",
        format!("Bearer {}", token_for(role, employee_id, TokenType::Access)),
    )
}

macro_rules! test_app {
    () => {{
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(
            NaiveDate::from_ymd_opt(2024, 6, 17)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        ));
        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::default());

        test::init_service(
            App::new()
                .app_data(Data::new(lazy_pool()))
                .app_data(Data::new(Config::for_tests()))
                .app_data(Data::from(clock))
                .app_data(Data::from(notifier))
                .app_data(Data::new(ChangeFeed::new(16)))
                .service(
                    web::scope("/api")
                        .wrap(from_fn(auth_middleware))
                        .configure(protected_routes),
                ),
        )
        .await
    }};
}

#[actix_web::test]
async fn missing_token_is_unauthorized() {
    let app = test_app!();

    let req = test::TestRequest::get().uri("/api/employee").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Missing Authorization header");
}

#[actix_web::test]
async fn refresh_token_cannot_call_the_api() {
    let app = test_app!();

    let token = token_for(Role::Admin, None, TokenType::Refresh);
    let req = test::TestRequest::get()
        .uri("/api/system-logs")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Access token required");
    assert!(body.get("error").is_none());
}

#[actix_web::test]
async fn malformed_token_is_unauthorized() {
    let app = test_app!();

    let req = test::TestRequest::get()
        .uri("/api/employee/me")
        .insert_header(("Authorization", "Bearer not-a-jwt"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Invalid or expired token");
}

#[actix_web::test]
async fn employees_cannot_list_staff() {
    let app = test_app!();

    let req = test::TestRequest::get()
        .uri("/api/employee")
        .insert_header(bearer(Role::Employee, Some(3)))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn employees_cannot_read_other_attendance() {
    let app = test_app!();

    let req = test::TestRequest::get()
        .uri("/api/attendance/daily?employee_id=9")
        .insert_header(bearer(Role::Employee, Some(3)))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn create_employee_reports_every_bad_field() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/api/employee")
        .insert_header(bearer(Role::Hr, None))
        .set_json(json!({
            "employee_code": "",
            "first_name": "John",
            "last_name": "",
            "email": "not-an-email",
            "hire_date": "2024-01-01"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Validation failed");
    assert!(body["errors"]["employee_code"].is_array());
    assert!(body["errors"]["last_name"].is_array());
    assert_eq!(body["errors"]["email"][0], "must be a valid email address");
    assert!(body["errors"].get("first_name").is_none());
}

#[actix_web::test]
async fn only_admins_grant_hr_accounts() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/api/employee")
        .insert_header(bearer(Role::Hr, None))
        .set_json(json!({
            "employee_code": "EMP-9",
            "first_name": "Jane",
            "last_name": "Roe",
            "email": "jane@company.com",
            "hire_date": "2024-01-01",
            "account_role": "hr"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn employee_update_rejects_unknown_columns() {
    let app = test_app!();

    let req = test::TestRequest::put()
        .uri("/api/employee/4")
        .insert_header(bearer(Role::Admin, None))
        .set_json(json!({ "email": "x@company.com", "salary": 10 }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"]["email"][0], "cannot be updated");
    assert_eq!(body["errors"]["salary"][0], "cannot be updated");
}

#[actix_web::test]
async fn leave_needs_an_employee_profile() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/api/leave")
        .insert_header(bearer(Role::Hr, None))
        .set_json(json!({
            "start_date": "2024-06-03",
            "end_date": "2024-06-04",
            "leave_type": "annual"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn leave_dates_must_be_ordered() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/api/leave")
        .insert_header(bearer(Role::Employee, Some(3)))
        .set_json(json!({
            "start_date": "2024-06-10",
            "end_date": "2024-06-04",
            "leave_type": "annual"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"]["end_date"][0], "must not be before start_date");
}

#[actix_web::test]
async fn employees_cannot_decide_leave() {
    let app = test_app!();

    let req = test::TestRequest::put()
        .uri("/api/leave/5/approve")
        .insert_header(bearer(Role::Employee, Some(3)))
        .set_json(json!({ "version": 0 }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn terminal_ingest_is_restricted_and_validated() {
    let app = test_app!();

    let batch = json!({ "events": [] });

    let req = test::TestRequest::post()
        .uri("/api/attendance/events")
        .insert_header(bearer(Role::Employee, Some(3)))
        .set_json(&batch)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri("/api/attendance/events")
        .insert_header(bearer(Role::System, None))
        .set_json(&batch)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"]["events"][0], "must not be empty");
}

#[actix_web::test]
async fn summary_rejects_malformed_period() {
    let app = test_app!();

    let req = test::TestRequest::get()
        .uri("/api/reports/summary?period=2024-13")
        .insert_header(bearer(Role::Employee, Some(3)))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["errors"]["period"][0],
        "invalid period '2024-13', expected YYYY or YYYY-MM"
    );
}

#[actix_web::test]
async fn staff_only_endpoints() {
    let app = test_app!();

    for (uri, role) in [
        ("/api/reports/payroll?year=2024", Role::Employee),
        ("/api/reports/payroll?year=2024", Role::Manager),
        ("/api/system-logs", Role::Hr),
        ("/api/jobs/1/applications", Role::Employee),
    ] {
        let req = test::TestRequest::get()
            .uri(uri)
            .insert_header(bearer(role, Some(3)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{} as {:?}", uri, role);
    }
}

#[actix_web::test]
async fn unknown_settings_list_is_not_found() {
    let app = test_app!();

    let req = test::TestRequest::get()
        .uri("/api/settings/salaries")
        .insert_header(bearer(Role::Hr, None))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Settings list not found");
}
