use crate::{
    api::{attendance, employee, job, leave_request, payroll, report, settings, system_log},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

/// Per-route limiter allowing `requests_per_min` per client IP.
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let per_ms = (60_000 / requests_per_min.max(1) as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_else(|| {
            tracing::warn!(requests_per_min, "Invalid rate limit; using governor defaults");
            GovernorConfig::default()
        });
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = build_limiter(config.rate_protected_per_min);

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .configure(protected_routes),
    );
}

/// Everything behind the access token. Mounted under `API_PREFIX`.
pub fn protected_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/employee")
            // /employee
            .service(
                web::resource("")
                    .route(web::post().to(employee::create_employee))
                    .route(web::get().to(employee::list_employees)),
            )
            // /employee/me
            .service(web::resource("/me").route(web::get().to(employee::get_me)))
            // /employee/{id}
            .service(
                web::resource("/{id}")
                    .route(web::put().to(employee::update_employee))
                    .route(web::get().to(employee::get_employee))
                    .route(web::delete().to(employee::delete_employee)),
            )
            // /employee/{id}/deactivate
            .service(
                web::resource("/{id}/deactivate")
                    .route(web::put().to(employee::deactivate_employee)),
            ),
    )
    .service(
        web::scope("/leave")
            // /leave
            .service(
                web::resource("")
                    .route(web::get().to(leave_request::leave_list))
                    .route(web::post().to(leave_request::create_leave)),
            )
            // /leave/live
            .service(web::resource("/live").route(web::get().to(leave_request::live_leave)))
            // /leave/{id}
            .service(
                web::resource("/{id}")
                    .route(web::get().to(leave_request::get_leave))
                    .route(web::put().to(leave_request::edit_leave))
                    .route(web::delete().to(leave_request::delete_leave)),
            )
            // /leave/{id}/approve
            .service(
                web::resource("/{id}/approve").route(web::put().to(leave_request::approve_leave)),
            )
            // /leave/{id}/reject
            .service(
                web::resource("/{id}/reject").route(web::put().to(leave_request::reject_leave)),
            ),
    )
    .service(
        web::scope("/attendance")
            // /attendance
            .service(
                web::resource("")
                    .route(web::put().to(attendance::check_out))
                    .route(web::post().to(attendance::check_in)),
            )
            .service(web::resource("/events").route(web::post().to(attendance::ingest_events)))
            .service(web::resource("/daily").route(web::get().to(attendance::daily_attendance))),
    )
    .service(
        web::scope("/payroll")
            // /payroll
            .service(
                web::resource("")
                    .route(web::post().to(payroll::create_payroll))
                    .route(web::get().to(payroll::list_payrolls)),
            )
            // /payroll/{id}
            .service(
                web::resource("/{id}")
                    .route(web::get().to(payroll::get_payroll))
                    .route(web::put().to(payroll::update_payroll)),
            ),
    )
    .service(
        web::scope("/reports")
            .service(web::resource("/summary").route(web::get().to(report::period_summary)))
            .service(web::resource("/payroll").route(web::get().to(report::payroll_report))),
    )
    .service(
        web::scope("/jobs")
            .service(
                web::resource("")
                    .route(web::post().to(job::create_job))
                    .route(web::get().to(job::list_jobs)),
            )
            .service(
                web::resource("/{id}")
                    .route(web::get().to(job::get_job))
                    .route(web::put().to(job::update_job))
                    .route(web::delete().to(job::delete_job)),
            )
            .service(
                web::resource("/{id}/applications")
                    .route(web::post().to(job::apply_to_job))
                    .route(web::get().to(job::list_applications)),
            ),
    )
    .service(
        web::resource("/applications/{id}/status")
            .route(web::put().to(job::set_application_status)),
    )
    .service(
        web::scope("/settings")
            .service(
                web::resource("/{list}")
                    .route(web::get().to(settings::list_items))
                    .route(web::post().to(settings::add_item)),
            )
            .service(
                web::resource("/{list}/{id}").route(web::delete().to(settings::delete_item)),
            ),
    )
    .service(web::resource("/system-logs").route(web::get().to(system_log::list_system_logs)));
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access_token + refresh_token (old one revoked)
