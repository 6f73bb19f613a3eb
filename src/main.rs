use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use std::sync::Arc;

mod api;
mod auth;
mod clock;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod reporting;
mod routes;
mod services;
mod utils;

use clock::{Clock, SystemClock};
use config::{Config, NotifierKind};
use db::init_db;
use services::feed::ChangeFeed;
use services::notifier::{LogNotifier, Notifier, OutboxNotifier};

use crate::docs::ApiDoc;
use crate::utils::login_index;
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "HRM service is running"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await?;
    if config.run_migrations {
        db::migrate(&pool).await?;
    }

    let pool_for_warmup = pool.clone();
    actix_web::rt::spawn(async move {
        // last 30 days of logins first, in batches of 250
        if let Err(e) = login_index::warmup(&pool_for_warmup, 30, 250).await {
            error!(error = %e, "Failed to warm up login index");
        }
    });

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notifier: Arc<dyn Notifier> = match config.notifier {
        NotifierKind::Log => Arc::new(LogNotifier {
            base_url: config.app_base_url.clone(),
        }),
        NotifierKind::Outbox => Arc::new(OutboxNotifier {
            pool: pool.clone(),
            base_url: config.app_base_url.clone(),
        }),
    };
    let feed = Data::new(ChangeFeed::new(config.feed_capacity));

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::from(clock.clone()))
            .app_data(Data::from(notifier.clone()))
            .app_data(feed.clone())
            .service(index)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(&server_addr)?
    .run()
    .await?;

    info!("Server stopped");
    Ok(())
}
