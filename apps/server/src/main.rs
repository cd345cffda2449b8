//! Test Run Tracker - Main entry point.
//!
//! Starts the Actix-web server with configured routes and middleware.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, http::header, web};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use test_run_tracker_lib::api;
use test_run_tracker_lib::config::Config;
use test_run_tracker_lib::db::DbPool;
use test_run_tracker_lib::middleware;
use test_run_tracker_lib::services::{
    LogMailer, RunEventBus, RunLifecycle, RunNotifier, RunStore, StatusCache, StatusCatalog,
    StatusStore,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        std::process::exit(1);
    }

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, TRT_DATABASE_URL and TRT_MAIL_FROM must be set");
            error!("  - In production, values must not match development defaults");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  Test Run Tracker");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
    }

    let pool = match DbPool::new(&config).await {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };
    info!("Database connection established");

    if let Err(e) = pool.run_migrations().await {
        error!("Failed to run migrations: {}", e);
        std::process::exit(1);
    }

    // Services
    let status_store: Arc<dyn StatusStore> = pool.clone();
    let run_store: Arc<dyn RunStore> = pool.clone();
    let catalog = Arc::new(StatusCatalog::new(
        status_store,
        StatusCache::new(config.status_cache_capacity),
    ));
    let lifecycle = Arc::new(RunLifecycle::new(run_store.clone(), catalog.clone()));
    let notifier = match RunNotifier::new(
        run_store.clone(),
        Arc::new(LogMailer),
        config.notification.clone(),
    ) {
        Ok(notifier) => Arc::new(notifier),
        Err(e) => {
            error!("Failed to load mail templates: {}", e);
            std::process::exit(1);
        }
    };

    let events = if config.listen_run_events {
        RunEventBus::standard(run_store, lifecycle.clone(), notifier)
    } else {
        warn!("Run event handlers disabled (TRT_LISTEN_RUN_EVENTS=false)");
        RunEventBus::new()
    };
    info!(handlers = events.len(), "Run event bus ready");

    let bind_address = config.bind_address();
    let is_development = config.is_development();

    let worker_count = if is_development {
        info!(
            "Starting server at http://{} (4 workers - development mode)",
            bind_address
        );
        4
    } else {
        let cpus = num_cpus::get();
        info!(
            "Starting server at http://{} ({} workers)",
            bind_address, cpus
        );
        cpus
    };

    let openapi = api::ApiDoc::openapi();

    // Start HTTP server
    let server = HttpServer::new(move || {
        let cors = if is_development {
            Cors::default()
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
                .max_age(3600)
        } else {
            // Same-origin only
            Cors::default()
                .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
                .max_age(3600)
        };

        App::new()
            // CORS must wrap before the logger
            .wrap(cors)
            .wrap(middleware::RequestLogger)
            .app_data(web::Data::from(pool.clone()))
            .app_data(web::Data::from(catalog.clone()))
            .app_data(web::Data::from(lifecycle.clone()))
            .app_data(web::Data::new(events.clone()))
            .service(
                web::scope("/api/v1")
                    .configure(api::configure_health_routes)
                    .configure(api::configure_run_routes)
                    .configure(api::configure_case_run_routes)
                    .configure(api::configure_status_routes),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone()),
            )
    });

    server
        .workers(worker_count)
        .bind(&bind_address)?
        .run()
        .await
}
