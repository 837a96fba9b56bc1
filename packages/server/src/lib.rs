#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the pollution map dashboards.
//!
//! Serves the read-side REST API used by the student and regulatory
//! dashboards: report listings by lifecycle status, report detail,
//! comment threads, and the category taxonomy. Report data lives in a
//! `SQLite` database at `data/pollution.db`.

mod handlers;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, middleware, web};
use pollution_map_database::{DEFAULT_DB_PATH, open_db};
use std::path::Path;
use std::sync::Arc;
use switchy_database::Database;

/// Shared application state.
pub struct AppState {
    /// Report store connection.
    pub db: Arc<dyn Database>,
}

/// Starts the pollution map API server.
///
/// Opens the report store (creating the schema if needed) and starts the
/// Actix-Web HTTP server. This is a regular async function — the caller
/// is responsible for providing the async runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
///
/// # Panics
///
/// Panics if the report store database cannot be opened.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let db_path = std::env::var("DATABASE_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
    log::info!("Opening report database at {db_path}...");
    let db = open_db(Path::new(&db_path))
        .await
        .expect("Failed to open report database");

    let state = web::Data::new(AppState { db: Arc::from(db) });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(handlers::health))
                    .route("/categories", web::get().to(handlers::categories))
                    .route("/reports", web::get().to(handlers::reports))
                    .route("/reports/{id}", web::get().to(handlers::report_detail))
                    .route(
                        "/reports/{id}/comments",
                        web::get().to(handlers::report_comments),
                    )
                    .route(
                        "/reports/{id}/comments/count",
                        web::get().to(handlers::report_comment_count),
                    ),
            )
            // Serve frontend static files (production)
            .service(Files::new("/", "app/dist").index_file("index.html"))
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
