pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod schema;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Frontend origins allowed to call the API cross-origin.
pub const ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://localhost:5174",
    "http://localhost:5175",
    "http://localhost:5177",
    "https://krishi-db-apon212.netlify.app",
];

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::crops::list_crops,
        handlers::crops::latest_crops,
        handlers::crops::get_crop,
        handlers::crops::create_crop,
        handlers::crops::update_crop,
        handlers::crops::delete_crop,
        handlers::interests::submit_interest,
        handlers::interests::decide_interest,
        handlers::interests::my_interests,
    ),
    tags(
        (name = "crops", description = "Crop listing management"),
        (name = "interests", description = "Purchase interests against listings"),
    )
)]
pub struct ApiDoc;

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) {
    let mut conn = pool.get().expect("Failed to get DB connection for migrations");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run database migrations");
}

fn cors() -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allowed_header(actix_web::http::header::CONTENT_TYPE);
    for origin in ALLOWED_ORIGINS {
        cors = cors.allowed_origin(origin);
    }
    cors
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    pool: DbPool,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .wrap(Logger::default())
            .wrap(cors())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
            .route("/crops", web::get().to(handlers::crops::list_crops))
            .route("/crops", web::post().to(handlers::crops::create_crop))
            .route("/latest-crops", web::get().to(handlers::crops::latest_crops))
            .route("/my-interests", web::get().to(handlers::interests::my_interests))
            .route("/crops/{id}", web::get().to(handlers::crops::get_crop))
            .route("/crops/{id}", web::put().to(handlers::crops::update_crop))
            .route("/crops/{id}", web::delete().to(handlers::crops::delete_crop))
            .route(
                "/crops/{id}/interest",
                web::post().to(handlers::interests::submit_interest),
            )
            .route(
                "/crops/{id}/interest",
                web::put().to(handlers::interests::decide_interest),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
