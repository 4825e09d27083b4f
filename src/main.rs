use std::sync::Arc;

use library_lending::{
    adapters::postgres::{
        PostgresBookRepository, PostgresLendingStore, PostgresLoanRepository,
        PostgresPatronRepository,
    },
    api::{handlers::AppState, router::create_router},
    application::{directory::Directory, lending::LendingService},
    config::AppConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "library_lending=debug,tower_http=debug,axum=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    tracing::info!("Database URL: {}", config.database_url);

    // Initialize database connection pool
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // Initialize adapters and services
    let lending = LendingService::new(Arc::new(PostgresLendingStore::new(
        pool.clone(),
        config.lock_timeout,
    )));
    let books = Directory::with_cache(Arc::new(PostgresBookRepository::new(pool.clone())));
    let patrons = Directory::with_cache(Arc::new(PostgresPatronRepository::new(pool.clone())));
    let loans = Directory::new(Arc::new(PostgresLoanRepository::new(pool.clone())));

    // Create application state
    let app_state = Arc::new(AppState {
        lending,
        books,
        patrons,
        loans,
    });

    // Create router
    let app = create_router(app_state);

    // Server configuration
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", addr);

    // Start server
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
