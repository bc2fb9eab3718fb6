use blog_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    password::{Argon2Hasher, HasherState},
    repository::{PostgresRepository, RepositoryState},
    seed,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Start-up order: configuration, logging, database and migrations, the seed, then
/// the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise verbose defaults for this crate.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "blog_portal=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for log aggregation.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    let postgres = PostgresRepository::new(pool);
    postgres
        .migrate()
        .await
        .expect("FATAL: Database migrations failed.");

    let repo = Arc::new(postgres) as RepositoryState;
    let hasher = Arc::new(Argon2Hasher::new()) as HasherState;

    // 4. Seed: idempotent, safe on every start.
    let report = seed::run(repo.as_ref(), hasher.as_ref(), &config)
        .await
        .expect("FATAL: Seeding the bootstrap administrator failed.");
    tracing::debug!(?report, "seed finished");

    // 5. Router and server
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState {
        repo,
        hasher,
        config,
    });

    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: Cannot bind {}: {}", bind_addr, e));

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {}", e);
    }
}
