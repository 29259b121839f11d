// src/main.rs

use std::{sync::Arc, time::Duration};

use panphy::{
    config::Config,
    routes,
    seed::{seed_sample_questions, seed_teacher},
    state::{AppState, build_blob_store, build_examiner},
    store::{Database, MemoryStore, PgStore},
};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DB_CONNECT_RETRIES: u32 = 5;

async fn connect_with_retry(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let mut retry_count = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(e) => {
                retry_count += 1;
                if retry_count > DB_CONNECT_RETRIES {
                    return Err(e);
                }
                tracing::warn!(
                    "Database not ready, retrying in 2s... (Attempt {})",
                    retry_count
                );
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (.env included)
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let db: Arc<dyn Database> = match &config.database_url {
        Some(url) => {
            let pool = connect_with_retry(url).await.map_err(|e| {
                tracing::error!("Failed to connect to database after {} retries: {}", DB_CONNECT_RETRIES, e);
                e
            })?;
            tracing::info!("Database connected...");

            tracing::info!("Running migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Migrations applied successfully.");

            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store (data is lost on restart)");
            Arc::new(MemoryStore::new())
        }
    };

    let blobs = build_blob_store(&config.storage)?;
    let examiner = build_examiner(&config.ai)?;

    if let Err(e) = seed_teacher(db.as_ref(), &config).await {
        tracing::error!("Failed to seed teacher user: {:?}", e);
    }
    if config.seed_sample_questions {
        if let Err(e) = seed_sample_questions(db.as_ref()).await {
            tracing::error!("Failed to seed sample questions: {:?}", e);
        }
    }

    let addr = config.bind_addr;
    let state = AppState::new(db, blobs, examiner, config);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
