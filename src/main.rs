//! Server entry point.

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use storefront::config::Config;
use storefront::routes::chat;
use storefront::{bootstrap, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let db = PgPoolOptions::new()
        .max_connections(config.max_db_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    bootstrap::ensure_admin(&db, &config).await?;

    let state = AppState::new(db, config.order_retention_days);
    spawn_sweep(state.clone(), config.sweep_interval_hours);

    let addr = config.addr();
    let app = storefront::app(state);
    tracing::info!(%addr, "storefront listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server shut down gracefully");
    Ok(())
}

/// Daily background task: stale cancelled orders and expired messages.
/// The first tick fires immediately, doubling as a startup catch-up run.
fn spawn_sweep(state: AppState, interval_hours: u64) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(interval_hours * 3600));
        loop {
            interval.tick().await;
            if let Err(e) = state.engine.run_retention_sweep().await {
                tracing::error!(error = %e, "order retention sweep failed");
            }
            match chat::delete_expired(&state.db).await {
                Ok(deleted) if deleted > 0 => {
                    tracing::info!(deleted, "purged expired messages");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "message cleanup failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
