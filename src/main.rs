use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatehouse::{config::Config, db, routes, state::AppState};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("❌ Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("❌ Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("🛑 Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let pool = db::create_pool(&config.database_url, config.db_max_connections)?;
    tracing::info!("✅ PostgreSQL Pool initialized with deadpool-postgres");

    if let Err(e) = db::ensure_schema(&pool).await {
        tracing::error!("❌ Failed to prepare database schema: {}", e);
        return Err(e.into());
    }

    let state = AppState::connect(&config, pool).await?;
    tracing::info!("✅ AppState initialized");

    let app = routes::router(state.clone());

    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    tracing::info!("🚀 Server listening on http://{}", config.addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("⏳ Waiting for pending session renewals...");
    state.auth.sessions().drain_renewals().await;
    tracing::info!("✅ Shutdown complete");

    Ok(())
}
