mod app;
mod config;
mod db_migrations;
mod db_sqlx;
mod error;
mod pager;
mod ranking;
mod routes;
mod services;
mod state;
mod store;

extern crate self as sqlx;
pub use crate::db_sqlx::{
    Error, QueryBuilder, Sqlite, SqlitePool, query, query_as, query_scalar, sqlite,
};

use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;
use crate::store::{RankStore, SqliteRankStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let store = open_rank_store().await;
    let state = AppState::new(store);

    // Spawn background services
    tokio::spawn(services::portfolio_poller::run(state.clone()));
    tokio::spawn(services::pick_cache_evictor::run(state.clone()));
    tokio::spawn(services::snapshot_retention::run(state.clone()));

    let app = app::build_app(state);

    let addr = format!("0.0.0.0:{}", config::SERVER_PORT);
    tracing::info!("Ringside leaderboard server listening on {addr}");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind TCP listener");
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server failed");
    }

    tracing::info!("Server shut down gracefully");
}

/// Open the rank snapshot database. Failure is not fatal: the server starts
/// without history and every rank delta reads `same` until a restart.
async fn open_rank_store() -> Option<Arc<dyn RankStore>> {
    let db_path = config::db_path();
    let db_max_connections = config::db_max_connections();
    tracing::info!(db_path = %db_path, db_max_connections, "Opening rank snapshot database...");

    let options = SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true);
    let pool = match SqlitePoolOptions::new()
        .max_connections(db_max_connections)
        .connect_with(options)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                db_path = %db_path,
                "failed to open rank snapshot database; rank deltas will degrade to `same`"
            );
            return None;
        }
    };
    if let Err(e) = db_migrations::run(&pool).await {
        tracing::warn!(error = %e, "failed to run migrations; rank deltas will degrade to `same`");
        return None;
    }
    tracing::info!("Rank snapshot database ready");
    Some(Arc::new(SqliteRankStore::new(pool)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
