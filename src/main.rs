// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Tradeport

use std::{env, net::SocketAddr, sync::Arc};

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use tradeport_server::{
    api::router,
    config,
    ledger::LedgerDatabase,
    mailer::Mailer,
    state::{AppState, AuthConfig},
};

#[tokio::main]
async fn main() {
    init_tracing();

    // Open the embedded ledger database
    let data_dir = env::var(config::DATA_DIR_ENV)
        .unwrap_or_else(|_| config::DEFAULT_DATA_DIR.to_string());
    let db_path = std::path::Path::new(&data_dir).join("ledger.redb");
    let db = match LedgerDatabase::open(&db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::error!(path = %db_path.display(), error = %e, "Failed to open ledger database");
            std::process::exit(1);
        }
    };

    // Notifications and auth
    let mailer = Mailer::from_env();
    let auth_config = AuthConfig {
        secret: env::var(config::JWT_SECRET_ENV).ok().filter(|s| !s.is_empty()),
        issuer: env::var(config::JWT_ISSUER_ENV).ok().filter(|s| !s.is_empty()),
    };
    if auth_config.secret.is_none() {
        tracing::warn!(
            "PORTAL_JWT_SECRET not set; running in development auth mode (no signature checks)"
        );
    }

    let refund_on_revert = config::refund_on_revert_from_env();
    let state = AppState::new(db, mailer, auth_config, refund_on_revert);
    let app = router(state);

    // Parse bind address
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("Failed to parse bind address");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");

    tracing::info!(
        %addr,
        refund_on_revert,
        "Tradeport back-office listening (docs at /docs)"
    );

    // Graceful shutdown on SIGINT/SIGTERM
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .expect("HTTP server failed");
}

/// Resolve on the first Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize tracing per `RUST_LOG` and `LOG_FORMAT`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    if env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
