// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use crate::configuration::BootstrapOptions;
use crate::datastore::DocumentStore;
use crate::routes;
use crate::secrets::SecretStore;
use axum::Router;
use axum::routing::get;
use axum::serve::Serve;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared, read-only inputs of every handler.
///
/// The stores are stateless; each call builds its own clients and connections.
#[derive(Clone)]
pub struct AppState {
    pub options: BootstrapOptions,
    pub secrets: Arc<dyn SecretStore>,
    pub documents: Arc<dyn DocumentStore>,
}

pub struct Application {
    port: u16,
    server: Serve<TcpListener, Router, Router>,
}

impl Application {
    pub async fn build(
        options: BootstrapOptions,
        secrets: Arc<dyn SecretStore>,
        documents: Arc<dyn DocumentStore>,
    ) -> Result<Self, std::io::Error> {
        let address = format!("{}:{}", options.host, options.port);
        let listener = TcpListener::bind(address).await?;
        let host = options.host.clone();
        let server = run(listener, options, secrets, documents)?;
        let port = server.local_addr()?.port();

        tracing::info!("[bootstrap] listening at http://{}:{}", host, port);

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.with_graceful_shutdown(shutdown_signal()).await
    }
}

pub fn create_router(
    options: BootstrapOptions,
    secrets: Arc<dyn SecretStore>,
    documents: Arc<dyn DocumentStore>,
) -> Router {
    let state = Arc::new(AppState {
        options,
        secrets,
        documents,
    });

    Router::new()
        .route("/", get(routes::bootstrap))
        .route("/redis", get(routes::cache))
        .route("/healthz", get(routes::healthz))
        .with_state(state)
}

#[tracing::instrument(skip(listener, secrets, documents))]
pub fn run(
    listener: TcpListener,
    options: BootstrapOptions,
    secrets: Arc<dyn SecretStore>,
    documents: Arc<dyn DocumentStore>,
) -> Result<Serve<TcpListener, Router, Router>, std::io::Error> {
    let app = create_router(options, secrets, documents);
    Ok(axum::serve(listener, app))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("[bootstrap] failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("[bootstrap] failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("[bootstrap] shutting down");
}
