//! Documentation of the fitness coaching admin backend.
//!
//! The coaching front end is server rendered elsewhere. This service only
//! owns the privileged account routes that need admin access to the managed
//! identity and document services.
//!
//!
//!
//! # General Infrastructure
//! - Front end calls these routes from its own server side, never from the browser directly
//! - Identity store holds the login record and its enabled/disabled flag
//! - Document store holds the `users/{id}` document with the application level status
//! - Both are reached over HTTPS with one admin bearer token, built once at startup
//!
//!
//!
//! # Routes
//!
//! | Route | Method | Body |
//! |---|---|---|
//! | `/api/admin/soft-delete-user` | POST | `{ "userId": "..." }` |
//! | `/api/admin/reactivate-user` | POST | `{ "userId": "..." }` |
//! | `/api/admin/delete-user` | POST | `{ "userId": "..." }` |
//! | `/api/admin/diagnostics` | GET | none |
//!
//! Account routes answer `{ "message" }` on success and `{ "error" }` otherwise.
//! Diagnostics answers `{ "success", "message", "timestamp", "hasConnection" }`
//! or `{ "error", "details" }`.
//!
//!
//!
//! # Consistency
//!
//! Every account route writes to two services one after the other. There is no
//! transaction spanning them, so a failure in the second write leaves the first
//! in place. Such failures are logged with the user id and operation. Requests
//! for the same user are not serialized either; a soft delete racing a
//! reactivate ends in whichever order the services saw the writes.
//!
//!
//!
//! # Setup
//!
//! Environment
//! - `RUST_PORT` (default `8080`)
//! - `ADMIN_PROJECT_ID`
//! - `IDENTITY_URL`, `DOCUMENTS_URL` (default to the public Google endpoints)
//! - `USERS_COLLECTION` (default `users`)
//! - `REQUEST_TIMEOUT_MS` (default `5000`)
//! - `SECRETS_DIR` (default `/run/secrets`)
//!
//! Secrets
//! - `ADMIN_ACCESS_TOKEN`
//!
//! Without a project id or token the server still starts, but every admin
//! route answers 500 until it is configured.
//!
//! Run locally.
//! ```sh
//! RUST_LOG=info ADMIN_PROJECT_ID=coach-dev SECRETS_DIR=./secrets cargo run -p fitcoach-backend
//! ```
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod accounts;
pub mod config;
pub mod documents;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod fake;
pub mod identity;
pub mod routes;
pub mod state;
pub mod utils;

use routes::{
    diagnostic_handler, diagnostic_method_not_allowed, method_not_allowed,
    permanently_delete_handler, reactivate_handler, soft_delete_handler,
};
use state::State;

pub fn app(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route(
            "/api/admin/soft-delete-user",
            post(soft_delete_handler).fallback(method_not_allowed),
        )
        .route(
            "/api/admin/reactivate-user",
            post(reactivate_handler).fallback(method_not_allowed),
        )
        .route(
            "/api/admin/delete-user",
            post(permanently_delete_handler).fallback(method_not_allowed),
        )
        .route(
            "/api/admin/diagnostics",
            get(diagnostic_handler).fallback(diagnostic_method_not_allowed),
        )
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = State::new()?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
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
}
