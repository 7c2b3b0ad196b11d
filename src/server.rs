//! HTTP server initialization.
//!
//! [`build_router`] assembles routes, the route guard and the tower-http
//! layers around an [`AppState`]; [`serve`] opens the database, creates the
//! auth provider and runs the router until ctrl-c.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::middleware;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::api::{self, AppState};
use crate::auth::guard::route_guard;
use crate::auth::provider::{self, AuthProvider};
use crate::config::MemoraConfig;
use crate::db;

/// The full application: API, pages, guard, tracing and panic recovery.
pub fn build_router(state: AppState) -> Router {
    api::routes()
        .layer(middleware::from_fn_with_state(state.clone(), route_guard))
        .layer(CatchPanicLayer::custom(api::error::panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Shared setup: open DB, create the auth provider.
fn setup_state(config: MemoraConfig) -> Result<AppState> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    let auth: Arc<dyn AuthProvider> = Arc::from(provider::create_provider(&config.auth)?);
    tracing::info!(provider = %config.auth.provider, url = %config.auth.url, "auth provider ready");

    Ok(AppState::new(conn, auth, config))
}

/// Start the HTTP server and block until shutdown.
pub async fn serve(config: MemoraConfig) -> Result<()> {
    let bind_addr = config.bind_addr();
    let state = setup_state(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "Memora listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
