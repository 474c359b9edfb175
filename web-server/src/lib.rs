//! HTTP API for tracking subreddits and analyzing their recent posts.
//!
//! Every route except `/health` needs the identity header set by the
//! fronting proxy (see [`auth::AuthUser`]).

use std::{future::Future, time::Duration};

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{delete, get},
    Router,
};
use background_service::BackgroundService;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tokio::{net::TcpListener, signal::ctrl_c};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use routes::{
    create_subreddit_handler, delete_subreddit_handler, health_handler, list_subreddits_handler,
    posts_handler, themes_handler, update_stats_handler,
};

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, state.user_header.clone()])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/subreddits",
            get(list_subreddits_handler).post(create_subreddit_handler),
        )
        .route("/subreddits/:name", delete(delete_subreddit_handler))
        .route("/subreddit/:slug/posts", get(posts_handler))
        .route("/subreddit/:slug/themes", get(themes_handler))
        .route("/cron/update-stats", get(update_stats_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = listener.local_addr()?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutting down...");
    Ok(())
}

/// Like [`serve`], then stops `background` whether or not the server failed.
pub async fn serve_with_background<F>(
    listener: TcpListener,
    app: Router,
    shutdown: F,
    background: Option<BackgroundService>,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let served = serve(listener, app, shutdown).await;
    if let Some(background) = background {
        background.stop().await;
    }
    served
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install signal handler: {}", e);
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
