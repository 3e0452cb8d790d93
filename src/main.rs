use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use devevent_server::config::Config;
use devevent_server::db::{ensure_indexes, ConnectionCache};
use devevent_server::media::MediaClient;
use devevent_server::routes::create_routes;
use devevent_server::state::AppState;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();

    let cache = Arc::new(ConnectionCache::new(
        config.mongodb_uri.clone(),
        config.db_name.clone(),
    ));

    // Warm the cache and create indexes up front; a failure here is not
    // fatal, the first request retries through the cache.
    match cache.database().await {
        Ok(db) => {
            if let Err(e) = ensure_indexes(&db).await {
                tracing::warn!(error = %e, "Failed to create indexes at startup");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Database not reachable at startup, will retry lazily");
        }
    }

    let media = match (
        &config.cloudinary_cloud_name,
        &config.cloudinary_upload_preset,
    ) {
        (Some(cloud), Some(preset)) => Some(MediaClient::new(cloud, preset)),
        _ => {
            tracing::warn!("Cloudinary not configured, image uploads disabled");
            None
        }
    };

    let app: Router = create_routes(AppState::new(cache, media));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
