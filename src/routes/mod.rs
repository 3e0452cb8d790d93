use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::bookings::create_booking;
use crate::handlers::events::{
    create_event, get_event_by_slug, get_similar_events, list_events, update_event,
};
use crate::handlers::health_check;
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/events", get(list_events).post(create_event))
        .route(
            "/api/events/:slug",
            get(get_event_by_slug).put(update_event),
        )
        .route("/api/events/:slug/similar", get(get_similar_events))
        .route("/api/bookings", post(create_booking))
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
