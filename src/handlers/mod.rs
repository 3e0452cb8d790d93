use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::db::ConnectionStatus;
use crate::state::AppState;
use crate::utils::response::success;

pub mod bookings;
pub mod events;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
    database: &'static str,
}

pub async fn health_check(State(state): State<AppState>) -> Response {
    let database = match state.cache.status() {
        ConnectionStatus::Connected => "connected",
        ConnectionStatus::Connecting => "connecting",
        ConnectionStatus::Disconnecting => "disconnecting",
        ConnectionStatus::Disconnected => "disconnected",
    };

    let payload = HealthPayload {
        status: "ok",
        service: "devevent-api",
        database,
    };

    success(payload, "Health check successful").into_response()
}
