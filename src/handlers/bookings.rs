use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;

use crate::db::bookings::BookingStore;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::created;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub event_id: String,
    pub email: String,
}

/// POST /api/bookings — books a spot at an event. At most one booking per
/// email per event.
pub async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<Response, AppError> {
    let event_id = ObjectId::parse_str(&request.event_id)
        .map_err(|_| AppError::Validation("Event ID is not a valid id".to_string()))?;

    let db = state.cache.database().await?;
    let booking = BookingStore::new(&db)
        .create(event_id, &request.email)
        .await?;

    Ok(created(booking, "Booking created successfully").into_response())
}
