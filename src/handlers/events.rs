use std::collections::HashMap;

use axum::extract::{Multipart, Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::db::events::EventStore;
use crate::models::event::{is_valid_slug, EventPayload, EventUpdate};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

/// GET /api/events — all events, newest first.
pub async fn list_events(State(state): State<AppState>) -> Result<Response, AppError> {
    let db = state.cache.database().await?;
    let events = EventStore::new(&db).list().await?;
    Ok(success(events, "Events fetched successfully").into_response())
}

/// GET /api/events/{slug} — single event. The slug is validated before the
/// store is touched.
pub async fn get_event_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    if !is_valid_slug(&slug) {
        return Err(AppError::Validation(
            "Slug must contain only lowercase letters, numbers, and hyphens".to_string(),
        ));
    }

    let db = state.cache.database().await?;
    let event = EventStore::new(&db)
        .find_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No event exists with slug: {slug}")))?;

    Ok(success(event, "Event fetched successfully").into_response())
}

/// GET /api/events/{slug}/similar — events sharing at least one tag.
pub async fn get_similar_events(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    if !is_valid_slug(&slug) {
        return Err(AppError::Validation(
            "Slug must contain only lowercase letters, numbers, and hyphens".to_string(),
        ));
    }

    let db = state.cache.database().await?;
    let events = EventStore::new(&db).find_similar(&slug).await?;
    Ok(success(events, "Similar events fetched successfully").into_response())
}

/// POST /api/events — multipart form: event attributes, an `image` file, and
/// JSON-encoded `tags` and `agenda`. The image is uploaded to the media host
/// first; the event stores the resulting URL.
pub async fn create_event(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut image: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid form data: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Invalid form data: {e}")))?;
            image = Some((filename, bytes.to_vec()));
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("Invalid form data: {e}")))?;
            fields.insert(name, value);
        }
    }

    let (filename, bytes) =
        image.ok_or_else(|| AppError::Validation("Image file is required".to_string()))?;

    let tags = parse_json_list(&fields, "tags")?;
    let agenda = parse_json_list(&fields, "agenda")?;

    let media = state.media.as_ref().ok_or_else(|| {
        AppError::ExternalService("Media uploads are not configured".to_string())
    })?;
    let image_url = media.upload_image(&filename, bytes).await?;

    let payload = EventPayload {
        title: take(&mut fields, "title"),
        description: take(&mut fields, "description"),
        overview: take(&mut fields, "overview"),
        image: image_url,
        venue: take(&mut fields, "venue"),
        location: take(&mut fields, "location"),
        date: take(&mut fields, "date"),
        time: take(&mut fields, "time"),
        mode: take(&mut fields, "mode"),
        audience: take(&mut fields, "audience"),
        agenda,
        organizer: take(&mut fields, "organizer"),
        tags,
    };

    let db = state.cache.database().await?;
    let event = EventStore::new(&db).create(payload).await?;
    Ok(created(event, "Event created successfully").into_response())
}

/// PUT /api/events/{slug} — partial update; slug, date, and time are
/// re-derived only for the fields present in the body.
pub async fn update_event(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(update): Json<EventUpdate>,
) -> Result<Response, AppError> {
    if !is_valid_slug(&slug) {
        return Err(AppError::Validation(
            "Slug must contain only lowercase letters, numbers, and hyphens".to_string(),
        ));
    }

    let db = state.cache.database().await?;
    let event = EventStore::new(&db).update(&slug, update).await?;
    Ok(success(event, "Event updated successfully").into_response())
}

fn take(fields: &mut HashMap<String, String>, name: &str) -> String {
    fields.remove(name).unwrap_or_default()
}

fn parse_json_list(fields: &HashMap<String, String>, name: &str) -> Result<Vec<String>, AppError> {
    let raw = fields
        .get(name)
        .ok_or_else(|| AppError::Validation(format!("Field '{name}' is required")))?;
    serde_json::from_str(raw)
        .map_err(|_| AppError::Validation(format!("Field '{name}' must be a JSON array of strings")))
}
