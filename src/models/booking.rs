use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::utils::error::AppError;

/// `local@domain.tld` shape; whitespace and extra `@` are rejected.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// Persisted Booking document (collection `bookings`). Holds a non-owning
/// reference to its Event; at most one booking per email per event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub event_id: ObjectId,
    pub email: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Builds a booking with a normalized email address. The referenced
    /// Event's existence is checked by the store on the write path.
    pub fn new(event_id: ObjectId, email: &str) -> Result<Self, AppError> {
        let email = normalize_email(email)?;
        let now = Utc::now();
        Ok(Booking {
            id: None,
            event_id,
            email,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Trims and lowercases the address, then checks the `local@domain.tld`
/// shape.
pub fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }
    if !EMAIL_RE.is_match(&email) {
        return Err(AppError::Validation(
            "Please provide a valid email address".to_string(),
        ));
    }
    Ok(email)
}
