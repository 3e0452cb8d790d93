use std::fmt;
use std::str::FromStr;

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use mongodb::bson::oid::ObjectId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::utils::error::AppError;

/// Canonical date pattern (ISO `YYYY-MM-DD`), checked after normalization.
static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// Canonical 24-hour time pattern, checked after normalization.
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").unwrap());

/// 12-hour input shape: `H[:MM] AM/PM`, case-insensitive.
static TIME_12H_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):?(\d{2})?\s*([AaPp][Mm])$").unwrap());

/// 24-hour input shape: `H:MM` or `HH:MM`.
static TIME_24H_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").unwrap());

/// URL path slugs: lowercase alphanumeric runs separated by single hyphens.
static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap());

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 2000;
const MAX_OVERVIEW_LEN: usize = 500;
const MAX_SLUG_LEN: usize = 200;

/// Delivery mode of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventMode {
    Online,
    Offline,
    Hybrid,
}

impl FromStr for EventMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "online" => Ok(EventMode::Online),
            "offline" => Ok(EventMode::Offline),
            "hybrid" => Ok(EventMode::Hybrid),
            _ => Err(()),
        }
    }
}

impl fmt::Display for EventMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventMode::Online => "online",
            EventMode::Offline => "offline",
            EventMode::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

/// Persisted Event document (collection `events`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub overview: String,
    pub image: String,
    pub venue: String,
    pub location: String,
    pub date: String,
    pub time: String,
    pub mode: EventMode,
    pub audience: String,
    pub agenda: Vec<String>,
    pub organizer: String,
    pub tags: Vec<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Raw event attributes as submitted, before normalization and derivation.
#[derive(Debug, Clone, Default)]
pub struct EventPayload {
    pub title: String,
    pub description: String,
    pub overview: String,
    pub image: String,
    pub venue: String,
    pub location: String,
    pub date: String,
    pub time: String,
    pub mode: String,
    pub audience: String,
    pub agenda: Vec<String>,
    pub organizer: String,
    pub tags: Vec<String>,
}

/// Partial update; fields left as `None` keep their stored value and do not
/// trigger re-derivation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub overview: Option<String>,
    pub image: Option<String>,
    pub venue: Option<String>,
    pub location: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub mode: Option<String>,
    pub audience: Option<String>,
    pub agenda: Option<Vec<String>>,
    pub organizer: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Collapses field-level errors into a single `Validation` error, or `Ok`
/// when the list is empty.
pub fn into_validation_result(errors: Vec<FieldError>) -> Result<(), AppError> {
    if errors.is_empty() {
        return Ok(());
    }
    let message = errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    Err(AppError::Validation(message))
}

/// Validates the raw payload in field-declaration order. Pure: returns every
/// violation rather than stopping at the first.
pub fn validate_event(payload: &EventPayload) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let title = payload.title.trim();
    if title.is_empty() {
        errors.push(FieldError::new("title", "Event title is required"));
    } else if title.chars().count() > MAX_TITLE_LEN {
        errors.push(FieldError::new(
            "title",
            "Title cannot exceed 200 characters",
        ));
    }

    let description = payload.description.trim();
    if description.is_empty() {
        errors.push(FieldError::new(
            "description",
            "Event description is required",
        ));
    } else if description.chars().count() > MAX_DESCRIPTION_LEN {
        errors.push(FieldError::new(
            "description",
            "Description cannot exceed 2000 characters",
        ));
    }

    let overview = payload.overview.trim();
    if overview.is_empty() {
        errors.push(FieldError::new("overview", "Event overview is required"));
    } else if overview.chars().count() > MAX_OVERVIEW_LEN {
        errors.push(FieldError::new(
            "overview",
            "Overview cannot exceed 500 characters",
        ));
    }

    if payload.image.trim().is_empty() {
        errors.push(FieldError::new("image", "Event image is required"));
    }
    if payload.venue.trim().is_empty() {
        errors.push(FieldError::new("venue", "Event venue is required"));
    }
    if payload.location.trim().is_empty() {
        errors.push(FieldError::new("location", "Event location is required"));
    }

    if payload.date.trim().is_empty() {
        errors.push(FieldError::new("date", "Event date is required"));
    }
    if payload.time.trim().is_empty() {
        errors.push(FieldError::new("time", "Event time is required"));
    }

    if payload.mode.trim().is_empty() {
        errors.push(FieldError::new("mode", "Event mode is required"));
    } else if EventMode::from_str(&payload.mode).is_err() {
        errors.push(FieldError::new(
            "mode",
            "Mode must be online, offline, or hybrid",
        ));
    }

    if payload.audience.trim().is_empty() {
        errors.push(FieldError::new("audience", "Event audience is required"));
    }

    if payload.agenda.iter().all(|item| item.trim().is_empty()) {
        errors.push(FieldError::new(
            "agenda",
            "Agenda must contain at least one item",
        ));
    }

    if payload.organizer.trim().is_empty() {
        errors.push(FieldError::new(
            "organizer",
            "Event organizer is required",
        ));
    }

    if payload.tags.iter().all(|tag| tag.trim().is_empty()) {
        errors.push(FieldError::new("tags", "At least one tag is required"));
    }

    errors
}

/// Derives a URL-safe slug from a title: lowercase, strip everything outside
/// ASCII word characters / spaces / hyphens, collapse separator runs into
/// single hyphens, trim hyphens at the ends. The output always satisfies
/// [`is_valid_slug`] unless it is empty.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut pending_separator = false;

    for c in lowered.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_separator = true;
        }
        // Anything else is stripped without acting as a separator.
    }

    slug
}

/// True when `slug` is safe to use in a URL path lookup.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slug.len() <= MAX_SLUG_LEN && SLUG_RE.is_match(slug)
}

/// Normalizes a raw date string to ISO `YYYY-MM-DD`. Accepts ISO dates,
/// RFC 3339 datetimes (date component taken), `MM/DD/YYYY`, and
/// `Month D, YYYY`.
pub fn normalize_date(raw: &str) -> Result<String, AppError> {
    let input = raw.trim();

    let parsed = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(input).map(|dt| dt.naive_utc().date()))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date())
        })
        .or_else(|_| NaiveDate::parse_from_str(input, "%m/%d/%Y"))
        .or_else(|_| NaiveDate::parse_from_str(input, "%B %d, %Y"))
        .or_else(|_| NaiveDate::parse_from_str(input, "%b %d, %Y"));

    match parsed {
        Ok(date) => Ok(date.format("%Y-%m-%d").to_string()),
        Err(_) => Err(AppError::Validation("Invalid date format".to_string())),
    }
}

/// Normalizes a raw time string to zero-padded 24-hour `HH:MM`. Accepts
/// `H:MM`/`HH:MM` and 12-hour `H[:MM] AM/PM` (case-insensitive); 12-hour
/// hours must fall in 1..=12.
pub fn normalize_time(raw: &str) -> Result<String, AppError> {
    let input = raw.trim();

    if let Some(caps) = TIME_12H_RE.captures(input) {
        let mut hours: u32 = caps[1]
            .parse()
            .map_err(|_| AppError::Validation("Invalid time format".to_string()))?;
        let minutes: u32 = caps
            .get(2)
            .map(|m| m.as_str().parse())
            .transpose()
            .map_err(|_| AppError::Validation("Invalid time format".to_string()))?
            .unwrap_or(0);

        if !(1..=12).contains(&hours) || minutes > 59 {
            return Err(AppError::Validation("Invalid time format".to_string()));
        }

        let period = caps[3].to_uppercase();
        if period == "PM" && hours != 12 {
            hours += 12;
        }
        if period == "AM" && hours == 12 {
            hours = 0;
        }

        return Ok(format!("{hours:02}:{minutes:02}"));
    }

    if let Some(caps) = TIME_24H_RE.captures(input) {
        let hours: u32 = caps[1]
            .parse()
            .map_err(|_| AppError::Validation("Invalid time format".to_string()))?;
        let minutes: u32 = caps[2]
            .parse()
            .map_err(|_| AppError::Validation("Invalid time format".to_string()))?;

        if hours > 23 || minutes > 59 {
            return Err(AppError::Validation("Invalid time format".to_string()));
        }

        return Ok(format!("{hours:02}:{minutes:02}"));
    }

    Err(AppError::Validation("Invalid time format".to_string()))
}

impl Event {
    /// Create-path pipeline: validate the raw payload, derive slug and
    /// canonical date/time, stamp timestamps. Nothing is persisted here; the
    /// store inserts the returned document, so a failure leaves no partial
    /// write behind.
    pub fn from_payload(payload: EventPayload) -> Result<Self, AppError> {
        into_validation_result(validate_event(&payload))?;

        let date = normalize_date(&payload.date)?;
        let time = normalize_time(&payload.time)?;
        // Membership already validated; from_str only lowercases here.
        let mode = EventMode::from_str(&payload.mode)
            .map_err(|_| AppError::Validation("Mode must be online, offline, or hybrid".into()))?;

        let title = payload.title.trim().to_string();
        let slug = slugify(&title);
        if slug.is_empty() {
            return Err(AppError::Validation(
                "Title must contain at least one alphanumeric character".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Event {
            id: None,
            slug,
            title,
            description: payload.description.trim().to_string(),
            overview: payload.overview.trim().to_string(),
            image: payload.image.trim().to_string(),
            venue: payload.venue.trim().to_string(),
            location: payload.location.trim().to_string(),
            date,
            time,
            mode,
            audience: payload.audience.trim().to_string(),
            agenda: trim_entries(payload.agenda),
            organizer: payload.organizer.trim().to_string(),
            tags: trim_entries(payload.tags),
            created_at: now,
            updated_at: now,
        })
    }

    /// Update-path pipeline with an explicit changed-fields set: only the
    /// fields present in `update` are replaced, and slug/date/time are
    /// re-derived only when their triggering field changed.
    pub fn apply_update(&mut self, update: EventUpdate) -> Result<(), AppError> {
        if let Some(title) = update.title {
            let title = title.trim().to_string();
            let slug = slugify(&title);
            if title.is_empty() || slug.is_empty() {
                return Err(AppError::Validation("Event title is required".to_string()));
            }
            if title.chars().count() > MAX_TITLE_LEN {
                return Err(AppError::Validation(
                    "Title cannot exceed 200 characters".to_string(),
                ));
            }
            self.title = title;
            self.slug = slug;
        }
        if let Some(date) = update.date {
            self.date = normalize_date(&date)?;
        }
        if let Some(time) = update.time {
            self.time = normalize_time(&time)?;
        }
        if let Some(mode) = update.mode {
            self.mode = EventMode::from_str(&mode).map_err(|_| {
                AppError::Validation("Mode must be online, offline, or hybrid".to_string())
            })?;
        }
        if let Some(description) = update.description {
            self.description = description.trim().to_string();
        }
        if let Some(overview) = update.overview {
            self.overview = overview.trim().to_string();
        }
        if let Some(image) = update.image {
            self.image = image.trim().to_string();
        }
        if let Some(venue) = update.venue {
            self.venue = venue.trim().to_string();
        }
        if let Some(location) = update.location {
            self.location = location.trim().to_string();
        }
        if let Some(audience) = update.audience {
            self.audience = audience.trim().to_string();
        }
        if let Some(agenda) = update.agenda {
            self.agenda = trim_entries(agenda);
        }
        if let Some(organizer) = update.organizer {
            self.organizer = organizer.trim().to_string();
        }
        if let Some(tags) = update.tags {
            self.tags = trim_entries(tags);
        }

        // Re-check the whole document so a partial update cannot persist an
        // invalid state.
        into_validation_result(validate_event(&self.as_payload()))?;
        if !DATE_RE.is_match(&self.date) || !TIME_RE.is_match(&self.time) {
            return Err(AppError::Validation("Invalid date format".to_string()));
        }

        self.updated_at = Utc::now();
        Ok(())
    }

    fn as_payload(&self) -> EventPayload {
        EventPayload {
            title: self.title.clone(),
            description: self.description.clone(),
            overview: self.overview.clone(),
            image: self.image.clone(),
            venue: self.venue.clone(),
            location: self.location.clone(),
            date: self.date.clone(),
            time: self.time.clone(),
            mode: self.mode.to_string(),
            audience: self.audience.clone(),
            agenda: self.agenda.clone(),
            organizer: self.organizer.clone(),
            tags: self.tags.clone(),
        }
    }
}

fn trim_entries(entries: Vec<String>) -> Vec<String> {
    entries
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_payload() -> EventPayload {
        EventPayload {
            title: "Rust Conf 2026".to_string(),
            description: "A conference about Rust".to_string(),
            overview: "Two days of talks".to_string(),
            image: "https://cdn.example.com/rust-conf.png".to_string(),
            venue: "Convention Center".to_string(),
            location: "Berlin, Germany".to_string(),
            date: "2026-03-14".to_string(),
            time: "9:00 AM".to_string(),
            mode: "Offline".to_string(),
            audience: "Developers".to_string(),
            agenda: vec!["Keynote".to_string(), "Workshops".to_string()],
            organizer: "RustConf Org".to_string(),
            tags: vec!["rust".to_string()],
        }
    }

    #[test]
    fn test_slugify_examples() {
        assert_eq!(slugify("My  Cool Event!!"), "my-cool-event");
        assert_eq!(slugify("Rust Conf 2026"), "rust-conf-2026");
        assert_eq!(slugify("  __Spaced_Out--Title  "), "spaced-out-title");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slugify_is_idempotent() {
        for title in [
            "My  Cool Event!!",
            "Hello, World!",
            "rust & wasm --- 2026",
            "Ünïcode Tïtle",
        ] {
            let once = slugify(title);
            assert_eq!(slugify(&once), once, "slugify not idempotent for {title:?}");
        }
    }

    #[test]
    fn test_slugify_strips_non_ascii_characters() {
        assert_eq!(slugify("Ünïcode Tïtle"), "ncode-ttle");
        assert_eq!(slugify("Café Über Night"), "caf-ber-night");
    }

    #[test]
    fn test_slugify_output_passes_the_lookup_gate() {
        // A created event must stay retrievable by its derived slug.
        for title in [
            "Café Über Night",
            "Rust & WASM!",
            "Ünïcode Tïtle",
            "  spaced   out  ",
            "My  Cool Event!!",
        ] {
            let slug = slugify(title);
            assert!(
                is_valid_slug(&slug),
                "slug {slug:?} from {title:?} fails the slug pattern"
            );
        }
    }

    #[test]
    fn test_normalize_time_12_hour() {
        assert_eq!(normalize_time("2:30 PM").unwrap(), "14:30");
        assert_eq!(normalize_time("12 AM").unwrap(), "00:00");
        assert_eq!(normalize_time("12 PM").unwrap(), "12:00");
        assert_eq!(normalize_time("9:05 am").unwrap(), "09:05");
        assert_eq!(normalize_time("11PM").unwrap(), "23:00");
    }

    #[test]
    fn test_normalize_time_24_hour_passthrough() {
        assert_eq!(normalize_time("00:05").unwrap(), "00:05");
        assert_eq!(normalize_time("23:59").unwrap(), "23:59");
        assert_eq!(normalize_time("9:15").unwrap(), "09:15");
    }

    #[test]
    fn test_normalize_time_rejects_out_of_range() {
        // 13 is outside the 12-hour range even though the shape matches.
        assert!(matches!(
            normalize_time("13 AM"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            normalize_time("24:00"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            normalize_time("10:61"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(normalize_time("noon"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(normalize_date("2026-03-14").unwrap(), "2026-03-14");
        assert_eq!(normalize_date("3/14/2026").unwrap(), "2026-03-14");
        assert_eq!(normalize_date("March 14, 2026").unwrap(), "2026-03-14");
        assert_eq!(
            normalize_date("2026-03-14T10:00:00Z").unwrap(),
            "2026-03-14"
        );
    }

    #[test]
    fn test_normalize_date_rejects_impossible_dates() {
        assert!(matches!(
            normalize_date("2025-13-40"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            normalize_date("not a date"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_event_reports_each_missing_field() {
        let errors = validate_event(&EventPayload::default());
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "title",
                "description",
                "overview",
                "image",
                "venue",
                "location",
                "date",
                "time",
                "mode",
                "audience",
                "agenda",
                "organizer",
                "tags",
            ]
        );
    }

    #[test]
    fn test_validate_event_length_limits() {
        let mut payload = valid_payload();
        payload.title = "x".repeat(201);
        let errors = validate_event(&payload);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "title");
    }

    #[test]
    fn test_validate_event_mode_membership() {
        let mut payload = valid_payload();
        payload.mode = "in-person".to_string();
        let errors = validate_event(&payload);
        assert_eq!(errors[0].field, "mode");
    }

    #[test]
    fn test_from_payload_derives_canonical_fields() {
        let event = Event::from_payload(valid_payload()).unwrap();
        assert_eq!(event.slug, "rust-conf-2026");
        assert_eq!(event.date, "2026-03-14");
        assert_eq!(event.time, "09:00");
        assert_eq!(event.mode, EventMode::Offline);
    }

    #[test]
    fn test_from_payload_rejects_invalid_input() {
        let mut payload = valid_payload();
        payload.time = "13 AM".to_string();
        assert!(matches!(
            Event::from_payload(payload),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_apply_update_rederives_only_changed_fields() {
        let mut event = Event::from_payload(valid_payload()).unwrap();
        let original_slug = event.slug.clone();

        event
            .apply_update(EventUpdate {
                time: Some("2:30 PM".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(event.time, "14:30");
        assert_eq!(event.slug, original_slug);

        event
            .apply_update(EventUpdate {
                title: Some("Rust Conf Revived".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(event.slug, "rust-conf-revived");
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("my-cool-event"));
        assert!(is_valid_slug("event2026"));
        assert!(!is_valid_slug("../etc"));
        assert!(!is_valid_slug("My-Event"));
        assert!(!is_valid_slug("-leading"));
        assert!(!is_valid_slug("double--hyphen"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug(&"a".repeat(201)));
    }
}
