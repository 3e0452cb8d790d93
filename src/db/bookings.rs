use mongodb::bson::doc;
use mongodb::bson::oid::ObjectId;
use mongodb::{Collection, Database};

use crate::db::events::EventStore;
use crate::db::BOOKINGS_COLLECTION;
use crate::models::booking::Booking;
use crate::utils::error::AppError;

/// Booking collection operations: referential check against Events on
/// create, plus the duplicate pre-check backing the unique index.
pub struct BookingStore {
    collection: Collection<Booking>,
    events: EventStore,
}

impl BookingStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(BOOKINGS_COLLECTION),
            events: EventStore::new(db),
        }
    }

    /// True when a booking already exists for this event and email. Never
    /// throws for a missing record; intended for pre-flight checks.
    pub async fn exists(&self, event_id: &ObjectId, email: &str) -> Result<bool, AppError> {
        let found = self
            .collection
            .find_one(doc! { "eventId": event_id, "email": email })
            .await?;
        Ok(found.is_some())
    }

    /// Creates a booking. The eventId is validated against a live Event
    /// because it is being set here; the duplicate pre-check runs before the
    /// insert, and the compound unique index still catches a race between
    /// the two.
    pub async fn create(&self, event_id: ObjectId, email: &str) -> Result<Booking, AppError> {
        let mut booking = Booking::new(event_id, email)?;

        let event_exists = self.events.exists(&event_id).await?;
        let already_booked = if event_exists {
            self.exists(&event_id, &booking.email).await?
        } else {
            false
        };
        booking_preconditions(event_exists, already_booked)?;

        let result = self.collection.insert_one(&booking).await?;
        booking.id = result.inserted_id.as_object_id();
        Ok(booking)
    }
}

/// Precondition checks for the create path: the referenced Event must exist,
/// and at most one booking per email per event.
fn booking_preconditions(event_exists: bool, already_booked: bool) -> Result<(), AppError> {
    if !event_exists {
        return Err(AppError::Reference("Event does not exist".to_string()));
    }
    if already_booked {
        return Err(AppError::Conflict(
            "A booking already exists for this event and email".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dangling_event_reference_is_rejected() {
        let err = booking_preconditions(false, false).unwrap_err();
        assert!(matches!(err, AppError::Reference(_)));
    }

    #[test]
    fn test_duplicate_event_email_pair_is_rejected() {
        let err = booking_preconditions(true, true).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_first_booking_for_event_passes() {
        assert!(booking_preconditions(true, false).is_ok());
    }
}
