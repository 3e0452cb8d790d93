use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, to_bson};
use mongodb::{Collection, Database};
use tracing::warn;

use crate::db::EVENTS_COLLECTION;
use crate::models::event::{Event, EventPayload, EventUpdate};
use crate::utils::error::AppError;

/// Event collection operations. Every write goes through the validation and
/// derivation pipeline before anything is persisted.
pub struct EventStore {
    collection: Collection<Event>,
}

impl EventStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(EVENTS_COLLECTION),
        }
    }

    /// All events, newest first.
    pub async fn list(&self) -> Result<Vec<Event>, AppError> {
        let cursor = self
            .collection
            .find(doc! {})
            .sort(doc! { "createdAt": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Event>, AppError> {
        Ok(self.collection.find_one(doc! { "slug": slug }).await?)
    }

    pub async fn exists(&self, id: &ObjectId) -> Result<bool, AppError> {
        let found = self.collection.find_one(doc! { "_id": id }).await?;
        Ok(found.is_some())
    }

    /// Runs the create pipeline and inserts the document. A validation or
    /// derivation failure aborts before the insert; a slug collision surfaces
    /// as a conflict from the unique index.
    pub async fn create(&self, payload: EventPayload) -> Result<Event, AppError> {
        let mut event = Event::from_payload(payload)?;
        let result = self.collection.insert_one(&event).await?;
        event.id = result.inserted_id.as_object_id();
        Ok(event)
    }

    /// Loads the event, applies the changed fields (re-deriving slug, date,
    /// and time only when their triggering field is present), and replaces
    /// the stored document.
    pub async fn update(&self, slug: &str, update: EventUpdate) -> Result<Event, AppError> {
        let mut event = self
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No event exists with slug: {slug}")))?;
        let id = event
            .id
            .ok_or_else(|| AppError::Internal("Stored event is missing its id".to_string()))?;

        event.apply_update(update)?;

        self.collection
            .replace_one(doc! { "_id": id }, &event)
            .await?;
        Ok(event)
    }

    /// Events sharing at least one tag with the named event, excluding the
    /// event itself. Degrades to an empty list when the lookup fails.
    pub async fn find_similar(&self, slug: &str) -> Result<Vec<Event>, AppError> {
        let Some(event) = self.find_by_slug(slug).await? else {
            return Err(AppError::NotFound(format!(
                "No event exists with slug: {slug}"
            )));
        };

        let tags = to_bson(&event.tags)
            .map_err(|e| AppError::Internal(format!("Failed to encode tags: {e}")))?;
        let filter = doc! {
            "_id": { "$ne": event.id },
            "tags": { "$in": tags },
        };

        match self.collection.find(filter).await {
            Ok(cursor) => Ok(cursor.try_collect().await.unwrap_or_default()),
            Err(e) => {
                warn!(error = %e, slug, "Similar-events lookup failed");
                Ok(Vec::new())
            }
        }
    }
}
