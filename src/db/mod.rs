//! Process-wide MongoDB connection handling.
//!
//! One [`ConnectionCache`] is constructed at startup and injected into every
//! handler through the application state. The first `acquire` establishes the
//! connection; concurrent first-callers collapse into a single attempt and a
//! failed attempt is cleared so the next call retries.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Database, IndexModel};
use tracing::info;

use crate::models::booking::Booking;
use crate::models::event::Event;
use crate::utils::error::AppError;

pub mod bookings;
pub mod events;

pub const EVENTS_COLLECTION: &str = "events";
pub const BOOKINGS_COLLECTION: &str = "bookings";

// Fixed connection parameters; defaults, not tunable per call.
const MAX_POOL_SIZE: u32 = 10;
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(45);

type ConnectResult = Result<Client, String>;
type ConnectFuture = Shared<BoxFuture<'static, ConnectResult>>;
type Connector = Arc<dyn Fn() -> BoxFuture<'static, ConnectResult> + Send + Sync>;

/// Current lifecycle state of the cached connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Default)]
struct CacheState {
    conn: Option<Client>,
    in_flight: Option<ConnectFuture>,
    disconnecting: bool,
}

/// Lazily-initialized shared connection with single-flight establishment.
pub struct ConnectionCache {
    db_name: String,
    connector: Connector,
    state: Mutex<CacheState>,
}

impl ConnectionCache {
    pub fn new(uri: impl Into<String>, db_name: impl Into<String>) -> Self {
        let uri = uri.into();
        let connector: Connector = Arc::new(move || {
            let uri = uri.clone();
            async move { connect(&uri).await }.boxed()
        });
        Self::with_connector(db_name, connector)
    }

    fn with_connector(db_name: impl Into<String>, connector: Connector) -> Self {
        Self {
            db_name: db_name.into(),
            connector,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Returns the established client, connecting on first use. Concurrent
    /// callers while no connection exists all await the same attempt.
    pub async fn acquire(&self) -> Result<Client, AppError> {
        let attempt = {
            let mut state = self.state.lock().unwrap();
            if let Some(client) = &state.conn {
                return Ok(client.clone());
            }
            match &state.in_flight {
                Some(pending) => pending.clone(),
                None => {
                    let attempt = (self.connector)().shared();
                    state.in_flight = Some(attempt.clone());
                    attempt
                }
            }
        };

        // Await a clone; the original handle is still needed below to tell
        // whether the stored in-flight attempt is ours.
        match attempt.clone().await {
            Ok(client) => {
                let mut state = self.state.lock().unwrap();
                state.conn = Some(client.clone());
                Ok(client)
            }
            Err(message) => {
                let mut state = self.state.lock().unwrap();
                // Clear only our own failed attempt; a newer attempt may
                // already be underway or have succeeded.
                if state
                    .in_flight
                    .as_ref()
                    .is_some_and(|pending| pending.ptr_eq(&attempt))
                {
                    state.in_flight = None;
                    state.conn = None;
                }
                Err(AppError::Connection(format!(
                    "Failed to connect to MongoDB: {message}"
                )))
            }
        }
    }

    /// Convenience wrapper returning the configured database handle.
    pub async fn database(&self) -> Result<Database, AppError> {
        Ok(self.acquire().await?.database(&self.db_name))
    }

    /// Closes the cached connection and clears all cached state, enabling a
    /// clean reconnect on the next `acquire`.
    pub async fn release(&self) {
        let client = {
            let mut state = self.state.lock().unwrap();
            state.in_flight = None;
            let client = state.conn.take();
            state.disconnecting = client.is_some();
            client
        };

        if let Some(client) = client {
            client.shutdown().await;
            self.state.lock().unwrap().disconnecting = false;
            info!("Disconnected from MongoDB");
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        let state = self.state.lock().unwrap();
        if state.disconnecting {
            ConnectionStatus::Disconnecting
        } else if state.conn.is_some() {
            ConnectionStatus::Connected
        } else if state.in_flight.is_some() {
            ConnectionStatus::Connecting
        } else {
            ConnectionStatus::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }
}

async fn connect(uri: &str) -> ConnectResult {
    let mut options = ClientOptions::parse(uri)
        .await
        .map_err(|e| e.to_string())?;
    options.max_pool_size = Some(MAX_POOL_SIZE);
    options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
    options.connect_timeout = Some(CONNECT_TIMEOUT);

    let client = Client::with_options(options).map_err(|e| e.to_string())?;

    // The driver connects lazily; ping so establishment is observable and
    // failures surface here instead of on the first query.
    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(|e| e.to_string())?;

    info!("Successfully connected to MongoDB");
    Ok(client)
}

/// Creates the unique indexes backing slug and (eventId, email) uniqueness,
/// plus the eventId lookup index.
pub async fn ensure_indexes(db: &Database) -> Result<(), AppError> {
    let unique = || IndexOptions::builder().unique(true).build();

    db.collection::<Event>(EVENTS_COLLECTION)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "slug": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    let bookings = db.collection::<Booking>(BOOKINGS_COLLECTION);
    bookings
        .create_index(
            IndexModel::builder()
                .keys(doc! { "eventId": 1, "email": 1 })
                .options(unique())
                .build(),
        )
        .await?;
    bookings
        .create_index(IndexModel::builder().keys(doc! { "eventId": 1 }).build())
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Client handle built without any I/O; the driver only connects when a
    /// command is issued, which these tests never do.
    fn offline_client() -> Client {
        let options = ClientOptions::builder()
            .hosts(vec![mongodb::options::ServerAddress::Tcp {
                host: "localhost".to_string(),
                port: Some(27017),
            }])
            .build();
        Client::with_options(options).unwrap()
    }

    fn counting_connector(attempts: Arc<AtomicUsize>, failures: usize) -> Connector {
        Arc::new(move || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                // Yield so simultaneous callers overlap with the attempt.
                tokio::time::sleep(Duration::from_millis(10)).await;
                if attempt < failures {
                    Err("simulated connect failure".to_string())
                } else {
                    Ok(offline_client())
                }
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn test_concurrent_first_use_single_flight() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(ConnectionCache::with_connector(
            "devevent",
            counting_connector(attempts.clone(), 0),
        ));

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.acquire().await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(cache.is_connected());
    }

    #[tokio::test]
    async fn test_failed_attempt_is_cleared_for_retry() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let cache =
            ConnectionCache::with_connector("devevent", counting_connector(attempts.clone(), 1));

        let first = cache.acquire().await;
        assert!(matches!(first, Err(AppError::Connection(_))));
        assert_eq!(cache.status(), ConnectionStatus::Disconnected);

        // The cleared in-flight slot lets the next call start fresh.
        let second = cache.acquire().await;
        assert!(second.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_failure_all_callers_see_error() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(ConnectionCache::with_connector(
            "devevent",
            counting_connector(attempts.clone(), 1),
        ));

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.acquire().await })
            })
            .collect();

        for handle in handles {
            assert!(matches!(
                handle.await.unwrap(),
                Err(AppError::Connection(_))
            ));
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_acquire_after_success_does_not_reconnect() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let cache =
            ConnectionCache::with_connector("devevent", counting_connector(attempts.clone(), 0));

        cache.acquire().await.unwrap();
        cache.acquire().await.unwrap();
        cache.acquire().await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_enables_clean_reconnect() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let cache =
            ConnectionCache::with_connector("devevent", counting_connector(attempts.clone(), 0));

        cache.acquire().await.unwrap();
        assert!(cache.is_connected());

        cache.release().await;
        assert_eq!(cache.status(), ConnectionStatus::Disconnected);

        cache.acquire().await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_status_reports_connecting_while_in_flight() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(ConnectionCache::with_connector(
            "devevent",
            counting_connector(attempts.clone(), 0),
        ));

        let task = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.acquire().await })
        };
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(cache.status(), ConnectionStatus::Connecting);

        task.await.unwrap().unwrap();
        assert_eq!(cache.status(), ConnectionStatus::Connected);
    }
}
