use std::sync::Arc;

use crate::db::ConnectionCache;
use crate::media::MediaClient;

/// Shared application state injected into handlers. The connection cache is
/// the only shared mutable resource; the media client is absent when the
/// media host is not configured.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ConnectionCache>,
    pub media: Option<MediaClient>,
}

impl AppState {
    pub fn new(cache: Arc<ConnectionCache>, media: Option<MediaClient>) -> Self {
        Self { cache, media }
    }
}
