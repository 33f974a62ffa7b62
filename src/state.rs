use std::sync::Arc;

use tokio::sync::RwLock;

use crate::alerts::AlertForwarder;
use crate::domain::Reading;

// the latest reading is shared between every handler.
// arc<rwlock<>>: many concurrent /latest readers, one /update writer at a
// time. an update swaps the whole Option, so readers see either the old
// reading or the new one, never a mix.

#[derive(Clone)]
pub struct AppState {
    pub latest: Arc<RwLock<Option<Reading>>>,
    pub alerts: AlertForwarder,
}

impl AppState {
    pub fn new(alerts: AlertForwarder) -> Self {
        Self {
            latest: Arc::new(RwLock::new(None)),
            alerts,
        }
    }

    pub async fn latest(&self) -> Option<Reading> {
        self.latest.read().await.clone()
    }

    /// Replaces the stored reading. No merge with the previous one.
    pub async fn replace(&self, reading: Reading) {
        *self.latest.write().await = Some(reading);
    }
}
