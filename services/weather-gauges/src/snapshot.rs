//! One-shot fetch of the full reading set at start-up

use std::sync::Arc;

use crate::io::HttpClient;
use crate::reading::ReadingSet;
use crate::registry::{SinkRegistry, UpdateSource};

/// What a snapshot load did. Failures are reported, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Response decoded; this many instruments were written
    Applied(usize),
    TransportFailed,
    UnexpectedStatus(u16),
    Malformed,
}

/// Fetches `/readings` and seeds the instruments
pub struct SnapshotLoader {
    url: String,
    http: Arc<dyn HttpClient>,
    registry: Arc<SinkRegistry>,
}

impl std::fmt::Debug for SnapshotLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotLoader")
            .field("url", &self.url)
            .finish()
    }
}

impl SnapshotLoader {
    pub fn new(url: String, http: Arc<dyn HttpClient>, registry: Arc<SinkRegistry>) -> Self {
        Self {
            url,
            http,
            registry,
        }
    }

    pub async fn load(&self) -> SnapshotOutcome {
        tracing::debug!("Loading snapshot from {}", self.url);

        let response = match self.http.get(&self.url).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Snapshot request failed: {}", e);
                return SnapshotOutcome::TransportFailed;
            }
        };

        if response.status != 200 {
            tracing::warn!("Snapshot request returned status {}", response.status);
            return SnapshotOutcome::UnexpectedStatus(response.status);
        }

        match ReadingSet::decode(&response.body) {
            Ok(set) => {
                tracing::debug!("Snapshot readings: {:?}", set);
                let written = self.registry.apply(&set, UpdateSource::Snapshot);
                tracing::info!("Snapshot applied to {} instruments", written);
                SnapshotOutcome::Applied(written)
            }
            Err(e) => {
                tracing::warn!("Snapshot body is not a reading set: {}", e);
                SnapshotOutcome::Malformed
            }
        }
    }
}
