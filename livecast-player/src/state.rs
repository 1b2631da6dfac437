//! Shared player state
//!
//! The scheduler itself is owned by the poller task; everything else (HTTP
//! handlers, SSE listeners) sees the event broadcast and the last published
//! status snapshot.

use crate::playback::SchedulerStatus;
use livecast_common::events::LivecastEvent;
use tokio::sync::{broadcast, RwLock};

/// Shared state accessible by all components
pub struct SharedState {
    /// Last status published by the poller
    pub status: RwLock<SchedulerStatus>,

    /// Event broadcaster for SSE events
    pub event_tx: broadcast::Sender<LivecastEvent>,
}

impl SharedState {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100); // Buffer up to 100 events
        Self {
            status: RwLock::new(SchedulerStatus::default()),
            event_tx,
        }
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: LivecastEvent) {
        // No receivers is OK
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<LivecastEvent> {
        self.event_tx.subscribe()
    }

    pub async fn get_status(&self) -> SchedulerStatus {
        self.status.read().await.clone()
    }

    pub async fn set_status(&self, status: SchedulerStatus) {
        *self.status.write().await = status;
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
