//! Mock session for testing.
//!
//! Lets tests drive connection, activity and progress by hand.

use super::SyncSession;
use std::sync::Arc;
use subsync_types::{
    SessionActivityState, SessionConnectionState, TransferDirection, TransferProgress,
};
use tokio::sync::watch;

/// Mock session for testing.
///
/// Clones share the same streams. The streams close once every clone is
/// dropped, which the aggregator treats as the session going away.
#[derive(Debug, Clone)]
pub struct MockSession {
    connection: Arc<watch::Sender<SessionConnectionState>>,
    activity: Arc<watch::Sender<SessionActivityState>>,
    upload: Arc<watch::Sender<TransferProgress>>,
    download: Arc<watch::Sender<TransferProgress>>,
}

impl MockSession {
    /// Create a disconnected, inactive session with no completed transfers.
    pub fn new() -> Self {
        Self {
            connection: Arc::new(watch::Sender::new(SessionConnectionState::Disconnected)),
            activity: Arc::new(watch::Sender::new(SessionActivityState::Inactive)),
            upload: Arc::new(watch::Sender::new(TransferProgress::pending(
                TransferDirection::Upload,
            ))),
            download: Arc::new(watch::Sender::new(TransferProgress::pending(
                TransferDirection::Download,
            ))),
        }
    }

    /// Create a connected, active session with both transfers complete.
    pub fn synced() -> Self {
        let session = Self::new();
        session.set_connection(SessionConnectionState::Connected);
        session.set_activity(SessionActivityState::Active);
        session.report_progress(TransferProgress::complete(TransferDirection::Upload));
        session.report_progress(TransferProgress::complete(TransferDirection::Download));
        session
    }

    /// Publish a connection state.
    pub fn set_connection(&self, state: SessionConnectionState) {
        self.connection.send_replace(state);
    }

    /// Publish an activity state.
    pub fn set_activity(&self, state: SessionActivityState) {
        self.activity.send_replace(state);
    }

    /// Publish a progress tick for its direction.
    pub fn report_progress(&self, progress: TransferProgress) {
        self.sender(progress.direction).send_replace(progress);
    }

    /// Number of live receivers on the connection stream.
    pub fn connection_receivers(&self) -> usize {
        self.connection.receiver_count()
    }

    fn sender(&self, direction: TransferDirection) -> &watch::Sender<TransferProgress> {
        match direction {
            TransferDirection::Upload => &self.upload,
            TransferDirection::Download => &self.download,
        }
    }
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncSession for MockSession {
    fn connection_state(&self) -> watch::Receiver<SessionConnectionState> {
        self.connection.subscribe()
    }

    fn activity_state(&self) -> watch::Receiver<SessionActivityState> {
        self.activity.subscribe()
    }

    fn progress(&self, direction: TransferDirection) -> watch::Receiver<TransferProgress> {
        self.sender(direction).subscribe()
    }
}
