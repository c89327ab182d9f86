//! Sync status decision table.
//!
//! [`SyncSignals`] caches the latest value of every signal contributing to the
//! process-wide [`SyncStatus`]. Every change is applied through
//! [`SyncSignals::apply`], which re-runs the whole table so no partial state
//! survives a single signal update.
//!
//! | reachable | connected | active | upload done | download done | status    |
//! |-----------|-----------|--------|-------------|---------------|-----------|
//! | yes       | yes       | yes    | yes         | yes           | Synced    |
//! | yes       | yes       | yes    | no (either) | -             | Syncing   |
//! | otherwise |           |        |             |               | NotSynced |

use serde::{Deserialize, Serialize};
use subsync_types::{
    ReachabilityStatus, SessionActivityState, SessionConnectionState, SyncStatus,
    TransferDirection, TransferProgress,
};

/// Latest known value of every status input.
///
/// The default is the startup state: nothing reachable, no session, no
/// completed transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncSignals {
    /// Host reachability is explicitly `Reachable`.
    pub reachable: bool,
    /// The session reports `Connected`.
    pub session_connected: bool,
    /// The session reports `Active`.
    pub session_active: bool,
    /// Last upload progress tick was complete.
    pub upload_complete: bool,
    /// Last download progress tick was complete.
    pub download_complete: bool,
}

/// A single change to one status input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalChange {
    /// Host reachability changed.
    Reachability(ReachabilityStatus),
    /// Session connection state changed.
    Connection(SessionConnectionState),
    /// Session activity state changed.
    Activity(SessionActivityState),
    /// A transfer progress tick arrived.
    Progress(TransferProgress),
    /// The session went away (logout). Connection and activity drop to false.
    SessionDetached,
}

impl SyncSignals {
    /// Create signals in the startup state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one change and return the recomputed status.
    pub fn apply(&mut self, change: SignalChange) -> SyncStatus {
        match change {
            SignalChange::Reachability(status) => self.reachable = status.is_reachable(),
            SignalChange::Connection(state) => {
                self.session_connected = state == SessionConnectionState::Connected
            }
            SignalChange::Activity(state) => {
                self.session_active = state == SessionActivityState::Active
            }
            SignalChange::Progress(progress) => match progress.direction {
                TransferDirection::Upload => self.upload_complete = progress.is_complete,
                TransferDirection::Download => self.download_complete = progress.is_complete,
            },
            SignalChange::SessionDetached => {
                self.session_connected = false;
                self.session_active = false;
            }
        }
        self.status()
    }

    /// Reachable, connected and active.
    pub fn is_server_connected(&self) -> bool {
        self.reachable && self.session_connected && self.session_active
    }

    /// Both directions complete.
    pub fn is_transfer_complete(&self) -> bool {
        self.upload_complete && self.download_complete
    }

    /// Evaluate the decision table.
    pub fn status(&self) -> SyncStatus {
        match (self.is_server_connected(), self.is_transfer_complete()) {
            (true, true) => SyncStatus::Synced,
            (true, false) => SyncStatus::Syncing,
            (false, _) => SyncStatus::NotSynced,
        }
    }

    /// `true` iff the status is `Synced`.
    pub fn is_fully_synced(&self) -> bool {
        self.status() == SyncStatus::Synced
    }
}
