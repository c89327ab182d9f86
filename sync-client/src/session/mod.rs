//! Sync session abstraction.
//!
//! A session is the authenticated link between the local store and the sync
//! server. It exposes three streams the status aggregator folds into a
//! [`SyncStatus`](subsync_types::SyncStatus): connection state, activity
//! state and per-direction transfer progress.
//!
//! Every stream is a [`watch`] channel, so a new receiver immediately sees
//! the latest value and a closed channel means the session went away.

mod mock;

pub use mock::MockSession;

use subsync_types::{
    SessionActivityState, SessionConnectionState, TransferDirection, TransferProgress,
};
use tokio::sync::watch;

/// A live session with the sync server.
pub trait SyncSession: Send + Sync {
    /// Connection state stream.
    fn connection_state(&self) -> watch::Receiver<SessionConnectionState>;

    /// Activity state stream.
    fn activity_state(&self) -> watch::Receiver<SessionActivityState>;

    /// Progress stream for one transfer direction.
    fn progress(&self, direction: TransferDirection) -> watch::Receiver<TransferProgress>;
}
