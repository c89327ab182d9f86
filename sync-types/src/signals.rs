//! Input signals consumed by the coordinator.
//!
//! Every type here is owned by some external source (the OS network stack,
//! the sync session, the remote subscription service) and is read-only to
//! subsync.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Host network reachability, as last reported by the OS hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReachabilityStatus {
    /// No report received yet, or the OS could not decide.
    #[default]
    Unknown,
    /// The network is reachable.
    Reachable,
    /// The network is explicitly not reachable.
    NotReachable,
}

impl ReachabilityStatus {
    /// Only an explicit `Reachable` counts as reachable.
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable)
    }

    /// Only an explicit `NotReachable` counts as lost connectivity.
    ///
    /// `Unknown` is neither reachable nor lost.
    pub fn is_lost(&self) -> bool {
        matches!(self, Self::NotReachable)
    }
}

impl fmt::Display for ReachabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Reachable => "reachable",
            Self::NotReachable => "not reachable",
        };
        f.write_str(s)
    }
}

/// Whether the sync session has a live connection to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionConnectionState {
    /// Connected to the sync server.
    Connected,
    /// Not connected.
    #[default]
    Disconnected,
}

/// Whether the sync session is running or paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionActivityState {
    /// The session is actively syncing.
    Active,
    /// The session is paused or logged out.
    #[default]
    Inactive,
}

/// Direction of a transfer progress notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// Local changes going to the server.
    Upload,
    /// Server changes coming to the device.
    Download,
}

/// One progress tick from the sync session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferProgress {
    /// Which way the data is flowing.
    pub direction: TransferDirection,
    /// Whether every known transferable byte has been transferred.
    pub is_complete: bool,
}

impl TransferProgress {
    /// A progress tick that has not completed yet.
    pub fn pending(direction: TransferDirection) -> Self {
        Self {
            direction,
            is_complete: false,
        }
    }

    /// A progress tick reporting completion.
    pub fn complete(direction: TransferDirection) -> Self {
        Self {
            direction,
            is_complete: true,
        }
    }
}

/// Lifecycle of one server-side query subscription.
///
/// Moves toward `Complete` or `Error`; `Invalidated` only appears once the
/// subscription is torn down.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    /// Being registered locally.
    #[default]
    Creating,
    /// Registered, waiting for the server to send matching objects.
    Pending,
    /// The server has delivered the initial result set.
    Complete,
    /// The server rejected or failed the subscription.
    Error(String),
    /// The subscription was removed.
    Invalidated,
}

impl SubscriptionState {
    /// `Complete` or `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error(_))
    }
}
