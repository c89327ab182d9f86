//! Values produced by the coordinator.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::SyncQueryError;

/// How many times a query reports back to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyMode {
    /// Resolve exactly once, under a timeout, then stop listening.
    OneShot,
    /// Report every qualifying signal until the query is unsynced.
    Indefinite,
}

/// Outcome of a sync query.
///
/// `R` is the store's result handle for the query (a live view over the
/// synced objects).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncQueryResult<R> {
    /// The subscription completed while the network was reachable.
    Synced(R),
    /// Sync could not be confirmed: network lost, or timed out.
    NoConnection,
    /// The subscription failed.
    Failed(SyncQueryError),
}

impl<R> SyncQueryResult<R> {
    /// Whether this is `Synced`.
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced(_))
    }

    /// The result handle, if synced.
    pub fn results(self) -> Option<R> {
        match self {
            Self::Synced(results) => Some(results),
            _ => None,
        }
    }

    /// Map the result handle, keeping the outcome.
    pub fn map<U>(self, f: impl FnOnce(R) -> U) -> SyncQueryResult<U> {
        match self {
            Self::Synced(results) => SyncQueryResult::Synced(f(results)),
            Self::NoConnection => SyncQueryResult::NoConnection,
            Self::Failed(err) => SyncQueryResult::Failed(err),
        }
    }
}

/// Process-wide sync status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Connected and every transfer is complete.
    Synced,
    /// Connected, transfers still running.
    Syncing,
    /// Not connected to the server.
    #[default]
    NotSynced,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Synced => "synced",
            Self::Syncing => "syncing",
            Self::NotSynced => "not synced",
        };
        f.write_str(s)
    }
}
