//! # sync-types
//!
//! Shared types for subsync, the query-subscription sync coordinator.
//!
//! This crate provides the foundational types used across all subsync crates:
//! - [`SubscriptionName`] - Names for server-side query subscriptions, including
//!   the disposable naming convention used for garbage collection
//! - [`ReachabilityStatus`], [`SessionConnectionState`], [`SessionActivityState`],
//!   [`TransferProgress`], [`SubscriptionState`] - The signals the coordinator consumes
//! - [`SyncQueryResult`], [`SyncStatus`], [`NotifyMode`] - What the coordinator produces
//! - [`SyncQueryError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod outcome;
mod signals;

pub use error::SyncQueryError;
pub use ids::{SubscriptionName, DISPOSABLE_SUBSCRIPTION_PREFIX};
pub use outcome::{NotifyMode, SyncQueryResult, SyncStatus};
pub use signals::{
    ReachabilityStatus, SessionActivityState, SessionConnectionState, SubscriptionState,
    TransferDirection, TransferProgress,
};
