//! # sync-client
//!
//! Subscription lifecycle and sync status coordination for subsync.
//!
//! This is the library applications use to keep named server-side query
//! subscriptions in step with connectivity.
//!
//! ## Features
//!
//! - **Sync Queries**: one named subscription resolved to `Synced`,
//!   `NoConnection` or `Failed` under a timeout ([`SyncQuery`])
//! - **Disposable Slots**: search-as-you-type sequencing that retires stale
//!   subscriptions ([`DisposableSyncQuery`], [`purge_disposable_subscriptions`])
//! - **Sync Status**: reachability and session signals folded into one
//!   process-wide status ([`SyncManager`])
//! - **Pure State Machines**: uses sync-core for side-effect-free decisions
//!
//! ## Example
//!
//! ```ignore
//! use subsync_client::{DisposableSyncQuery, MockProbe, ReachabilityMonitor};
//! use subsync_types::{NotifyMode, ReachabilityStatus};
//!
//! let reachability = ReachabilityMonitor::new(MockProbe::new(ReachabilityStatus::Reachable));
//! reachability.start();
//!
//! let mut slot = DisposableSyncQuery::new(store, reachability);
//! let query = slot.objects().filter(|user| user.name.starts_with("al"));
//! slot.sync_with(query, NotifyMode::OneShot, |result| {
//!     // Synced(results) / NoConnection / Failed(error)
//! });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod disposable;
pub mod manager;
pub mod purge;
pub mod query;
pub mod reachability;
pub mod session;
pub mod store;

pub use config::{Config, ConfigError, QueryConfig, ReachabilityConfig, StatusConfig};
pub use disposable::DisposableSyncQuery;
pub use manager::{SyncManager, SyncSnapshot};
pub use purge::purge_disposable_subscriptions;
pub use query::SyncQuery;
pub use reachability::{
    MockProbe, PollingProbe, ReachabilityCheck, ReachabilityListener, ReachabilityMonitor,
    ReachabilityProbe, StatusChanges, TcpCheck,
};
pub use session::{MockSession, SyncSession};
pub use store::{MockStore, QueryView, Store, StoreError, StoreOp, SubscriptionHandle};

// Status inputs carried by every snapshot
pub use subsync_core::SyncSignals;
