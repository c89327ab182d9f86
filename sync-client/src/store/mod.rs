//! Store abstraction for subsync.
//!
//! The store is the local object database that knows how to register named
//! query subscriptions with the sync server. subsync never talks to the
//! server itself; it only drives subscriptions through this trait.
//!
//! # Design
//!
//! The trait is synchronous: registering and removing a subscription are
//! local bookkeeping in every store we target, and the interesting part
//! (the server catching up) arrives later through the subscription's state
//! stream.
//!
//! - `objects()` gives the unfiltered view a caller narrows down
//! - `subscribe()` registers a view under a name
//! - `unsubscribe()` removes it by name
//! - `subscriptions()` lists every registered name

mod mock;

pub use mock::{MockStore, QueryView, StoreOp};

use subsync_types::{SubscriptionName, SubscriptionState};
use thiserror::Error;
use tokio::sync::watch;

/// Store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No subscription is registered under this name.
    #[error("subscription not found: {0}")]
    NotFound(SubscriptionName),

    /// The store refused to register the subscription.
    #[error("subscription rejected: {0}")]
    Rejected(String),

    /// The store has been closed.
    #[error("store closed")]
    Closed,
}

/// A local store that can register query subscriptions with the sync server.
pub trait Store: Send + Sync + 'static {
    /// A filtered view over the store's collection.
    ///
    /// The same value is handed back to callers as the result handle once
    /// the subscription has synced.
    type Results: Clone + Send + Sync + 'static;

    /// The unfiltered view over the collection.
    fn objects(&self) -> Self::Results;

    /// Register `query` under `name`.
    ///
    /// Registering an existing name returns a handle to the existing
    /// subscription.
    fn subscribe(
        &self,
        query: &Self::Results,
        name: &SubscriptionName,
    ) -> Result<SubscriptionHandle, StoreError>;

    /// Remove the subscription registered under `name`.
    fn unsubscribe(&self, name: &SubscriptionName) -> Result<(), StoreError>;

    /// Names of every registered subscription.
    fn subscriptions(&self) -> Vec<SubscriptionName>;
}

/// One named server-side query subscription.
///
/// Cloning the handle shares the underlying state stream.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    name: SubscriptionName,
    state: watch::Receiver<SubscriptionState>,
}

impl SubscriptionHandle {
    /// Wrap the state stream the store publishes for `name`.
    pub fn new(name: SubscriptionName, state: watch::Receiver<SubscriptionState>) -> Self {
        Self { name, state }
    }

    /// The name the subscription is registered under.
    pub fn name(&self) -> &SubscriptionName {
        &self.name
    }

    /// The latest state reported by the store.
    pub fn state(&self) -> SubscriptionState {
        self.state.borrow().clone()
    }

    /// A fresh receiver on the state stream.
    pub fn watch(&self) -> watch::Receiver<SubscriptionState> {
        self.state.clone()
    }

    /// Remove this subscription from `store`.
    pub fn unsubscribe<S: Store + ?Sized>(&self, store: &S) -> Result<(), StoreError> {
        store.unsubscribe(&self.name)
    }
}
