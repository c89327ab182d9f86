//! A slot holding at most one live sync query.
//!
//! Search-as-you-type screens issue a new query per keystroke. Each call to
//! [`DisposableSyncQuery::sync`] retires the query it replaces before the
//! new subscription is requested, so the server only ever tracks the latest
//! one. Every subscription created here is named with the disposable prefix
//! so that [`purge_disposable_subscriptions`](crate::purge_disposable_subscriptions)
//! can sweep anything a crash left behind.

use crate::query::SyncQuery;
use crate::reachability::ReachabilityMonitor;
use crate::store::Store;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use subsync_core::DEFAULT_QUERY_TIMEOUT;
use subsync_types::{NotifyMode, SubscriptionName, SyncQueryResult};

/// Sequences disposable [`SyncQuery`] instances in one logical slot.
///
/// `previous` is always unsynced. Dropping the slot unsyncs both occupants.
pub struct DisposableSyncQuery<S: Store> {
    store: Arc<S>,
    reachability: ReachabilityMonitor,
    timeout: Duration,
    previous: Option<SyncQuery<S>>,
    current: Option<SyncQuery<S>>,
}

impl<S: Store> DisposableSyncQuery<S> {
    /// Create an empty slot.
    pub fn new(store: Arc<S>, reachability: ReachabilityMonitor) -> Self {
        Self {
            store,
            reachability,
            timeout: DEFAULT_QUERY_TIMEOUT,
            previous: None,
            current: None,
        }
    }

    /// Override the one-shot timeout for queries issued from this slot.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The store's unfiltered view, for building the next query.
    pub fn objects(&self) -> S::Results {
        self.store.objects()
    }

    /// Replace the current query and subscribe without tracking resolution.
    pub fn sync(&mut self, query: S::Results) -> &SyncQuery<S> {
        let current = self.rotate(query);
        current.sync();
        current
    }

    /// Replace the current query and report resolution through `on_resolve`.
    pub fn sync_with<F>(
        &mut self,
        query: S::Results,
        mode: NotifyMode,
        on_resolve: F,
    ) -> &SyncQuery<S>
    where
        F: FnMut(SyncQueryResult<S::Results>) + Send + 'static,
    {
        let current = self.rotate(query);
        current.sync_with(mode, on_resolve);
        current
    }

    /// Replace the current query and await its one-shot outcome.
    pub async fn resolve(&mut self, query: S::Results) -> SyncQueryResult<S::Results> {
        self.rotate(query).resolve().await
    }

    /// The live query, if any.
    pub fn current(&self) -> Option<&SyncQuery<S>> {
        self.current.as_ref()
    }

    /// The most recently retired query, if any. Always unsynced.
    pub fn previous(&self) -> Option<&SyncQuery<S>> {
        self.previous.as_ref()
    }

    /// Name of the live query's subscription.
    pub fn current_name(&self) -> Option<&SubscriptionName> {
        self.current.as_ref().map(SyncQuery::name)
    }

    /// Unsync both occupants and empty the slot.
    pub fn dispose(&mut self) {
        for mut query in [self.previous.take(), self.current.take()]
            .into_iter()
            .flatten()
        {
            query.unsync();
        }
    }

    fn rotate(&mut self, query: S::Results) -> &mut SyncQuery<S> {
        if let Some(mut previous) = self.previous.take() {
            previous.unsync();
        }
        if let Some(mut current) = self.current.take() {
            current.unsync();
            tracing::debug!("Superseded disposable query \"{}\"", current.name());
            self.previous = Some(current);
        }

        let next = SyncQuery::new(
            Arc::clone(&self.store),
            self.reachability.clone(),
            SubscriptionName::disposable(),
            query,
        )
        .with_timeout(self.timeout);
        self.current.insert(next)
    }
}

impl<S: Store> Drop for DisposableSyncQuery<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<S: Store> fmt::Debug for DisposableSyncQuery<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposableSyncQuery")
            .field("previous", &self.previous)
            .field("current", &self.current)
            .finish()
    }
}
