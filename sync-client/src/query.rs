//! Named, revocable sync queries.
//!
//! A [`SyncQuery`] registers one named subscription with the [`Store`] and,
//! when asked, tracks it to a [`SyncQueryResult`]. Resolution tracking runs
//! in a single spawned listener task that owns the subscription state
//! stream, the reachability stream and the timeout. Every signal is fed
//! through the pure [`QueryState`] machine, so a one-shot query resolves at
//! most once no matter how the signals interleave.
//!
//! # Teardown
//!
//! - [`SyncQuery::unsync`] stops the listener and unsubscribes from the
//!   store. It is idempotent.
//! - Dropping a query only stops the listener; the subscription stays
//!   registered until someone unsubscribes it (see
//!   [`purge_disposable_subscriptions`](crate::purge_disposable_subscriptions)).

use crate::reachability::ReachabilityMonitor;
use crate::store::{Store, StoreError, SubscriptionHandle};
use std::fmt;
use std::future::pending;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use subsync_core::{Action, Event, QueryState, Resolution, DEFAULT_QUERY_TIMEOUT};
use subsync_types::{
    NotifyMode, ReachabilityStatus, SubscriptionName, SubscriptionState, SyncQueryError,
    SyncQueryResult,
};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// One named query subscription and its resolution listener.
pub struct SyncQuery<S: Store> {
    name: SubscriptionName,
    query: S::Results,
    store: Arc<S>,
    reachability: ReachabilityMonitor,
    timeout: Duration,
    subscription: Option<SubscriptionHandle>,
    listener: Option<Listener>,
}

struct Listener {
    state: Arc<Mutex<QueryState>>,
    task: JoinHandle<()>,
}

impl<S: Store> SyncQuery<S> {
    /// Create a query for `query` registered under `name`.
    ///
    /// Nothing is subscribed until [`sync`](Self::sync) or
    /// [`sync_with`](Self::sync_with) is called.
    pub fn new(
        store: Arc<S>,
        reachability: ReachabilityMonitor,
        name: impl Into<SubscriptionName>,
        query: S::Results,
    ) -> Self {
        Self {
            name: name.into(),
            query,
            store,
            reachability,
            timeout: DEFAULT_QUERY_TIMEOUT,
            subscription: None,
            listener: None,
        }
    }

    /// Create a query by narrowing the store's unfiltered view.
    pub fn with_query(
        store: Arc<S>,
        reachability: ReachabilityMonitor,
        name: impl Into<SubscriptionName>,
        build: impl FnOnce(S::Results) -> S::Results,
    ) -> Self {
        let query = build(store.objects());
        Self::new(store, reachability, name, query)
    }

    /// Override the one-shot timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The subscription name.
    pub fn name(&self) -> &SubscriptionName {
        &self.name
    }

    /// The query's result handle.
    pub fn results(&self) -> &S::Results {
        &self.query
    }

    /// The one-shot timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether this query holds a live subscription.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Whether a resolution listener is still waiting for signals.
    pub fn is_listening(&self) -> bool {
        self.listener.as_ref().is_some_and(|l| {
            l.state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_resolving()
        })
    }

    /// Subscribe without tracking resolution.
    ///
    /// Failures are logged, not returned.
    pub fn sync(&mut self) {
        if let Err(e) = self.subscribe() {
            tracing::warn!("SyncQuery \"{}\" could not subscribe: {}", self.name, e);
        }
    }

    /// Subscribe and report resolution through `on_resolve`.
    ///
    /// With [`NotifyMode::OneShot`] the callback fires exactly once: on
    /// completion, error, loss of connectivity or timeout. With
    /// [`NotifyMode::Indefinite`] it fires on every completion, error and
    /// loss of connectivity until the query is unsynced or dropped.
    ///
    /// Any listener from a previous call is stopped first. Must be called
    /// within a Tokio runtime.
    pub fn sync_with<F>(&mut self, mode: NotifyMode, mut on_resolve: F)
    where
        F: FnMut(SyncQueryResult<S::Results>) + Send + 'static,
    {
        self.stop_listening();

        let subscription = match self.subscribe() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!("SyncQuery \"{}\" could not subscribe: {}", self.name, e);
                on_resolve(SyncQueryResult::Failed(SyncQueryError::Store(e.to_string())));
                return;
            }
        };

        let mut reachability = self.reachability.subscribe();
        let started = Event::Started {
            mode,
            reachability: *reachability.borrow_and_update(),
        };

        let mut resolver = Resolver {
            name: self.name.clone(),
            results: self.query.clone(),
            timeout: self.timeout,
            deadline: None,
            state: Arc::new(Mutex::new(QueryState::new())),
            on_resolve,
        };

        if !resolver.dispatch(started) {
            // Resolved on the spot; nothing left to listen to.
            return;
        }

        let state = Arc::clone(&resolver.state);
        let task = tokio::spawn(resolver.run(subscription.watch(), reachability));
        self.listener = Some(Listener { state, task });
    }

    /// One-shot sync, awaiting the outcome.
    pub async fn resolve(&mut self) -> SyncQueryResult<S::Results> {
        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);
        self.sync_with(NotifyMode::OneShot, move |result| {
            if let Some(tx) = tx.take() {
                let _ = tx.send(result);
            }
        });
        rx.await.unwrap_or(SyncQueryResult::NoConnection)
    }

    /// Stop listening and unsubscribe from the store.
    ///
    /// Safe to call repeatedly and without a prior sync.
    pub fn unsync(&mut self) {
        self.stop_listening();

        let Some(subscription) = self.subscription.take() else {
            return;
        };
        match subscription.unsubscribe(self.store.as_ref()) {
            Ok(()) => tracing::debug!("SyncQuery \"{}\" unsubscribed", self.name),
            Err(StoreError::NotFound(_)) => {
                tracing::debug!("SyncQuery \"{}\" was already unsubscribed", self.name)
            }
            Err(e) => tracing::warn!("SyncQuery \"{}\" could not unsubscribe: {}", self.name, e),
        }
    }

    fn subscribe(&mut self) -> Result<SubscriptionHandle, StoreError> {
        if let Some(handle) = &self.subscription {
            return Ok(handle.clone());
        }
        let handle = self.store.subscribe(&self.query, &self.name)?;
        self.subscription = Some(handle.clone());
        Ok(handle)
    }

    fn stop_listening(&mut self) {
        if let Some(listener) = self.listener.take() {
            {
                let mut state = listener.state.lock().unwrap_or_else(PoisonError::into_inner);
                let (next, _) = std::mem::take(&mut *state).on_event(Event::Cancelled);
                *state = next;
            }
            listener.task.abort();
        }
    }
}

impl<S: Store> Drop for SyncQuery<S> {
    fn drop(&mut self) {
        self.stop_listening();
    }
}

impl<S: Store> fmt::Debug for SyncQuery<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncQuery")
            .field("name", &self.name)
            .field("subscribed", &self.is_subscribed())
            .field("listening", &self.is_listening())
            .finish()
    }
}

/// The listener side of a query: interprets [`Action`]s from the state
/// machine.
struct Resolver<R, F> {
    name: SubscriptionName,
    results: R,
    timeout: Duration,
    deadline: Option<Instant>,
    state: Arc<Mutex<QueryState>>,
    on_resolve: F,
}

impl<R, F> Resolver<R, F>
where
    R: Clone + Send + 'static,
    F: FnMut(SyncQueryResult<R>) + Send + 'static,
{
    async fn run(
        mut self,
        mut subscription: watch::Receiver<SubscriptionState>,
        mut reachability: watch::Receiver<ReachabilityStatus>,
    ) {
        // The subscription may have finished before we started listening.
        let initial = Event::SubscriptionChanged {
            state: subscription.borrow_and_update().clone(),
            reachability: *reachability.borrow(),
        };
        if !self.dispatch(initial) {
            return;
        }

        let mut subscription_open = true;
        let mut reachability_open = true;

        loop {
            if !subscription_open && !reachability_open && self.deadline.is_none() {
                tracing::debug!("SyncQuery \"{}\" has no signals left", self.name);
                return;
            }

            let deadline = self.deadline;
            let timer = async move {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => pending().await,
                }
            };

            let event = tokio::select! {
                changed = subscription.changed(), if subscription_open => match changed {
                    Ok(()) => Event::SubscriptionChanged {
                        state: subscription.borrow_and_update().clone(),
                        reachability: *reachability.borrow(),
                    },
                    Err(_) => {
                        subscription_open = false;
                        continue;
                    }
                },
                changed = reachability.changed(), if reachability_open => match changed {
                    Ok(()) => Event::ReachabilityChanged {
                        status: *reachability.borrow_and_update(),
                    },
                    Err(_) => {
                        reachability_open = false;
                        continue;
                    }
                },
                _ = timer => Event::TimedOut,
            };

            if !self.dispatch(event) {
                return;
            }
        }
    }

    /// Feed one event through the state machine and run its actions.
    ///
    /// Returns `false` once the machine will never act again.
    fn dispatch(&mut self, event: Event) -> bool {
        let (actions, keep_listening) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let (next, actions) = std::mem::take(&mut *state).on_event(event.clone());
            let keep_listening = !next.is_finished();
            *state = next;
            (actions, keep_listening)
        };

        for action in actions {
            match action {
                Action::ArmTimeout => self.deadline = Some(Instant::now() + self.timeout),
                Action::Teardown => self.deadline = None,
                Action::Resolve(resolution) => {
                    self.log_resolution(&event, &resolution);
                    let result = match resolution {
                        Resolution::Synced => SyncQueryResult::Synced(self.results.clone()),
                        Resolution::NoConnection => SyncQueryResult::NoConnection,
                        Resolution::Failed(message) => {
                            SyncQueryResult::Failed(SyncQueryError::Subscription(message))
                        }
                    };
                    (self.on_resolve)(result);
                }
            }
        }

        keep_listening
    }

    fn log_resolution(&self, event: &Event, resolution: &Resolution) {
        let name = &self.name;
        match (event, resolution) {
            (_, Resolution::Synced) => tracing::debug!("SyncQuery \"{}\" synced", name),
            (_, Resolution::Failed(message)) => {
                tracing::warn!("SyncQuery \"{}\" failed: {}", name, message)
            }
            (Event::Started { .. }, _) => {
                tracing::warn!("SyncQuery \"{}\" has no network connection", name)
            }
            (Event::TimedOut, _) => {
                tracing::warn!("SyncQuery \"{}\" timed out after {:?}", name, self.timeout)
            }
            (Event::SubscriptionChanged { .. }, _) => tracing::warn!(
                "SyncQuery \"{}\" completed without a network connection",
                name
            ),
            (Event::ReachabilityChanged { .. }, _) => {
                tracing::warn!("SyncQuery \"{}\" lost its network connection", name)
            }
            (Event::Cancelled, _) => tracing::debug!("SyncQuery \"{}\" cancelled", name),
        }
    }
}
