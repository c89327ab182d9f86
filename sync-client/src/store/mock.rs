//! Mock store for testing.
//!
//! Holds an in-memory collection, records every subscribe/unsubscribe, and
//! lets tests play the sync server by pushing subscription states.

use super::{Store, StoreError, SubscriptionHandle};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use subsync_types::{SubscriptionName, SubscriptionState};
use tokio::sync::watch;

type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// A filtered, live view over a [`MockStore`] collection.
///
/// Reading the view evaluates the filters against the store's current
/// contents, so objects inserted after the query was built show up.
pub struct QueryView<T> {
    items: Arc<Mutex<Vec<T>>>,
    predicates: Vec<Predicate<T>>,
}

impl<T> QueryView<T> {
    /// Narrow the view with another predicate.
    pub fn filter(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.predicates.push(Arc::new(predicate));
        self
    }

    fn matches(&self, item: &T) -> bool {
        self.predicates.iter().all(|p| p(item))
    }
}

impl<T: Clone> QueryView<T> {
    /// The objects currently matching every filter.
    pub fn items(&self) -> Vec<T> {
        let items = self.items.lock().unwrap();
        items.iter().filter(|i| self.matches(i)).cloned().collect()
    }

    /// Number of matching objects.
    pub fn len(&self) -> usize {
        let items = self.items.lock().unwrap();
        items.iter().filter(|i| self.matches(i)).count()
    }

    /// Whether nothing matches.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for QueryView<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            predicates: self.predicates.clone(),
        }
    }
}

impl<T> fmt::Debug for QueryView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryView")
            .field("filters", &self.predicates.len())
            .finish()
    }
}

/// A recorded store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// A subscription was registered (or re-registered).
    Subscribe(SubscriptionName),
    /// A subscription was removed.
    Unsubscribe(SubscriptionName),
}

/// Mock store for testing.
///
/// Clones share state, so a test can keep one handle while the code under
/// test owns another.
#[derive(Debug)]
pub struct MockStore<T> {
    items: Arc<Mutex<Vec<T>>>,
    inner: Arc<Mutex<MockStoreInner>>,
}

#[derive(Debug, Default)]
struct MockStoreInner {
    subscriptions: BTreeMap<SubscriptionName, watch::Sender<SubscriptionState>>,
    ops: Vec<StoreOp>,
    fail_next_subscribe: Option<String>,
    closed: bool,
}

impl<T> MockStore<T> {
    /// Create an empty mock store.
    pub fn new() -> Self {
        Self::with_items(Vec::new())
    }

    /// Create a mock store holding `items`.
    pub fn with_items(items: Vec<T>) -> Self {
        Self {
            items: Arc::new(Mutex::new(items)),
            inner: Arc::new(Mutex::new(MockStoreInner::default())),
        }
    }

    /// Add an object to the collection.
    pub fn insert(&self, item: T) {
        self.items.lock().unwrap().push(item);
    }

    /// Push a new state for the named subscription, as the server would.
    ///
    /// Returns `false` if no such subscription is registered.
    pub fn set_state(&self, name: &SubscriptionName, state: SubscriptionState) -> bool {
        let inner = self.inner.lock().unwrap();
        match inner.subscriptions.get(name) {
            Some(sender) => {
                sender.send_replace(state);
                true
            }
            None => false,
        }
    }

    /// Mark the named subscription complete.
    pub fn complete(&self, name: &SubscriptionName) -> bool {
        self.set_state(name, SubscriptionState::Complete)
    }

    /// Mark the named subscription failed with `message`.
    pub fn fail(&self, name: &SubscriptionName, message: &str) -> bool {
        self.set_state(name, SubscriptionState::Error(message.to_string()))
    }

    /// Current state of the named subscription, if registered.
    pub fn state_of(&self, name: &SubscriptionName) -> Option<SubscriptionState> {
        let inner = self.inner.lock().unwrap();
        inner.subscriptions.get(name).map(|s| s.borrow().clone())
    }

    /// Whether a subscription is registered under `name`.
    pub fn is_subscribed(&self, name: &SubscriptionName) -> bool {
        self.inner.lock().unwrap().subscriptions.contains_key(name)
    }

    /// Every operation performed so far, in order.
    pub fn ops(&self) -> Vec<StoreOp> {
        self.inner.lock().unwrap().ops.clone()
    }

    /// How many times `name` was successfully unsubscribed.
    pub fn unsubscribe_count(&self, name: &SubscriptionName) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .ops
            .iter()
            .filter(|op| matches!(op, StoreOp::Unsubscribe(n) if n == name))
            .count()
    }

    /// Cause the next subscribe() to fail with the given error.
    pub fn fail_next_subscribe(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_subscribe = Some(error.to_string());
    }

    /// Close the store: drop every state stream and refuse new subscriptions.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        inner.subscriptions.clear();
    }

    /// Clear subscriptions, recorded operations and forced failures.
    ///
    /// The collection is left untouched.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockStoreInner::default();
    }
}

impl<T> Default for MockStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for MockStore<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> Store for MockStore<T> {
    type Results = QueryView<T>;

    fn objects(&self) -> QueryView<T> {
        QueryView {
            items: Arc::clone(&self.items),
            predicates: Vec::new(),
        }
    }

    fn subscribe(
        &self,
        _query: &QueryView<T>,
        name: &SubscriptionName,
    ) -> Result<SubscriptionHandle, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.closed {
            return Err(StoreError::Closed);
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_subscribe.take() {
            return Err(StoreError::Rejected(error));
        }

        let receiver = inner
            .subscriptions
            .entry(name.clone())
            .or_insert_with(|| watch::channel(SubscriptionState::Pending).0)
            .subscribe();
        inner.ops.push(StoreOp::Subscribe(name.clone()));

        Ok(SubscriptionHandle::new(name.clone(), receiver))
    }

    fn unsubscribe(&self, name: &SubscriptionName) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();

        let sender = inner
            .subscriptions
            .remove(name)
            .ok_or_else(|| StoreError::NotFound(name.clone()))?;
        sender.send_replace(SubscriptionState::Invalidated);
        inner.ops.push(StoreOp::Unsubscribe(name.clone()));
        Ok(())
    }

    fn subscriptions(&self) -> Vec<SubscriptionName> {
        let inner = self.inner.lock().unwrap();
        inner.subscriptions.keys().cloned().collect()
    }
}
