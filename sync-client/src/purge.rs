//! Sweep leftover disposable subscriptions.

use crate::store::{Store, StoreError};

/// Unsubscribe every registered subscription carrying the disposable
/// prefix. Returns how many were removed.
///
/// Safe to run alongside live [`DisposableSyncQuery`](crate::DisposableSyncQuery)
/// slots: a subscription removed here makes the slot's later unsync a no-op.
pub fn purge_disposable_subscriptions<S: Store + ?Sized>(store: &S) -> usize {
    let mut purged = 0;

    for name in store.subscriptions() {
        if !name.is_disposable() {
            continue;
        }
        match store.unsubscribe(&name) {
            Ok(()) => purged += 1,
            Err(StoreError::NotFound(_)) => {
                tracing::debug!("Subscription \"{}\" already removed", name)
            }
            Err(e) => tracing::warn!("Could not purge \"{}\": {}", name, e),
        }
    }

    tracing::info!("Purged {} disposable subscriptions", purged);
    purged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockStore;
    use subsync_types::SubscriptionName;

    #[test]
    fn purges_only_disposable_subscriptions() {
        let store = MockStore::<&'static str>::new();
        let kept = SubscriptionName::new("all-users");
        let first = SubscriptionName::disposable();
        let second = SubscriptionName::disposable();
        for name in [&kept, &first, &second] {
            store.subscribe(&store.objects(), name).unwrap();
        }

        assert_eq!(purge_disposable_subscriptions(&store), 2);

        assert_eq!(store.subscriptions(), vec![kept]);
        assert_eq!(store.unsubscribe_count(&first), 1);
        assert_eq!(store.unsubscribe_count(&second), 1);
    }

    #[test]
    fn empty_store_purges_nothing() {
        let store = MockStore::<&'static str>::new();
        assert_eq!(purge_disposable_subscriptions(&store), 0);
        assert!(store.ops().is_empty());
    }

    #[test]
    fn purge_is_repeatable() {
        let store = MockStore::<&'static str>::new();
        store
            .subscribe(&store.objects(), &SubscriptionName::disposable())
            .unwrap();

        assert_eq!(purge_disposable_subscriptions(&store), 1);
        assert_eq!(purge_disposable_subscriptions(&store), 0);
    }

    #[test]
    fn works_through_trait_object() {
        let store = MockStore::<&'static str>::new();
        store
            .subscribe(&store.objects(), &SubscriptionName::disposable())
            .unwrap();
        let store: &dyn Store<Results = crate::QueryView<&'static str>> = &store;

        assert_eq!(purge_disposable_subscriptions(store), 1);
    }
}
