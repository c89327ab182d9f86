//! Subscription naming for subsync.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix carried by every subscription created through a disposable query.
///
/// The purge operation unsubscribes anything with this prefix, so names built
/// by hand must not start with it unless they are meant to be collectable.
pub const DISPOSABLE_SUBSCRIPTION_PREFIX: &str = "disposableSyncQuery-";

/// The name a query subscription is registered under in the store.
///
/// Names are the only key the store uses to unsubscribe, so two queries
/// sharing a name share a server-side subscription.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionName(String);

impl SubscriptionName {
    /// Create a name from any string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Generate a fresh disposable name: the disposable prefix followed by a
    /// random UUID v4.
    pub fn disposable() -> Self {
        Self(format!(
            "{}{}",
            DISPOSABLE_SUBSCRIPTION_PREFIX,
            uuid::Uuid::new_v4()
        ))
    }

    /// Whether this name was produced by [`SubscriptionName::disposable`]
    /// (or otherwise carries the disposable prefix).
    pub fn is_disposable(&self) -> bool {
        self.0.starts_with(DISPOSABLE_SUBSCRIPTION_PREFIX)
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubscriptionName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for SubscriptionName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for SubscriptionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SubscriptionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionName({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposable_names_carry_prefix() {
        let name = SubscriptionName::disposable();
        assert!(name.as_str().starts_with(DISPOSABLE_SUBSCRIPTION_PREFIX));
        assert!(name.is_disposable());
    }

    #[test]
    fn disposable_suffix_is_uuid_v4() {
        let name = SubscriptionName::disposable();
        let suffix = &name.as_str()[DISPOSABLE_SUBSCRIPTION_PREFIX.len()..];
        let uuid = uuid::Uuid::parse_str(suffix).unwrap();
        assert_eq!(uuid.get_version_num(), 4);
    }

    #[test]
    fn disposable_names_do_not_collide() {
        let names: std::collections::HashSet<_> =
            (0..1000).map(|_| SubscriptionName::disposable()).collect();
        assert_eq!(names.len(), 1000);
    }

    #[test]
    fn plain_names_are_not_disposable() {
        assert!(!SubscriptionName::new("all-users").is_disposable());
        // Prefix must be at the start, not just anywhere.
        assert!(!SubscriptionName::new("x-disposableSyncQuery-1").is_disposable());
    }

    #[test]
    fn serializes_as_plain_string() {
        let name = SubscriptionName::new("users-by-name");
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"users-by-name\"");
    }
}
