//! Error types for subsync queries.

use thiserror::Error;

/// Why a sync query reported [`SyncQueryResult::Failed`](crate::SyncQueryResult::Failed).
///
/// Messages are diagnostic text from the store or the remote service.
/// Callers should not branch on their content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncQueryError {
    /// The remote service reported an error for the subscription.
    #[error("subscription error: {0}")]
    Subscription(String),

    /// The local store refused to register the subscription.
    #[error("store rejected subscription: {0}")]
    Store(String),
}

impl SyncQueryError {
    /// The diagnostic message, without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Subscription(msg) | Self::Store(msg) => msg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncQueryError::Subscription("permission denied".into());
        assert_eq!(err.to_string(), "subscription error: permission denied");
    }

    #[test]
    fn message_strips_prefix() {
        let err = SyncQueryError::Store("duplicate name".into());
        assert_eq!(err.message(), "duplicate name");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncQueryError>();
    }
}
