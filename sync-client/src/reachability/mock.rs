//! Mock reachability probe for testing.

use super::{ReachabilityListener, ReachabilityProbe};
use std::sync::{Arc, Mutex};
use subsync_types::ReachabilityStatus;

/// Mock reachability probe for testing.
///
/// Clones share state, so a test keeps one handle to flip reachability
/// while the monitor owns another.
#[derive(Clone, Default)]
pub struct MockProbe {
    inner: Arc<Mutex<MockProbeInner>>,
}

#[derive(Default)]
struct MockProbeInner {
    status: ReachabilityStatus,
    listener: Option<ReachabilityListener>,
    start_count: usize,
}

impl MockProbe {
    /// Create a probe that reports `status` when started.
    pub fn new(status: ReachabilityStatus) -> Self {
        let probe = Self::default();
        probe.inner.lock().unwrap().status = status;
        probe
    }

    /// Change reachability and notify the listener, if any.
    pub fn set_status(&self, status: ReachabilityStatus) {
        let listener = {
            let mut inner = self.inner.lock().unwrap();
            inner.status = status;
            inner.listener.clone()
        };
        if let Some(listener) = listener {
            listener(status);
        }
    }

    /// The status the probe currently reports.
    pub fn status(&self) -> ReachabilityStatus {
        self.inner.lock().unwrap().status
    }

    /// Whether a listener is registered.
    pub fn is_listening(&self) -> bool {
        self.inner.lock().unwrap().listener.is_some()
    }

    /// How many times `start()` was called.
    pub fn start_count(&self) -> usize {
        self.inner.lock().unwrap().start_count
    }
}

impl std::fmt::Debug for MockProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("MockProbe")
            .field("status", &inner.status)
            .field("listening", &inner.listener.is_some())
            .finish()
    }
}

impl ReachabilityProbe for MockProbe {
    fn start(&self, listener: ReachabilityListener) -> ReachabilityStatus {
        let mut inner = self.inner.lock().unwrap();
        inner.listener = Some(listener);
        inner.start_count += 1;
        inner.status
    }

    fn stop(&self) {
        self.inner.lock().unwrap().listener = None;
    }
}
