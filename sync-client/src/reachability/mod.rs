//! Host network reachability.
//!
//! [`ReachabilityMonitor`] owns the process-wide [`ReachabilityStatus`]. The
//! only writer is the listener it hands to its [`ReachabilityProbe`]; every
//! other component reads the current value or follows the change stream.
//!
//! The status starts `Unknown` and stays there until the probe reports.
//! Having no network is `NotReachable`, never an error.

mod mock;
mod polling;

pub use mock::MockProbe;
pub use polling::{PollingProbe, ReachabilityCheck, TcpCheck, MIN_POLL_INTERVAL};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use subsync_types::ReachabilityStatus;
use tokio::sync::watch;

/// Callback a probe invokes on every reachability change.
pub type ReachabilityListener = Arc<dyn Fn(ReachabilityStatus) + Send + Sync>;

/// A source of OS-level reachability changes.
pub trait ReachabilityProbe: Send + Sync + 'static {
    /// Begin listening, reporting changes through `listener`.
    ///
    /// Returns the status known right now, which may be `Unknown` if the
    /// probe can only tell asynchronously.
    fn start(&self, listener: ReachabilityListener) -> ReachabilityStatus;

    /// Stop listening. Must be safe to call more than once.
    fn stop(&self);
}

/// Process-wide reachability state.
///
/// Cheap to clone; clones share the same status. The probe is stopped when
/// the last clone is dropped.
#[derive(Clone)]
pub struct ReachabilityMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    status: Arc<watch::Sender<ReachabilityStatus>>,
    probe: Box<dyn ReachabilityProbe>,
    started: AtomicBool,
}

impl ReachabilityMonitor {
    /// Create a monitor backed by `probe`. Call [`start`](Self::start) to
    /// begin listening.
    pub fn new(probe: impl ReachabilityProbe) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                status: Arc::new(watch::Sender::new(ReachabilityStatus::Unknown)),
                probe: Box::new(probe),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Start listening and establish the initial status.
    ///
    /// Only the first call has an effect.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let sender = Arc::clone(&self.inner.status);
        let listener: ReachabilityListener = Arc::new(move |status| {
            let changed = sender.send_if_modified(|current| {
                if *current == status {
                    false
                } else {
                    *current = status;
                    true
                }
            });
            if changed {
                tracing::debug!("Reachability changed to {}", status);
            }
        });

        let initial = self.inner.probe.start(listener);

        // The listener may already have reported; never overwrite that.
        self.inner.status.send_if_modified(|current| {
            if *current == ReachabilityStatus::Unknown && initial != ReachabilityStatus::Unknown {
                *current = initial;
                true
            } else {
                false
            }
        });
        tracing::debug!("Reachability monitor started ({})", self.current_status());
    }

    /// Whether [`start`](Self::start) has been called.
    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Last known status (`Unknown` before the probe first reports).
    pub fn current_status(&self) -> ReachabilityStatus {
        *self.inner.status.borrow()
    }

    /// A fresh stream of status transitions.
    ///
    /// The stream only yields changes made after it was created. If several
    /// changes happen before the consumer reads, the most recent wins.
    pub fn status_changes(&self) -> StatusChanges {
        StatusChanges {
            receiver: self.subscribe(),
        }
    }

    /// A raw watch receiver on the status.
    pub fn subscribe(&self) -> watch::Receiver<ReachabilityStatus> {
        self.inner.status.subscribe()
    }
}

impl fmt::Debug for ReachabilityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReachabilityMonitor")
            .field("status", &self.current_status())
            .field("started", &self.is_started())
            .finish()
    }
}

impl Drop for MonitorInner {
    fn drop(&mut self) {
        if *self.started.get_mut() {
            self.probe.stop();
        }
    }
}

/// Stream of reachability transitions from a [`ReachabilityMonitor`].
#[derive(Debug)]
pub struct StatusChanges {
    receiver: watch::Receiver<ReachabilityStatus>,
}

impl StatusChanges {
    /// Wait for the next transition.
    ///
    /// Returns `None` once the monitor has been dropped.
    pub async fn next(&mut self) -> Option<ReachabilityStatus> {
        self.receiver.changed().await.ok()?;
        Some(*self.receiver.borrow_and_update())
    }
}
