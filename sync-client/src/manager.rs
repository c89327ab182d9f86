//! Process-wide sync status.
//!
//! [`SyncManager`] fuses reachability and the current session's signals
//! into a [`SyncStatus`] plus a "fully synced" flag. A background watcher
//! task re-runs the decision table on every change of any input and
//! publishes a [`SyncSnapshot`]:
//!
//! - the latest snapshot is always readable through a `watch` channel
//! - every recomputation is broadcast, in order, to `subscribe()`rs
//!
//! Starts `NotSynced`. Without a session the status stays `NotSynced`.

use crate::config::StatusConfig;
use crate::reachability::ReachabilityMonitor;
use crate::session::SyncSession;
use serde::{Deserialize, Serialize};
use std::future::pending;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use subsync_core::{SignalChange, SyncSignals};
use subsync_types::{
    ReachabilityStatus, SessionActivityState, SessionConnectionState, SyncStatus,
    TransferDirection, TransferProgress,
};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// One recomputation of the sync status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncSnapshot {
    /// Tri-state status.
    pub status: SyncStatus,
    /// `status == Synced`.
    pub fully_synced: bool,
    /// The inputs the status was computed from.
    pub signals: SyncSignals,
}

impl SyncSnapshot {
    fn from_signals(signals: SyncSignals) -> Self {
        Self {
            status: signals.status(),
            fully_synced: signals.is_fully_synced(),
            signals,
        }
    }
}

/// Aggregates reachability and session signals into a [`SyncStatus`].
pub struct SyncManager {
    reachability: ReachabilityMonitor,
    session: Option<Arc<dyn SyncSession>>,
    snapshot: Arc<watch::Sender<SyncSnapshot>>,
    events: broadcast::Sender<SyncSnapshot>,
    generation: Arc<AtomicU64>,
    watcher: Option<JoinHandle<()>>,
}

impl SyncManager {
    /// Create a manager over `reachability`. No session is attached yet.
    pub fn new(reachability: ReachabilityMonitor, config: &StatusConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            reachability,
            session: None,
            snapshot: Arc::new(watch::Sender::new(SyncSnapshot::default())),
            events,
            generation: Arc::new(AtomicU64::new(0)),
            watcher: None,
        }
    }

    /// Attach `session` and start watching. Must be called within a Tokio
    /// runtime.
    pub fn start(&mut self, session: impl SyncSession + 'static) {
        self.attach_session(Some(Arc::new(session)));
    }

    /// Replace the watched session, or detach it with `None` (logout).
    ///
    /// Restarts the watcher and publishes one recomputation right away.
    /// Cached transfer completeness survives a detach. Must be called
    /// within a Tokio runtime.
    pub fn attach_session(&mut self, session: Option<Arc<dyn SyncSession>>) {
        self.stop_watcher();

        let mut reachability = self.reachability.subscribe();
        let mut streams = session.as_deref().map(SessionStreams::new);

        let mut watcher = Watcher {
            signals: self.snapshot.borrow().signals,
            snapshot: Arc::clone(&self.snapshot),
            events: self.events.clone(),
            generation: Arc::clone(&self.generation),
            id: self.generation.load(Ordering::Acquire),
        };
        watcher.signals.apply(SignalChange::Reachability(
            *reachability.borrow_and_update(),
        ));
        let change = match streams.as_mut() {
            Some(streams) => streams.seed(&mut watcher.signals),
            None => SignalChange::SessionDetached,
        };
        watcher.publish(change);

        self.session = session;
        self.watcher = Some(tokio::spawn(watcher.run(reachability, streams)));
    }

    /// Current status.
    pub fn status(&self) -> SyncStatus {
        self.snapshot.borrow().status
    }

    /// `true` iff the status is `Synced`.
    pub fn is_fully_synced(&self) -> bool {
        self.snapshot.borrow().fully_synced
    }

    /// The latest snapshot.
    pub fn snapshot(&self) -> SyncSnapshot {
        *self.snapshot.borrow()
    }

    /// Receive every recomputation from now on, in order.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncSnapshot> {
        self.events.subscribe()
    }

    /// Follow the latest snapshot.
    pub fn watch(&self) -> watch::Receiver<SyncSnapshot> {
        self.snapshot.subscribe()
    }

    /// Whether a session is attached.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Stop watching and release the session.
    pub fn shutdown(&mut self) {
        self.stop_watcher();
        self.session = None;
    }

    /// Abort the watcher and retire its generation. An aborted watcher may
    /// still be inside `publish` on another worker; it will find its
    /// generation retired and publish nothing.
    fn stop_watcher(&mut self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

impl Drop for SyncManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncManager")
            .field("snapshot", &self.snapshot())
            .field("session", &self.has_session())
            .finish()
    }
}

struct SessionStreams {
    connection: watch::Receiver<SessionConnectionState>,
    activity: watch::Receiver<SessionActivityState>,
    upload: watch::Receiver<TransferProgress>,
    download: watch::Receiver<TransferProgress>,
}

impl SessionStreams {
    fn new(session: &dyn SyncSession) -> Self {
        Self {
            connection: session.connection_state(),
            activity: session.activity_state(),
            upload: session.progress(TransferDirection::Upload),
            download: session.progress(TransferDirection::Download),
        }
    }

    /// Fold the session's current values into `signals`, returning the last
    /// change so the caller publishes a single recomputation.
    fn seed(&mut self, signals: &mut SyncSignals) -> SignalChange {
        signals.apply(SignalChange::Connection(
            *self.connection.borrow_and_update(),
        ));
        signals.apply(SignalChange::Activity(*self.activity.borrow_and_update()));
        signals.apply(SignalChange::Progress(*self.upload.borrow_and_update()));
        SignalChange::Progress(*self.download.borrow_and_update())
    }
}

struct Watcher {
    signals: SyncSignals,
    snapshot: Arc<watch::Sender<SyncSnapshot>>,
    events: broadcast::Sender<SyncSnapshot>,
    generation: Arc<AtomicU64>,
    id: u64,
}

impl Watcher {
    async fn run(
        mut self,
        reachability: watch::Receiver<ReachabilityStatus>,
        streams: Option<SessionStreams>,
    ) {
        let mut reachability = Some(reachability);
        let mut streams = streams;

        loop {
            if reachability.is_none() && streams.is_none() {
                tracing::debug!("Sync status watcher has no signals left");
                return;
            }

            let change = {
                let (connection, activity, upload, download) = match streams.as_mut() {
                    Some(s) => (
                        Some(&mut s.connection),
                        Some(&mut s.activity),
                        Some(&mut s.upload),
                        Some(&mut s.download),
                    ),
                    None => (None, None, None, None),
                };

                tokio::select! {
                    status = next_change(reachability.as_mut()) => {
                        status.map(SignalChange::Reachability).ok_or(Closed::Reachability)
                    }
                    state = next_change(connection) => {
                        state.map(SignalChange::Connection).ok_or(Closed::Session)
                    }
                    state = next_change(activity) => {
                        state.map(SignalChange::Activity).ok_or(Closed::Session)
                    }
                    progress = next_change(upload) => {
                        progress.map(SignalChange::Progress).ok_or(Closed::Session)
                    }
                    progress = next_change(download) => {
                        progress.map(SignalChange::Progress).ok_or(Closed::Session)
                    }
                }
            };

            let published = match change {
                Ok(change) => self.publish(change),
                Err(Closed::Reachability) => {
                    reachability = None;
                    true
                }
                Err(Closed::Session) => {
                    tracing::info!("Sync session closed");
                    streams = None;
                    self.publish(SignalChange::SessionDetached)
                }
            };
            if !published {
                return;
            }
        }
    }

    /// Apply one change and publish the recomputation. Returns `false`
    /// without publishing once this watcher has been superseded.
    fn publish(&mut self, change: SignalChange) -> bool {
        let previous = self.signals.status();
        self.signals.apply(change);
        let snapshot = SyncSnapshot::from_signals(self.signals);

        // The generation is checked under the snapshot's write lock, so a
        // retired watcher can never land after its successor's first publish.
        let events = &self.events;
        let generation = &self.generation;
        let id = self.id;
        let published = self.snapshot.send_if_modified(|latest| {
            if generation.load(Ordering::Acquire) != id {
                return false;
            }
            *latest = snapshot;
            // Ignore send errors (no receivers)
            let _ = events.send(snapshot);
            true
        });

        if !published {
            tracing::debug!("Superseded sync status watcher stopped");
        } else if snapshot.status != previous {
            tracing::info!("Sync status: {} -> {}", previous, snapshot.status);
        } else {
            tracing::debug!("Sync status recomputed: {}", snapshot.status);
        }
        published
    }
}

enum Closed {
    Reachability,
    Session,
}

/// Wait for the next value on `receiver`; `None` once it closes. A missing
/// receiver never resolves.
async fn next_change<T: Copy>(receiver: Option<&mut watch::Receiver<T>>) -> Option<T> {
    match receiver {
        Some(receiver) => {
            receiver.changed().await.ok()?;
            let value = *receiver.borrow_and_update();
            Some(value)
        }
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reachability::MockProbe;
    use crate::session::MockSession;
    use ReachabilityStatus::{NotReachable, Reachable, Unknown};

    fn setup() -> (MockProbe, SyncManager) {
        let probe = MockProbe::new(Unknown);
        let monitor = ReachabilityMonitor::new(probe.clone());
        monitor.start();
        (probe, SyncManager::new(monitor, &StatusConfig::default()))
    }

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    fn drive(probe: &MockProbe, session: &MockSession, bits: u8) {
        probe.set_status(if bits & 0b10000 != 0 {
            Reachable
        } else {
            NotReachable
        });
        session.set_connection(if bits & 0b01000 != 0 {
            SessionConnectionState::Connected
        } else {
            SessionConnectionState::Disconnected
        });
        session.set_activity(if bits & 0b00100 != 0 {
            SessionActivityState::Active
        } else {
            SessionActivityState::Inactive
        });
        session.report_progress(TransferProgress {
            direction: TransferDirection::Upload,
            is_complete: bits & 0b00010 != 0,
        });
        session.report_progress(TransferProgress {
            direction: TransferDirection::Download,
            is_complete: bits & 0b00001 != 0,
        });
    }

    #[tokio::test]
    async fn starts_not_synced() {
        let (_probe, manager) = setup();
        assert_eq!(manager.status(), SyncStatus::NotSynced);
        assert!(!manager.is_fully_synced());
        assert!(!manager.has_session());
    }

    #[tokio::test]
    async fn synced_session_with_reachable_network() {
        let (probe, mut manager) = setup();
        probe.set_status(Reachable);

        manager.start(MockSession::synced());

        // Published before start() returned
        assert_eq!(manager.status(), SyncStatus::Synced);
        assert!(manager.is_fully_synced());
    }

    #[tokio::test]
    async fn unknown_reachability_is_not_synced() {
        let (_probe, mut manager) = setup();
        manager.start(MockSession::synced());
        assert_eq!(manager.status(), SyncStatus::NotSynced);
    }

    #[tokio::test]
    async fn status_table_holds_end_to_end() {
        let (probe, mut manager) = setup();
        let session = MockSession::new();
        manager.start(session.clone());

        for bits in 0u8..32 {
            drive(&probe, &session, bits);
            settle().await;

            let connected = bits & 0b11100 == 0b11100;
            let transferred = bits & 0b00011 == 0b00011;
            let expected = match (connected, transferred) {
                (true, true) => SyncStatus::Synced,
                (true, false) => SyncStatus::Syncing,
                (false, _) => SyncStatus::NotSynced,
            };
            assert_eq!(manager.status(), expected, "combination {:05b}", bits);
            assert_eq!(
                manager.is_fully_synced(),
                expected == SyncStatus::Synced,
                "combination {:05b}",
                bits
            );
        }
    }

    #[tokio::test]
    async fn every_recomputation_is_broadcast_in_order() {
        let (probe, mut manager) = setup();
        probe.set_status(Reachable);
        let session = MockSession::new();
        let mut events = manager.subscribe();

        manager.start(session.clone());
        session.set_connection(SessionConnectionState::Connected);
        settle().await;
        session.set_activity(SessionActivityState::Active);
        settle().await;
        session.report_progress(TransferProgress::complete(TransferDirection::Upload));
        settle().await;
        session.report_progress(TransferProgress::complete(TransferDirection::Download));
        settle().await;

        let mut statuses = Vec::new();
        while let Ok(snapshot) = events.try_recv() {
            statuses.push(snapshot.status);
        }
        assert_eq!(
            statuses,
            vec![
                SyncStatus::NotSynced, // attach
                SyncStatus::NotSynced, // connected, still inactive
                SyncStatus::Syncing,
                SyncStatus::Syncing,
                SyncStatus::Synced,
            ]
        );
    }

    #[tokio::test]
    async fn network_loss_drops_to_not_synced() {
        let (probe, mut manager) = setup();
        probe.set_status(Reachable);
        manager.start(MockSession::synced());
        let mut watch = manager.watch();

        probe.set_status(NotReachable);
        watch.changed().await.unwrap();

        assert_eq!(watch.borrow().status, SyncStatus::NotSynced);
        assert!(!watch.borrow().signals.reachable);
    }

    #[tokio::test]
    async fn detaching_session_is_not_synced() {
        let (probe, mut manager) = setup();
        probe.set_status(Reachable);
        manager.start(MockSession::synced());
        assert!(manager.is_fully_synced());

        manager.attach_session(None);

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.status, SyncStatus::NotSynced);
        assert!(!snapshot.signals.session_connected);
        // Transfer cache survives the detach
        assert!(snapshot.signals.upload_complete);
        assert!(snapshot.signals.download_complete);
    }

    /// A session whose streams the test closes by dropping the senders.
    struct ChannelSession {
        connection: watch::Receiver<SessionConnectionState>,
        activity: watch::Receiver<SessionActivityState>,
        upload: watch::Receiver<TransferProgress>,
        download: watch::Receiver<TransferProgress>,
    }

    impl SyncSession for ChannelSession {
        fn connection_state(&self) -> watch::Receiver<SessionConnectionState> {
            self.connection.clone()
        }

        fn activity_state(&self) -> watch::Receiver<SessionActivityState> {
            self.activity.clone()
        }

        fn progress(&self, direction: TransferDirection) -> watch::Receiver<TransferProgress> {
            match direction {
                TransferDirection::Upload => self.upload.clone(),
                TransferDirection::Download => self.download.clone(),
            }
        }
    }

    #[tokio::test]
    async fn closed_session_is_detached() {
        let (probe, mut manager) = setup();
        probe.set_status(Reachable);
        let (connection_tx, connection) = watch::channel(SessionConnectionState::Connected);
        let (_activity_tx, activity) = watch::channel(SessionActivityState::Active);
        let (_upload_tx, upload) =
            watch::channel(TransferProgress::complete(TransferDirection::Upload));
        let (_download_tx, download) =
            watch::channel(TransferProgress::complete(TransferDirection::Download));
        manager.start(ChannelSession {
            connection,
            activity,
            upload,
            download,
        });
        assert!(manager.is_fully_synced());
        let mut watch = manager.watch();

        drop(connection_tx);
        watch.changed().await.unwrap();

        let snapshot = *watch.borrow();
        assert_eq!(snapshot.status, SyncStatus::NotSynced);
        assert!(!snapshot.signals.session_connected);
        assert!(!snapshot.signals.session_active);
    }

    #[tokio::test]
    async fn reattaching_follows_new_session() {
        let (probe, mut manager) = setup();
        probe.set_status(Reachable);
        let old = MockSession::new();
        manager.start(old.clone());
        manager.start(MockSession::synced());

        // The old session no longer drives the status
        old.set_connection(SessionConnectionState::Disconnected);
        settle().await;

        assert_eq!(manager.status(), SyncStatus::Synced);
    }

    #[tokio::test]
    async fn shutdown_stops_recomputing() {
        let (probe, mut manager) = setup();
        probe.set_status(Reachable);
        let session = MockSession::synced();
        manager.start(session.clone());

        manager.shutdown();
        session.set_connection(SessionConnectionState::Disconnected);
        settle().await;

        assert_eq!(manager.status(), SyncStatus::Synced);
        assert!(!manager.has_session());
    }

    #[tokio::test]
    async fn retired_watcher_cannot_overwrite_new_session() {
        let (probe, mut manager) = setup();
        probe.set_status(Reachable);
        manager.start(MockSession::new());

        // A watcher from the first attach, caught mid-publish by the swap
        let mut retired = Watcher {
            signals: manager.snapshot().signals,
            snapshot: Arc::clone(&manager.snapshot),
            events: manager.events.clone(),
            generation: Arc::clone(&manager.generation),
            id: manager.generation.load(Ordering::Acquire),
        };
        manager.start(MockSession::synced());
        let mut events = manager.subscribe();

        let published = retired.publish(SignalChange::Connection(
            SessionConnectionState::Disconnected,
        ));

        assert!(!published);
        assert_eq!(manager.status(), SyncStatus::Synced);
        assert!(manager.snapshot().signals.session_connected);
        assert!(events.try_recv().is_err());
    }
}
