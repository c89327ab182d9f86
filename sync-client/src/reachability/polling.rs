//! Polling reachability probe.
//!
//! Runs a [`ReachabilityCheck`] on a fixed interval in a background task and
//! reports only the transitions to the monitor's listener.

use super::{ReachabilityListener, ReachabilityProbe};
use crate::config::ReachabilityConfig;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use subsync_types::ReachabilityStatus;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// A single reachability measurement.
#[async_trait]
pub trait ReachabilityCheck: Send + Sync + 'static {
    /// Measure reachability once.
    async fn check(&self) -> ReachabilityStatus;
}

/// Reachable iff a TCP connection to `address` opens within `timeout`.
#[derive(Debug, Clone)]
pub struct TcpCheck {
    address: String,
    timeout: Duration,
}

impl TcpCheck {
    /// Create a check against `address` (`host:port`).
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    /// The probed address.
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl ReachabilityCheck for TcpCheck {
    async fn check(&self) -> ReachabilityStatus {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_)) => ReachabilityStatus::Reachable,
            Ok(Err(e)) => {
                tracing::debug!("Probe {} failed: {}", self.address, e);
                ReachabilityStatus::NotReachable
            }
            Err(_) => {
                tracing::debug!("Probe {} timed out after {:?}", self.address, self.timeout);
                ReachabilityStatus::NotReachable
            }
        }
    }
}

/// Shortest interval [`PollingProbe`] will poll at.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Probe that polls a [`ReachabilityCheck`] in a background task.
///
/// `start()` must be called from within a Tokio runtime; outside one the
/// probe stays idle and the status stays `Unknown`.
pub struct PollingProbe<C> {
    check: Arc<C>,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<C: ReachabilityCheck> PollingProbe<C> {
    /// Poll `check` every `interval`. The first check runs immediately.
    ///
    /// Intervals shorter than [`MIN_POLL_INTERVAL`] are raised to it.
    pub fn new(check: C, interval: Duration) -> Self {
        let interval = if interval < MIN_POLL_INTERVAL {
            tracing::warn!(
                "Reachability poll interval {:?} too short, using {:?}",
                interval,
                MIN_POLL_INTERVAL
            );
            MIN_POLL_INTERVAL
        } else {
            interval
        };
        Self {
            check: Arc::new(check),
            interval,
            task: Mutex::new(None),
        }
    }

    /// Whether the polling task is running.
    pub fn is_running(&self) -> bool {
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl PollingProbe<TcpCheck> {
    /// Build a TCP polling probe from configuration.
    pub fn from_config(config: &ReachabilityConfig) -> Self {
        Self::new(
            TcpCheck::new(config.probe_address.clone(), config.connect_timeout()),
            config.interval(),
        )
    }
}

impl<C: ReachabilityCheck> ReachabilityProbe for PollingProbe<C> {
    fn start(&self, listener: ReachabilityListener) -> ReachabilityStatus {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!("Reachability polling not started: {}", e);
                return ReachabilityStatus::Unknown;
            }
        };

        let check = Arc::clone(&self.check);
        let period = self.interval;
        let handle = runtime.spawn(async move {
            tracing::debug!("Reachability polling started (interval: {:?})", period);

            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last = None;

            loop {
                timer.tick().await;

                let status = check.check().await;
                if last != Some(status) {
                    last = Some(status);
                    listener(status);
                }
            }
        });

        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }

        // The first result arrives asynchronously.
        ReachabilityStatus::Unknown
    }

    fn stop(&self) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = task.take() {
            handle.abort();
            tracing::debug!("Reachability polling stopped");
        }
    }
}

impl<C> Drop for PollingProbe<C> {
    fn drop(&mut self) {
        let task = self.task.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = task.take() {
            handle.abort();
        }
    }
}

impl<C> std::fmt::Debug for PollingProbe<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingProbe")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reachability::ReachabilityMonitor;
    use std::collections::VecDeque;
    use ReachabilityStatus::{NotReachable, Reachable};

    /// Replays a fixed sequence of results, repeating the last one.
    struct ScriptedCheck {
        results: Mutex<VecDeque<ReachabilityStatus>>,
        calls: Arc<Mutex<usize>>,
    }

    impl ScriptedCheck {
        fn new(results: &[ReachabilityStatus]) -> (Self, Arc<Mutex<usize>>) {
            let calls = Arc::new(Mutex::new(0));
            let check = Self {
                results: Mutex::new(results.iter().copied().collect()),
                calls: Arc::clone(&calls),
            };
            (check, calls)
        }
    }

    #[async_trait]
    impl ReachabilityCheck for ScriptedCheck {
        async fn check(&self) -> ReachabilityStatus {
            *self.calls.lock().unwrap() += 1;
            let mut results = self.results.lock().unwrap();
            if results.len() > 1 {
                results.pop_front().unwrap()
            } else {
                *results.front().unwrap()
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reports_only_transitions() {
        let (check, calls) = ScriptedCheck::new(&[Reachable, Reachable, NotReachable]);
        let probe = PollingProbe::new(check, Duration::from_secs(5));
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reported);

        let initial = probe.start(Arc::new(move |s| sink.lock().unwrap().push(s)));
        assert_eq!(initial, ReachabilityStatus::Unknown);

        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(*calls.lock().unwrap(), 3);
        assert_eq!(*reported.lock().unwrap(), vec![Reachable, NotReachable]);
        probe.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_polling() {
        let (check, calls) = ScriptedCheck::new(&[Reachable]);
        let probe = PollingProbe::new(check, Duration::from_secs(1));
        probe.start(Arc::new(|_| {}));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(probe.is_running());

        probe.stop();
        probe.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(!probe.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn drives_a_monitor() {
        let (check, _calls) = ScriptedCheck::new(&[NotReachable, Reachable]);
        let monitor = ReachabilityMonitor::new(PollingProbe::new(check, Duration::from_secs(2)));
        let mut changes = monitor.status_changes();

        monitor.start();

        assert_eq!(changes.next().await, Some(NotReachable));
        assert_eq!(changes.next().await, Some(Reachable));
        assert_eq!(monitor.current_status(), Reachable);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_still_polls() {
        let (check, calls) = ScriptedCheck::new(&[Reachable]);
        let probe = PollingProbe::new(check, Duration::ZERO);
        let monitor = ReachabilityMonitor::new(probe);

        monitor.start();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(monitor.current_status(), Reachable);
        assert!(*calls.lock().unwrap() > 1);
    }

    #[test]
    fn start_outside_runtime_stays_unknown() {
        let (check, calls) = ScriptedCheck::new(&[Reachable]);
        let probe = PollingProbe::new(check, Duration::from_secs(1));

        assert_eq!(probe.start(Arc::new(|_| {})), ReachabilityStatus::Unknown);
        assert!(!probe.is_running());
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn tcp_check_reaches_open_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let check = TcpCheck::new(address, Duration::from_secs(2));

        assert_eq!(check.check().await, Reachable);
    }

    #[tokio::test]
    async fn tcp_check_fails_on_closed_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let check = TcpCheck::new(address, Duration::from_secs(2));

        assert_eq!(check.check().await, NotReachable);
    }

    #[test]
    fn from_config_uses_probe_address() {
        let config = ReachabilityConfig {
            probe_address: "10.0.0.1:80".to_string(),
            ..ReachabilityConfig::default()
        };
        let probe = PollingProbe::from_config(&config);
        assert_eq!(probe.check.address(), "10.0.0.1:80");
        assert_eq!(probe.interval, Duration::from_secs(5));
    }
}
