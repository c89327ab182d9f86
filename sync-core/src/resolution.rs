//! Query resolution state machine for subsync.
//!
//! This module provides a pure, side-effect-free state machine deciding when
//! a sync query has resolved and with which outcome. The state machine takes
//! events as input and produces a new state plus a list of actions to execute.
//!
//! The actual listening (subscription state stream, reachability changes,
//! the timeout timer) is performed by sync-client, not by this module.
//!
//! ```text
//!            Started              Complete / Error / TimedOut / lost
//!   Idle ─────────────► Resolving ─────────────────────────────────► Resolved
//!     │                    │                     (OneShot only)
//!     └──── Cancelled ─────┴──────────────► Cancelled
//! ```

use std::time::Duration;
use subsync_types::{NotifyMode, ReachabilityStatus, SubscriptionState};

/// Default time a one-shot query waits for a terminal signal.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolution state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState {
    /// Not listening yet.
    Idle,
    /// Listening for subscription, reachability and timer signals.
    Resolving {
        /// How often the caller wants to hear back.
        mode: NotifyMode,
    },
    /// A one-shot query produced its single outcome.
    Resolved,
    /// The caller tore the query down before it resolved.
    Cancelled,
}

impl QueryState {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (sync-client)
    /// is responsible for executing the returned actions in order.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // From Idle
            (
                Self::Idle,
                Event::Started {
                    mode: NotifyMode::OneShot,
                    reachability,
                },
            ) => {
                if reachability.is_lost() {
                    (
                        Self::Resolved,
                        vec![Action::Teardown, Action::Resolve(Resolution::NoConnection)],
                    )
                } else {
                    (
                        Self::Resolving {
                            mode: NotifyMode::OneShot,
                        },
                        vec![Action::ArmTimeout],
                    )
                }
            }
            (
                Self::Idle,
                Event::Started {
                    mode: NotifyMode::Indefinite,
                    reachability,
                },
            ) => {
                let actions = if reachability.is_lost() {
                    vec![Action::Resolve(Resolution::NoConnection)]
                } else {
                    vec![]
                };
                (
                    Self::Resolving {
                        mode: NotifyMode::Indefinite,
                    },
                    actions,
                )
            }
            (Self::Idle, Event::Cancelled) => (Self::Cancelled, vec![]),

            // From Resolving
            (Self::Resolving { mode }, Event::SubscriptionChanged { state, reachability }) => {
                let resolution = match state {
                    SubscriptionState::Complete => completion(reachability),
                    SubscriptionState::Error(message) => Resolution::Failed(message),
                    SubscriptionState::Creating
                    | SubscriptionState::Pending
                    | SubscriptionState::Invalidated => {
                        return (Self::Resolving { mode }, vec![]);
                    }
                };
                resolve(mode, resolution)
            }
            (Self::Resolving { mode }, Event::ReachabilityChanged { status }) => {
                if status.is_lost() {
                    resolve(mode, Resolution::NoConnection)
                } else {
                    (Self::Resolving { mode }, vec![])
                }
            }
            (
                Self::Resolving {
                    mode: NotifyMode::OneShot,
                },
                Event::TimedOut,
            ) => resolve(NotifyMode::OneShot, Resolution::NoConnection),
            (Self::Resolving { .. }, Event::Cancelled) => {
                (Self::Cancelled, vec![Action::Teardown])
            }

            // Terminal states and ignored signals
            (state, _) => (state, vec![]),
        }
    }

    /// Check if the machine is still listening for signals.
    pub fn is_resolving(&self) -> bool {
        matches!(self, Self::Resolving { .. })
    }

    /// Check if the machine will never act again.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Resolved | Self::Cancelled)
    }
}

impl Default for QueryState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that can occur while a query resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The caller asked for resolution tracking.
    Started {
        /// Requested notification mode.
        mode: NotifyMode,
        /// Reachability at the moment of the request.
        reachability: ReachabilityStatus,
    },
    /// The subscription reported a new state.
    SubscriptionChanged {
        /// The new subscription state.
        state: SubscriptionState,
        /// Reachability at the moment the state was observed.
        reachability: ReachabilityStatus,
    },
    /// Host reachability changed.
    ReachabilityChanged {
        /// The new reachability status.
        status: ReachabilityStatus,
    },
    /// The one-shot timeout elapsed.
    TimedOut,
    /// The caller unsynced or dropped the query.
    Cancelled,
}

/// Outcome of a resolution, before the result handle is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The subscription completed while reachable.
    Synced,
    /// Connectivity lost, or timed out.
    NoConnection,
    /// The subscription reported an error.
    Failed(String),
}

/// Actions to be executed by the sync-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Start the one-shot timeout timer.
    ArmTimeout,
    /// Stop the timer and drop every listener.
    Teardown,
    /// Hand an outcome to the caller.
    Resolve(Resolution),
}

/// A completed subscription only counts as synced if the network has not
/// been explicitly lost in the meantime.
fn completion(reachability: ReachabilityStatus) -> Resolution {
    if reachability.is_lost() {
        Resolution::NoConnection
    } else {
        Resolution::Synced
    }
}

fn resolve(mode: NotifyMode, resolution: Resolution) -> (QueryState, Vec<Action>) {
    match mode {
        NotifyMode::OneShot => (
            QueryState::Resolved,
            vec![Action::Teardown, Action::Resolve(resolution)],
        ),
        NotifyMode::Indefinite => (
            QueryState::Resolving {
                mode: NotifyMode::Indefinite,
            },
            vec![Action::Resolve(resolution)],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ReachabilityStatus::{NotReachable, Reachable, Unknown};

    fn start(mode: NotifyMode, reachability: ReachabilityStatus) -> (QueryState, Vec<Action>) {
        QueryState::new().on_event(Event::Started { mode, reachability })
    }

    fn resolutions(actions: &[Action]) -> Vec<Resolution> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Resolve(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    fn complete(reachability: ReachabilityStatus) -> Event {
        Event::SubscriptionChanged {
            state: SubscriptionState::Complete,
            reachability,
        }
    }

    fn error(message: &str) -> Event {
        Event::SubscriptionChanged {
            state: SubscriptionState::Error(message.into()),
            reachability: Reachable,
        }
    }

    fn lost() -> Event {
        Event::ReachabilityChanged {
            status: NotReachable,
        }
    }

    // ===========================================
    // One-shot
    // ===========================================

    #[test]
    fn starts_idle() {
        assert_eq!(QueryState::new(), QueryState::Idle);
    }

    #[test]
    fn one_shot_resolves_immediately_when_not_reachable() {
        let (state, actions) = start(NotifyMode::OneShot, NotReachable);

        assert_eq!(state, QueryState::Resolved);
        assert_eq!(
            actions,
            vec![Action::Teardown, Action::Resolve(Resolution::NoConnection)]
        );
        assert!(!actions.contains(&Action::ArmTimeout));
    }

    #[test]
    fn one_shot_arms_timeout_when_reachable() {
        let (state, actions) = start(NotifyMode::OneShot, Reachable);

        assert!(state.is_resolving());
        assert_eq!(actions, vec![Action::ArmTimeout]);
    }

    #[test]
    fn one_shot_tolerates_unknown_at_start() {
        let (state, actions) = start(NotifyMode::OneShot, Unknown);

        assert!(state.is_resolving());
        assert_eq!(actions, vec![Action::ArmTimeout]);
    }

    #[test]
    fn complete_while_reachable_resolves_synced() {
        let (state, _) = start(NotifyMode::OneShot, Reachable);
        let (state, actions) = state.on_event(complete(Reachable));

        assert_eq!(state, QueryState::Resolved);
        assert_eq!(
            actions,
            vec![Action::Teardown, Action::Resolve(Resolution::Synced)]
        );
    }

    #[test]
    fn complete_while_not_reachable_resolves_no_connection() {
        let (state, _) = start(NotifyMode::OneShot, Reachable);
        let (_, actions) = state.on_event(complete(NotReachable));

        assert_eq!(resolutions(&actions), vec![Resolution::NoConnection]);
    }

    #[test]
    fn error_resolves_failed_with_message() {
        let (state, _) = start(NotifyMode::OneShot, Reachable);
        let (state, actions) = state.on_event(error("permission denied"));

        assert_eq!(state, QueryState::Resolved);
        assert_eq!(
            resolutions(&actions),
            vec![Resolution::Failed("permission denied".into())]
        );
    }

    #[test]
    fn timeout_resolves_no_connection() {
        let (state, _) = start(NotifyMode::OneShot, Reachable);
        let (state, actions) = state.on_event(Event::TimedOut);

        assert_eq!(state, QueryState::Resolved);
        assert_eq!(
            actions,
            vec![Action::Teardown, Action::Resolve(Resolution::NoConnection)]
        );
    }

    #[test]
    fn reachability_loss_resolves_no_connection() {
        let (state, _) = start(NotifyMode::OneShot, Reachable);
        let (state, actions) = state.on_event(lost());

        assert_eq!(state, QueryState::Resolved);
        assert_eq!(resolutions(&actions), vec![Resolution::NoConnection]);
    }

    #[test]
    fn unknown_reachability_does_not_resolve() {
        let (state, _) = start(NotifyMode::OneShot, Reachable);
        let (state, actions) = state.on_event(Event::ReachabilityChanged { status: Unknown });

        assert!(state.is_resolving());
        assert!(actions.is_empty());
    }

    #[test]
    fn transient_subscription_states_are_ignored() {
        let (mut state, _) = start(NotifyMode::OneShot, Reachable);
        for transient in [
            SubscriptionState::Creating,
            SubscriptionState::Pending,
            SubscriptionState::Invalidated,
        ] {
            let (next, actions) = state.on_event(Event::SubscriptionChanged {
                state: transient,
                reachability: Reachable,
            });
            assert!(next.is_resolving());
            assert!(actions.is_empty());
            state = next;
        }
    }

    #[test]
    fn signals_after_resolution_are_ignored() {
        let (state, _) = start(NotifyMode::OneShot, Reachable);
        let (state, _) = state.on_event(error("first"));

        for event in [complete(Reachable), lost(), Event::TimedOut, error("second")] {
            let (next, actions) = state.clone().on_event(event);
            assert_eq!(next, QueryState::Resolved);
            assert!(actions.is_empty());
        }
    }

    #[test]
    fn one_shot_resolves_once_under_every_interleaving() {
        // Every ordering of the four racing terminal signals.
        let signals = [complete(Reachable), error("boom"), Event::TimedOut, lost()];
        let mut orders = Vec::new();
        permutations(&mut (0..signals.len()).collect::<Vec<_>>(), 0, &mut orders);
        assert_eq!(orders.len(), 24);

        for order in orders {
            let (mut state, _) = start(NotifyMode::OneShot, Reachable);
            let mut resolved = 0;
            for &i in &order {
                let (next, actions) = state.on_event(signals[i].clone());
                resolved += resolutions(&actions).len();
                state = next;
            }
            assert_eq!(resolved, 1, "order {:?} resolved {} times", order, resolved);
        }
    }

    fn permutations(items: &mut Vec<usize>, k: usize, out: &mut Vec<Vec<usize>>) {
        if k == items.len() {
            out.push(items.clone());
            return;
        }
        for i in k..items.len() {
            items.swap(k, i);
            permutations(items, k + 1, out);
            items.swap(k, i);
        }
    }

    #[test]
    fn cancel_while_resolving_tears_down_without_resolving() {
        let (state, _) = start(NotifyMode::OneShot, Reachable);
        let (state, actions) = state.on_event(Event::Cancelled);

        assert_eq!(state, QueryState::Cancelled);
        assert_eq!(actions, vec![Action::Teardown]);

        let (state, actions) = state.on_event(complete(Reachable));
        assert_eq!(state, QueryState::Cancelled);
        assert!(actions.is_empty());
    }

    #[test]
    fn cancel_from_idle_is_noop() {
        let (state, actions) = QueryState::new().on_event(Event::Cancelled);
        assert_eq!(state, QueryState::Cancelled);
        assert!(actions.is_empty());
    }

    #[test]
    fn cancel_twice_is_noop() {
        let (state, _) = start(NotifyMode::OneShot, Reachable);
        let (state, _) = state.on_event(Event::Cancelled);
        let (state, actions) = state.on_event(Event::Cancelled);
        assert_eq!(state, QueryState::Cancelled);
        assert!(actions.is_empty());
    }

    // ===========================================
    // Indefinite
    // ===========================================

    #[test]
    fn indefinite_reports_no_connection_on_start_when_not_reachable() {
        let (state, actions) = start(NotifyMode::Indefinite, NotReachable);

        assert!(state.is_resolving());
        assert_eq!(actions, vec![Action::Resolve(Resolution::NoConnection)]);
    }

    #[test]
    fn indefinite_never_arms_timeout() {
        let (_, actions) = start(NotifyMode::Indefinite, Reachable);
        assert!(actions.is_empty());
    }

    #[test]
    fn indefinite_reports_every_qualifying_signal() {
        let (state, _) = start(NotifyMode::Indefinite, Reachable);

        let (state, a1) = state.on_event(complete(Reachable));
        let (state, a2) = state.on_event(lost());
        let (state, a3) = state.on_event(complete(NotReachable));
        let (state, a4) = state.on_event(error("gone"));

        assert!(state.is_resolving());
        assert!(!a1.contains(&Action::Teardown));
        assert_eq!(resolutions(&a1), vec![Resolution::Synced]);
        assert_eq!(resolutions(&a2), vec![Resolution::NoConnection]);
        assert_eq!(resolutions(&a3), vec![Resolution::NoConnection]);
        assert_eq!(resolutions(&a4), vec![Resolution::Failed("gone".into())]);
    }

    #[test]
    fn indefinite_ignores_unknown_and_timer() {
        let (state, _) = start(NotifyMode::Indefinite, Reachable);
        let (state, actions) = state.on_event(Event::ReachabilityChanged { status: Unknown });
        assert!(actions.is_empty());
        let (state, actions) = state.on_event(Event::TimedOut);
        assert!(actions.is_empty());
        assert!(state.is_resolving());
    }

    #[test]
    fn indefinite_stops_after_cancel() {
        let (state, _) = start(NotifyMode::Indefinite, Reachable);
        let (state, actions) = state.on_event(Event::Cancelled);
        assert_eq!(actions, vec![Action::Teardown]);
        assert!(state.is_finished());

        let (_, actions) = state.on_event(lost());
        assert!(actions.is_empty());
    }

    #[test]
    fn events_before_start_are_ignored() {
        let (state, actions) = QueryState::new().on_event(complete(Reachable));
        assert_eq!(state, QueryState::Idle);
        assert!(actions.is_empty());
    }
}
