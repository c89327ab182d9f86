//! Simulated search-as-you-type.
//!
//! Each term is issued through one [`DisposableSyncQuery`] slot against an
//! in-memory user directory, with a background task standing in for the
//! sync server. Superseded terms never report; the last term always does.

use anyhow::{ensure, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use subsync_client::{
    purge_disposable_subscriptions, Config, DisposableSyncQuery, MockProbe, MockStore, QueryView,
    ReachabilityMonitor, Store,
};
use subsync_types::{NotifyMode, ReachabilityStatus, SubscriptionName, SyncQueryResult};
use tokio::sync::mpsc;

/// Sample user directory searched by the command.
const USERS: &[&str] = &[
    "alice", "alina", "alistair", "bob", "bonnie", "carol", "caroline", "dave", "eve", "mallory",
];

/// Search simulation knobs.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Simulate an unreachable network.
    pub offline: bool,
    /// Time the simulated server takes to complete a subscription.
    pub latency: Duration,
    /// Pause between terms.
    pub typing: Duration,
}

/// How one term resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Matching users.
    Synced(Vec<&'static str>),
    /// Offline or timed out.
    NoConnection,
    /// The subscription failed.
    Failed(String),
}

impl From<SyncQueryResult<QueryView<&'static str>>> for Outcome {
    fn from(result: SyncQueryResult<QueryView<&'static str>>) -> Self {
        match result {
            SyncQueryResult::Synced(view) => Self::Synced(view.items()),
            SyncQueryResult::NoConnection => Self::NoConnection,
            SyncQueryResult::Failed(e) => Self::Failed(e.message().to_string()),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synced(users) if users.is_empty() => write!(f, "synced, no matches"),
            Self::Synced(users) => write!(f, "synced ({}): {}", users.len(), users.join(", ")),
            Self::NoConnection => write!(f, "no connection"),
            Self::Failed(message) => write!(f, "failed: {}", message),
        }
    }
}

/// What a search run left behind.
#[derive(Debug)]
pub struct Report {
    /// Terms that reported, in resolution order.
    pub results: Vec<(String, Outcome)>,
    /// Subscriptions registered when the last term resolved.
    pub surviving: Vec<SubscriptionName>,
    /// Disposable subscriptions removed by the final purge.
    pub purged: usize,
}

/// Run the search command.
pub async fn run(config: &Config, terms: &[String], options: Options) -> Result<()> {
    let report = search(config, terms, options).await?;

    println!("=== subsync search ===");
    println!();
    println!("Results:");
    for (term, outcome) in &report.results {
        println!("  {:?} -> {}", term, outcome);
    }
    println!();
    println!("Subscriptions: {} registered", report.surviving.len());
    for name in &report.surviving {
        println!("  {}", name);
    }
    println!();
    println!("Purged {} disposable subscription(s)", report.purged);

    Ok(())
}

/// Issue every term through one disposable slot and collect the outcomes.
pub async fn search(config: &Config, terms: &[String], options: Options) -> Result<Report> {
    ensure!(!terms.is_empty(), "At least one search term is required");

    let store = Arc::new(MockStore::with_items(USERS.to_vec()));
    let reachability = ReachabilityMonitor::new(MockProbe::new(if options.offline {
        ReachabilityStatus::NotReachable
    } else {
        ReachabilityStatus::Reachable
    }));
    reachability.start();

    let mut slot = DisposableSyncQuery::new(Arc::clone(&store), reachability)
        .with_timeout(config.query.timeout());
    let (tx, mut rx) = mpsc::unbounded_channel();

    for (index, term) in terms.iter().enumerate() {
        let needle = term.to_lowercase();
        let query = slot.objects().filter(move |user| user.contains(needle.as_str()));

        let tx = tx.clone();
        let name = slot
            .sync_with(query, NotifyMode::OneShot, move |result| {
                let _ = tx.send((index, Outcome::from(result)));
            })
            .name()
            .clone();
        tracing::debug!("Term {:?} issued as {}", term, name);

        // Stand-in for the sync server
        let server = Arc::clone(&store);
        let latency = options.latency;
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            server.complete(&name);
        });

        if index + 1 < terms.len() {
            tokio::time::sleep(options.typing).await;
        }
    }
    drop(tx);

    let last = terms.len() - 1;
    let mut results = Vec::new();
    while let Some((index, outcome)) = rx.recv().await {
        results.push((terms[index].clone(), outcome));
        if index == last {
            break;
        }
    }

    let surviving = store.subscriptions();
    let purged = purge_disposable_subscriptions(store.as_ref());
    drop(slot);

    Ok(Report {
        results,
        surviving,
        purged,
    })
}
