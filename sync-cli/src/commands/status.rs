//! Follow the aggregated sync status.
//!
//! Reachability comes from the configured polling probe; the session is
//! simulated and walks from disconnected to fully transferred.

use anyhow::{Context, Result};
use std::time::Duration;
use subsync_client::{
    Config, MockSession, PollingProbe, ReachabilityMonitor, SyncManager, SyncSnapshot,
};
use subsync_types::{
    SessionActivityState, SessionConnectionState, TransferDirection, TransferProgress,
};
use tokio::sync::broadcast::error::RecvError;

/// Delay between simulated session steps.
const SESSION_STEP: Duration = Duration::from_millis(500);

/// Run the status command.
pub async fn run(config: &Config, duration: Duration, json: bool) -> Result<()> {
    let reachability = ReachabilityMonitor::new(PollingProbe::from_config(&config.reachability));
    reachability.start();

    let mut manager = SyncManager::new(reachability, &config.status);
    let mut events = manager.subscribe();
    let session = MockSession::new();
    manager.start(session.clone());
    let script = tokio::spawn(simulate_session(session));

    if !json {
        println!("=== subsync status ===");
        println!();
    }

    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;

            event = events.recv() => match event {
                Ok(snapshot) => print_snapshot(&snapshot, json)?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Skipped {} status updates", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut deadline => break,
        }
    }

    script.abort();
    manager.shutdown();

    if !json {
        println!();
        println!("Final: {}", describe(&manager.snapshot()));
    }

    Ok(())
}

fn print_snapshot(snapshot: &SyncSnapshot, json: bool) -> Result<()> {
    if json {
        let line = serde_json::to_string(snapshot).context("Failed to encode snapshot")?;
        println!("{}", line);
    } else {
        println!("{}", describe(snapshot));
    }
    Ok(())
}

/// One-line rendering of a snapshot.
pub fn describe(snapshot: &SyncSnapshot) -> String {
    let s = &snapshot.signals;
    format!(
        "status: {} (reachable={} connected={} active={} upload={} download={})",
        snapshot.status,
        yes_no(s.reachable),
        yes_no(s.session_connected),
        yes_no(s.session_active),
        done(s.upload_complete),
        done(s.download_complete),
    )
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn done(value: bool) -> &'static str {
    if value {
        "done"
    } else {
        "pending"
    }
}

/// Walk the session from disconnected to fully transferred.
async fn simulate_session(session: MockSession) {
    tokio::time::sleep(SESSION_STEP).await;
    session.set_connection(SessionConnectionState::Connected);
    tokio::time::sleep(SESSION_STEP).await;
    session.set_activity(SessionActivityState::Active);
    tokio::time::sleep(SESSION_STEP).await;
    session.report_progress(TransferProgress::complete(TransferDirection::Upload));
    tokio::time::sleep(SESSION_STEP).await;
    session.report_progress(TransferProgress::complete(TransferDirection::Download));
}
