//! One-off reachability check.

use anyhow::Result;
use subsync_client::{Config, ReachabilityCheck, TcpCheck};
use subsync_types::ReachabilityStatus;

/// Run the probe command.
pub async fn run(config: &Config, address: Option<&str>) -> Result<()> {
    let (address, status) = check(config, address).await;
    println!("{}: {}", address, status);
    Ok(())
}

/// Probe `address`, or the configured probe address.
pub async fn check(config: &Config, address: Option<&str>) -> (String, ReachabilityStatus) {
    let address = address
        .unwrap_or(config.reachability.probe_address.as_str())
        .to_string();
    let check = TcpCheck::new(address.clone(), config.reachability.connect_timeout());
    (address, check.check().await)
}
