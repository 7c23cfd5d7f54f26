//! Fixed-interval connection-state poller.
//!
//! The core performs no scheduling of its own; this is the one external
//! trigger it ships, and hosts may replace it with their own timer. Groups
//! are never polled — their refresh stays an explicit action to bound API
//! call volume.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use crate::actions::refresh_connection;
use crate::instance::InstanceHandle;

/// Spawn a poller that refreshes the instance's connection snapshot every
/// `period` until the cancel handle fires. Refreshes coalesce with any
/// concurrent explicit refresh, so the poller never doubles a network call.
pub fn spawn_connection_poller(
    handle: Arc<InstanceHandle>,
    period: Duration,
    cancel_rx: oneshot::Receiver<()>,
) {
    tokio::spawn(async move {
        debug!(instance = %handle.id(), "connection poller started");

        let mut interval = tokio::time::interval(period);
        // The first tick fires immediately; that initial refresh is wanted.
        let mut cancel_rx = cancel_rx;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let refreshed = refresh_connection(&handle).await;
                    if let Some(error) = &refreshed.error {
                        debug!(
                            instance = %handle.id(),
                            error = %error,
                            "polled connection refresh failed"
                        );
                    }
                }
                _ = &mut cancel_rx => {
                    debug!(instance = %handle.id(), "connection poller cancelled");
                    break;
                }
            }
        }
    });
}
