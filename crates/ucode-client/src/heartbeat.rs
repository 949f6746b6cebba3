//! Keep-alive pings while the transport is open.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::encoder::encode_ping;
use crate::transport::Outbound;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The heartbeat was cancelled externally.
    Cancelled,
    /// The link's outgoing channel closed underneath the heartbeat.
    TransportClosed,
}

/// Emit `{"type":"ping"}` every `interval` until cancelled.
///
/// The first ping goes out one full interval after the call, not immediately.
pub async fn run_heartbeat(
    outgoing: mpsc::Sender<Outbound>,
    interval: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let ping = match encode_ping() {
        Ok(ping) => ping,
        Err(e) => {
            warn!(error = %e, "heartbeat disabled: ping frame not encodable");
            return HeartbeatResult::Cancelled;
        }
    };

    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval() fires immediately; skip that tick
    let _ = ticker.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => return HeartbeatResult::Cancelled,
            _ = ticker.tick() => {
                trace!("heartbeat ping");
                if outgoing.send(Outbound::Text(ping.clone())).await.is_err() {
                    return HeartbeatResult::TransportClosed;
                }
            }
        }
    }
}
