//! The polling bridge: command scheduler plus notification listener
//!
//! Two independent loops share one connection session. The scheduler walks
//! the fixed PID cycle, firing one command per dwell interval and never
//! waiting for an answer. The listener folds whatever notifications arrive,
//! in arrival order, into the telemetry store. Responses are self-describing
//! via their tag, so no request/response correlation exists or is needed.

use log::{debug, info, warn};
use obdash_elm327_lib::{decode_response, Pid};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;

use crate::ble::BleTransport;
use crate::config::BridgeConfig;
use crate::store::TelemetryStore;
use crate::transport::{ObdTransport, TransportError};

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Why a connection session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Shutdown was signalled
    Shutdown,
    /// A send failed because the connection is gone
    Disconnected,
    /// The notification channel closed underneath the listener
    StreamClosed,
}

/// Run the bridge activity until shutdown.
///
/// The first connect is make-or-break: an unreachable adapter ends the
/// bridge while the HTTP side keeps serving default values. Once a session
/// has existed, disconnects re-enter the scan/connect cycle indefinitely,
/// and every new session restarts the command cycle from the first PID.
pub async fn run(
    config: BridgeConfig,
    store: TelemetryStore,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), TransportError> {
    let mut link = BleTransport::connect(&config.adapter_address).await?;

    loop {
        let (transport, notifications) = link;
        let end = run_session(&transport, notifications, &store, &config, &mut shutdown).await;
        transport.disconnect().await;

        match end {
            SessionEnd::Shutdown => {
                info!("Bridge shutting down");
                return Ok(());
            }
            SessionEnd::Disconnected => warn!("Adapter connection lost, reconnecting..."),
            SessionEnd::StreamClosed => warn!("Notification stream closed, reconnecting..."),
        }

        link = loop {
            tokio::select! {
                _ = sleep(RECONNECT_DELAY) => {}
                _ = shutdown.changed() => {
                    info!("Bridge shutting down");
                    return Ok(());
                }
            }
            match BleTransport::connect(&config.adapter_address).await {
                Ok(link) => break link,
                Err(e) => warn!("Reconnect failed: {e}"),
            }
        };
    }
}

/// Drive one connection session.
///
/// Runs the scheduler and listener concurrently until shutdown is
/// signalled, the notification channel closes, or a send fails with a
/// disconnect-class error. Transient send failures are logged and the
/// cycle moves on to the next command.
pub async fn run_session<T: ObdTransport>(
    transport: &T,
    mut notifications: mpsc::UnboundedReceiver<Vec<u8>>,
    store: &TelemetryStore,
    config: &BridgeConfig,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let listener = async {
        while let Some(buffer) = notifications.recv().await {
            match decode_response(&buffer) {
                Ok(sample) => {
                    debug!("{:?} = {}", sample.pid, sample.value);
                    store.apply(sample);
                }
                // Malformed or unrecognized payload; the next cycle
                // naturally supersedes it
                Err(e) => debug!(
                    "Dropping notification ({e}): {:?}",
                    String::from_utf8_lossy(&buffer)
                ),
            }
        }
    };

    let scheduler = async {
        loop {
            for pid in Pid::CYCLE {
                match transport.send_command(pid.request()).await {
                    Ok(()) => {}
                    Err(e) if e.is_disconnect() => {
                        warn!("Send failed, connection lost: {e}");
                        return SessionEnd::Disconnected;
                    }
                    Err(e) => warn!("Send failed for {pid:?}: {e}"),
                }
                sleep(config.dwell).await;
            }
        }
    };

    tokio::select! {
        _ = listener => SessionEnd::StreamClosed,
        end = scheduler => end,
        _ = shutdown.changed() => SessionEnd::Shutdown,
    }
}
