//! BLE link to the ELM327 adapter
//!
//! Owns the btleplug peripheral: scans for the configured address, connects,
//! resolves the serial-style TX/RX characteristics, and forwards RX
//! notifications into a channel for the listener. Commands are written
//! without response; the adapter answers whenever it feels like it.

use async_trait::async_trait;
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use uuid::Uuid;

use crate::transport::{ObdTransport, TransportError};

/// Characteristic the adapter pushes notifications on
pub const UUID_RX: Uuid = Uuid::from_u128(0x0000fff1_0000_1000_8000_00805f9b34fb);
/// Characteristic commands are written to
pub const UUID_TX: Uuid = Uuid::from_u128(0x0000fff2_0000_1000_8000_00805f9b34fb);

/// How long to scan for the adapter before giving up
const SCAN_TIMEOUT: Duration = Duration::from_secs(10);
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Pause after each init command so the adapter can answer before the next
const INIT_COMMAND_DELAY: Duration = Duration::from_millis(100);

/// ELM327 setup: reset, echo off, linefeeds off, spaces off, protocol auto
const INIT_COMMANDS: [&[u8]; 5] = [b"ATZ\r", b"ATE0\r", b"ATL0\r", b"ATS0\r", b"ATSP0\r"];

/// Connected BLE transport to one ELM327 adapter
pub struct BleTransport {
    peripheral: Peripheral,
    tx_char: Characteristic,
}

impl BleTransport {
    /// Scan for the adapter at `address`, connect, subscribe to its RX
    /// characteristic, and run the init sequence.
    ///
    /// Returns the transport plus the channel on which raw notification
    /// payloads arrive. The channel closes when the notification stream
    /// ends, which is how the peer going away is observed.
    pub async fn connect(
        address: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Vec<u8>>), TransportError> {
        let manager = Manager::new().await?;
        let central = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(TransportError::NoAdapter)?;

        info!("Scanning for adapter {address}...");
        central.start_scan(ScanFilter::default()).await?;
        let find_result = find_peripheral(&central, address).await;
        let _ = central.stop_scan().await;
        let peripheral = find_result?;

        info!("Connecting to {address}...");
        peripheral.connect().await?;
        peripheral.discover_services().await?;

        let characteristics = peripheral.characteristics();
        let rx_char = characteristics
            .iter()
            .find(|c| c.uuid == UUID_RX)
            .cloned()
            .ok_or_else(|| TransportError::CharacteristicNotFound(UUID_RX.to_string()))?;
        let tx_char = characteristics
            .iter()
            .find(|c| c.uuid == UUID_TX)
            .cloned()
            .ok_or_else(|| TransportError::CharacteristicNotFound(UUID_TX.to_string()))?;

        peripheral.subscribe(&rx_char).await?;
        let mut notifications = peripheral.notifications().await?;

        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != UUID_RX {
                    continue;
                }
                if notify_tx.send(notification.value).is_err() {
                    // Listener gone, nothing left to deliver to
                    break;
                }
            }
            debug!("Notification stream ended");
        });

        let transport = Self {
            peripheral,
            tx_char,
        };
        transport.initialize().await;

        info!("Connected to adapter {address}");
        Ok((transport, notify_rx))
    }

    /// Send the ELM327 init sequence. Replies show up as notifications and
    /// are discarded downstream as unrecognized payloads, so failures here
    /// are only logged.
    async fn initialize(&self) {
        for command in INIT_COMMANDS {
            debug!(
                "Sending init command: {:?}",
                String::from_utf8_lossy(command)
            );
            if let Err(e) = self.send_command(command).await {
                warn!("Init command failed: {e}");
            }
            sleep(INIT_COMMAND_DELAY).await;
        }
    }

    /// Tear the connection down. Errors are irrelevant at this point.
    pub async fn disconnect(&self) {
        if let Err(e) = self.peripheral.disconnect().await {
            debug!("Disconnect error (ignored): {e}");
        }
    }
}

#[async_trait]
impl ObdTransport for BleTransport {
    async fn send_command(&self, command: &[u8]) -> Result<(), TransportError> {
        if !self.peripheral.is_connected().await? {
            return Err(TransportError::Disconnected);
        }
        self.peripheral
            .write(&self.tx_char, command, WriteType::WithoutResponse)
            .await?;
        Ok(())
    }
}

/// Poll the scan results until the target address shows up or the scan
/// window closes
async fn find_peripheral(central: &Adapter, address: &str) -> Result<Peripheral, TransportError> {
    let deadline = Instant::now() + SCAN_TIMEOUT;
    loop {
        for peripheral in central.peripherals().await? {
            if peripheral
                .address()
                .to_string()
                .eq_ignore_ascii_case(address)
            {
                return Ok(peripheral);
            }
        }
        if Instant::now() >= deadline {
            return Err(TransportError::DeviceNotFound(address.to_string()));
        }
        sleep(SCAN_POLL_INTERVAL).await;
    }
}
