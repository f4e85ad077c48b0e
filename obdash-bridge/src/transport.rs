//! Outbound command seam between the scheduler and the BLE link
//!
//! The scheduler only needs "send these bytes to the adapter"; notifications
//! come back through a channel handed out at connect time. Keeping this a
//! trait lets the polling loops run against an in-memory transport in tests.

use async_trait::async_trait;

/// Errors from the adapter link
#[derive(Debug, Clone)]
pub enum TransportError {
    /// No Bluetooth adapter available on this host
    NoAdapter,
    /// The target device never showed up during the scan window
    DeviceNotFound(String),
    /// A required GATT characteristic is missing on the device
    CharacteristicNotFound(String),
    /// The connection dropped underneath us
    Disconnected,
    /// Any other BLE stack error
    Ble(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAdapter => write!(f, "no Bluetooth adapter found"),
            Self::DeviceNotFound(addr) => write!(f, "device {addr} not found during scan"),
            Self::CharacteristicNotFound(uuid) => {
                write!(f, "characteristic {uuid} not found on device")
            }
            Self::Disconnected => write!(f, "connection to adapter lost"),
            Self::Ble(e) => write!(f, "BLE error: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<btleplug::Error> for TransportError {
    fn from(e: btleplug::Error) -> Self {
        match e {
            btleplug::Error::NotConnected => Self::Disconnected,
            other => Self::Ble(other.to_string()),
        }
    }
}

impl TransportError {
    /// Whether the session is over, as opposed to a single failed write
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

/// Fire-and-forget command path to the OBD2 adapter
#[async_trait]
pub trait ObdTransport: Send + Sync {
    /// Write one command to the adapter's TX characteristic. No response is
    /// awaited; replies arrive asynchronously as notifications.
    async fn send_command(&self, command: &[u8]) -> Result<(), TransportError>;
}
