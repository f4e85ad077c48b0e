use std::time::Duration;

/// Default port for the telemetry HTTP endpoint
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default pause between successive PID commands.
///
/// This is a protocol-timing constraint, not a tuning knob: the adapter
/// needs turnaround time to answer one request before the next write, and
/// BLE characteristic writes are rate-limited in practice.
pub const DEFAULT_DWELL: Duration = Duration::from_secs(2);

/// Resolved runtime settings for the bridge
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// BLE address of the ELM327 adapter (e.g. "AA:BB:CC:DD:EE:FF")
    pub adapter_address: String,
    /// Dwell interval between commands in the polling cycle
    pub dwell: Duration,
}

impl BridgeConfig {
    pub fn new(adapter_address: impl Into<String>) -> Self {
        Self {
            adapter_address: adapter_address.into(),
            dwell: DEFAULT_DWELL,
        }
    }
}
