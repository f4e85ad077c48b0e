//! Shared latest-value telemetry snapshot
//!
//! This is the single synchronization point in the bridge: the notification
//! listener writes one channel at a time, HTTP handlers read whole
//! snapshots. A reader never sees a half-applied update, and concurrent
//! readers don't serialize against each other.

use obdash_elm327_lib::{Pid, Sample};
use serde::Serialize;
use std::sync::{Arc, RwLock};

/// Latest decoded value per channel. Zero until a sample arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Telemetry {
    /// Engine speed in RPM
    pub rpm: u32,
    /// Vehicle speed in km/h
    pub speed: u32,
    /// Coolant temperature in °C (can be negative)
    pub temperature: i32,
    /// Fuel level percentage (0-100)
    pub fuel: u32,
}

/// Concurrency-safe owner of the canonical telemetry snapshot
#[derive(Debug, Clone, Default)]
pub struct TelemetryStore {
    inner: Arc<RwLock<Telemetry>>,
}

impl TelemetryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite one channel with a freshly decoded sample
    pub fn apply(&self, sample: Sample) {
        let mut telemetry = self.inner.write().unwrap();
        match sample.pid {
            // Decode formulas keep these non-negative; clamp rather than
            // trust the adapter
            Pid::EngineSpeed => telemetry.rpm = sample.value.max(0) as u32,
            Pid::VehicleSpeed => telemetry.speed = sample.value.max(0) as u32,
            Pid::CoolantTemp => telemetry.temperature = sample.value,
            Pid::FuelLevel => telemetry.fuel = sample.value.clamp(0, 100) as u32,
        }
    }

    /// Consistent point-in-time copy of all channels
    #[must_use]
    pub fn snapshot(&self) -> Telemetry {
        *self.inner.read().unwrap()
    }
}
