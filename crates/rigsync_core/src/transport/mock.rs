//! Hardware-less transport for tests and dry runs.
//!
//! Simulates a fleet of cameras with scriptable behavior: per-pass scan
//! results, connect/write failures for chosen addresses, and optional
//! acknowledgment latency. Every write is recorded with a monotonic
//! timestamp so tests can assert on dispatch ordering per device.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::{DeviceAddress, Opcode};

use super::{Advertisement, Capabilities, ControlChannel, Transport, TransportError, TransportResult};

/// One recorded request write.
#[derive(Debug, Clone)]
pub struct WriteRecord {
    pub address: DeviceAddress,
    pub opcode: Opcode,
    pub payload: Vec<u8>,
    pub at: Instant,
}

#[derive(Default)]
struct MockState {
    /// Devices visible on every unscripted scan pass.
    visible: Mutex<Vec<Advertisement>>,
    /// Per-pass overrides consumed front to back.
    scan_script: Mutex<VecDeque<Vec<Advertisement>>>,
    /// Simulated medium failure.
    unavailable: Mutex<Option<String>>,
    /// Addresses whose connect fails.
    connect_failures: Mutex<BTreeSet<String>>,
    /// Addresses whose writes fail.
    write_failures: Mutex<BTreeSet<String>>,
    /// Whether pairing reports as unsupported.
    pairing_unsupported: Mutex<bool>,
    /// Artificial delay before each ack.
    ack_delay: Mutex<Option<Duration>>,
    /// Every write in arrival order.
    writes: Mutex<Vec<WriteRecord>>,
    /// Number of scan passes performed.
    scan_count: Mutex<u32>,
}

/// Scriptable in-memory transport.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fleet of `count` cameras named "GoPro 1001", "GoPro 1002", ...
    pub fn with_cameras(count: usize) -> Self {
        let transport = Self::new();
        for i in 0..count {
            transport.add_camera(
                format!("GoPro {}", 1001 + i),
                DeviceAddress::new(format!("mock-{}", 1001 + i)),
            );
        }
        transport
    }

    /// Make a camera visible on every unscripted scan pass.
    pub fn add_camera(&self, name: impl Into<String>, address: DeviceAddress) {
        self.state
            .visible
            .lock()
            .push(Advertisement::new(name, address));
    }

    /// Script the result of the next scan pass (consumed in order; once
    /// the script is exhausted, passes fall back to the visible set).
    pub fn push_scan_result(&self, devices: Vec<Advertisement>) {
        self.state.scan_script.lock().push_back(devices);
    }

    /// Simulate a broken medium from now on.
    pub fn set_unavailable(&self, reason: impl Into<String>) {
        *self.state.unavailable.lock() = Some(reason.into());
    }

    /// Make connects to an address fail.
    pub fn fail_connect(&self, address: &DeviceAddress) {
        self.state
            .connect_failures
            .lock()
            .insert(address.to_string());
    }

    /// Make writes on an address fail.
    pub fn fail_writes(&self, address: &DeviceAddress) {
        self.state
            .write_failures
            .lock()
            .insert(address.to_string());
    }

    /// Report pairing as unsupported (as some platforms do).
    pub fn set_pairing_unsupported(&self, unsupported: bool) {
        *self.state.pairing_unsupported.lock() = unsupported;
    }

    /// Delay each ack by `delay`.
    pub fn set_ack_delay(&self, delay: Duration) {
        *self.state.ack_delay.lock() = Some(delay);
    }

    /// All writes recorded so far.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.writes.lock().clone()
    }

    /// Writes recorded for one address, in order.
    pub fn writes_for(&self, address: &DeviceAddress) -> Vec<WriteRecord> {
        self.state
            .writes
            .lock()
            .iter()
            .filter(|w| &w.address == address)
            .cloned()
            .collect()
    }

    /// Number of scan passes performed.
    pub fn scan_count(&self) -> u32 {
        *self.state.scan_count.lock()
    }
}

impl Transport for MockTransport {
    type Channel = MockChannel;

    async fn scan(&self, _timeout: Duration) -> TransportResult<Vec<Advertisement>> {
        if let Some(reason) = self.state.unavailable.lock().clone() {
            return Err(TransportError::Unavailable(reason));
        }
        *self.state.scan_count.lock() += 1;

        if let Some(scripted) = self.state.scan_script.lock().pop_front() {
            return Ok(scripted);
        }
        Ok(self.state.visible.lock().clone())
    }

    async fn connect(&self, address: &DeviceAddress) -> TransportResult<Self::Channel> {
        if self
            .state
            .connect_failures
            .lock()
            .contains(address.as_str())
        {
            return Err(TransportError::connect_failed(address, "simulated refusal"));
        }

        Ok(MockChannel {
            address: address.clone(),
            state: Arc::clone(&self.state),
            capabilities: Capabilities::new()
                .with("transport", "mock")
                .with("model", "GP11"),
        })
    }
}

/// Channel to one simulated camera.
pub struct MockChannel {
    address: DeviceAddress,
    state: Arc<MockState>,
    capabilities: Capabilities,
}

impl ControlChannel for MockChannel {
    async fn pair(&mut self) -> TransportResult<()> {
        if *self.state.pairing_unsupported.lock() {
            Err(TransportError::PairingUnsupported(
                "platform does not expose pairing".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn write(&self, opcode: Opcode, payload: &[u8]) -> TransportResult<()> {
        let delay = *self.state.ack_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self
            .state
            .write_failures
            .lock()
            .contains(self.address.as_str())
        {
            return Err(TransportError::WriteFailed("simulated write error".to_string()));
        }

        self.state.writes.lock().push(WriteRecord {
            address: self.address.clone(),
            opcode,
            payload: payload.to_vec(),
            at: Instant::now(),
        });
        Ok(())
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        Ok(())
    }
}
