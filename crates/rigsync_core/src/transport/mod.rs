//! Transport collaborator seam.
//!
//! The wireless medium and the camera's control surface are black boxes
//! behind two traits: [`Transport`] (scan the medium, open a channel) and
//! [`ControlChannel`] (pair, write requests, tear down). The core only
//! ever needs those operations; link-layer details stay on the other side
//! of the seam.
//!
//! Two implementations ship here: [`cohn::CohnTransport`] drives cameras
//! that are already provisioned onto a private network over their REST
//! surface, and [`mock::MockTransport`] simulates a fleet for tests and
//! hardware-less dry runs.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{DeviceAddress, Opcode};

pub mod cohn;
pub mod mock;

/// Errors surfaced by transports.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The medium itself is unusable (missing hardware, permissions).
    /// Fatal to the whole orchestration.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// Connecting to one device failed. Isolated to that device.
    #[error("connect to {address} failed: {message}")]
    ConnectFailed { address: String, message: String },

    /// Pairing is not implemented on this platform. Expected on some
    /// hosts; treated as a soft warning by the session layer.
    #[error("pairing not supported: {0}")]
    PairingUnsupported(String),

    /// A request write was not delivered or not acknowledged.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// The device answered with a failure status.
    #[error("command rejected: {0}")]
    Rejected(String),

    /// The operation has no equivalent on this transport.
    #[error("not supported by this transport: {0}")]
    Unsupported(String),
}

impl TransportError {
    /// Create a connect failure for an address.
    pub fn connect_failed(address: &DeviceAddress, message: impl Into<String>) -> Self {
        Self::ConnectFailed {
            address: address.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error dooms the whole orchestration rather than one
    /// device.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Unavailable(_))
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// One device seen during a scan pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Advertised device name.
    pub name: String,
    /// Transport-level address.
    pub address: DeviceAddress,
}

impl Advertisement {
    pub fn new(name: impl Into<String>, address: impl Into<DeviceAddress>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Opaque capability set negotiated while connecting.
///
/// Collaborator-defined string pairs; the core stores and logs them
/// without interpreting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities(BTreeMap<String, String>);

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a capability pair (builder form).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Scan the medium and open control channels.
#[allow(async_fn_in_trait)]
pub trait Transport: Send + Sync {
    /// The channel type this transport produces.
    type Channel: ControlChannel;

    /// One bounded scan pass.
    ///
    /// A pass that finds nothing within the timeout returns an empty
    /// list; only a broken medium is an error.
    async fn scan(&self, timeout: Duration) -> TransportResult<Vec<Advertisement>>;

    /// Open a control channel to a device.
    async fn connect(&self, address: &DeviceAddress) -> TransportResult<Self::Channel>;
}

/// An open control channel to one device.
#[allow(async_fn_in_trait)]
pub trait ControlChannel: Send + Sync {
    /// Run the pairing handshake.
    ///
    /// May return [`TransportError::PairingUnsupported`] on platforms
    /// where pairing happens out of band.
    async fn pair(&mut self) -> TransportResult<()>;

    /// Capabilities negotiated during connect.
    fn capabilities(&self) -> &Capabilities;

    /// Write one request and await the device's acknowledgment.
    ///
    /// Devices answer requests with response notifications; a transport
    /// resolves the write when the matching notification (or HTTP
    /// response) arrives, so notification delivery surfaces here as the
    /// ack.
    async fn write(&self, opcode: Opcode, payload: &[u8]) -> TransportResult<()>;

    /// Tear the channel down.
    async fn disconnect(&mut self) -> TransportResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_is_fatal_others_are_not() {
        assert!(TransportError::Unavailable("no adapter".to_string()).is_fatal());
        assert!(!TransportError::WriteFailed("timeout".to_string()).is_fatal());
        assert!(
            !TransportError::connect_failed(&DeviceAddress::new("a1"), "refused").is_fatal()
        );
    }

    #[test]
    fn capabilities_round_trip() {
        let caps = Capabilities::new()
            .with("transport", "mock")
            .with("model", "GP11");
        assert_eq!(caps.get("model"), Some("GP11"));
        assert_eq!(caps.get("missing"), None);
        assert_eq!(caps.iter().count(), 2);
    }
}
