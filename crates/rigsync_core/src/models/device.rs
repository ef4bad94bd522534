//! Device-related data structures (discovered endpoints, session state).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transport-level identifier for a device.
///
/// Stable for the lifetime of one connection; the underlying transport
/// decides what it means (a BLE address, an IP address, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    /// Create a new address.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Get the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceAddress {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// A discoverable wireless endpoint.
///
/// Ephemeral: re-created on every scan pass. Identity lives in `name`
/// and `address`; everything else is advisory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Advertised device name (e.g., "GoPro 1234").
    pub name: String,
    /// Transport-level address.
    pub address: DeviceAddress,
    /// When this device was last seen by a scan.
    pub discovered_at: DateTime<Utc>,
}

impl Device {
    /// Create a new device stamped with the current time.
    pub fn new(name: impl Into<String>, address: DeviceAddress) -> Self {
        Self {
            name: name.into(),
            address,
            discovered_at: Utc::now(),
        }
    }

    /// Extract the short identifier from the advertised name.
    ///
    /// Camera names end in a short numeric token ("GoPro 1234" -> "1234").
    /// Returns `None` when the last whitespace-separated token carries no
    /// digit.
    pub fn short_id(&self) -> Option<&str> {
        let token = self.name.split_whitespace().last()?;
        if token.chars().any(|c| c.is_ascii_digit()) {
            Some(token)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// Lightweight copy of a device's identity.
///
/// Sessions and command results carry this instead of the full `Device`;
/// it is used for logging and lookup only and owns nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRef {
    pub name: String,
    pub address: DeviceAddress,
}

impl From<&Device> for DeviceRef {
    fn from(device: &Device) -> Self {
        Self {
            name: device.name.clone(),
            address: device.address.clone(),
        }
    }
}

impl std::fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// How a caller refers to a device: by resolved handle or by raw name.
///
/// Resolved once at the API boundary; internal code only ever sees
/// `Device` values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    /// A device already resolved by a scan.
    ByHandle(Device),
    /// A device known only by its advertised name.
    ByName(String),
}

impl DeviceSelector {
    /// The advertised name this selector refers to.
    pub fn name(&self) -> &str {
        match self {
            DeviceSelector::ByHandle(device) => &device.name,
            DeviceSelector::ByName(name) => name,
        }
    }

    /// Resolve against a set of discovered devices.
    ///
    /// `ByHandle` resolves to itself; `ByName` matches on the advertised
    /// name.
    pub fn resolve<'a>(&'a self, discovered: &'a [Device]) -> Option<&'a Device> {
        match self {
            DeviceSelector::ByHandle(device) => Some(device),
            DeviceSelector::ByName(name) => discovered.iter().find(|d| &d.name == name),
        }
    }
}

/// Lifecycle state of a control session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Connecting,
    Ready,
    Faulted,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Faulted => write!(f, "faulted"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}
