//! Session establishment, operator arbitration, and teardown.
//!
//! The session manager exclusively owns every session it creates for the
//! duration of a capture run. Connects are concurrent and isolated: one
//! camera refusing does not abort its siblings, it just yields a faulted
//! session that later dispatches report against. Teardown logs per-session
//! disconnect errors and never fails the run.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::future::join_all;
use thiserror::Error;

use crate::discovery::{DiscoveryError, DiscoveryOutcome, DiscoveryService};
use crate::models::{Device, DeviceRef, SessionState};
use crate::transport::{Capabilities, ControlChannel, Transport, TransportError};

/// Operator's answer when required devices are missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbitrationDecision {
    /// Continue with the devices that were found.
    Proceed,
    /// Run discovery again from scratch.
    Retry,
    /// Abandon the whole run.
    Abort,
}

/// Three-way operator arbitration, consulted only when required devices
/// are missing after the discovery budget. Presentation is the caller's
/// concern; the manager only blocks on the decision and honors it.
#[allow(async_fn_in_trait)]
pub trait Arbiter: Send + Sync {
    async fn decide(&self, missing: &BTreeSet<String>) -> ArbitrationDecision;
}

/// Errors terminating session establishment.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Discovery-level fatal error.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The operator chose to abandon the run.
    #[error("operator aborted: missing devices: {}", missing.join(", "))]
    OperatorAbort { missing: Vec<String> },

    /// The operator kept asking for retries past the retry budget.
    #[error("discovery retry budget exhausted; still missing: {}", missing.join(", "))]
    RetryBudgetExhausted { missing: Vec<String> },
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// An open control channel to one device.
///
/// Holds only a lightweight reference to the device's identity; the
/// channel itself is the owned resource. `channel` is `None` once the
/// session is faulted or closed.
pub struct Session<C: ControlChannel> {
    device: DeviceRef,
    state: SessionState,
    capabilities: Capabilities,
    channel: Option<C>,
    connect_error: Option<String>,
}

impl<C: ControlChannel> Session<C> {
    /// Identity of the device this session talks to.
    pub fn device(&self) -> &DeviceRef {
        &self.device
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Capabilities negotiated during connect.
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Whether commands can be dispatched on this session.
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready && self.channel.is_some()
    }

    /// The open channel, when ready.
    pub fn channel(&self) -> Option<&C> {
        self.channel.as_ref()
    }

    /// Why the connect failed, for faulted sessions.
    pub fn connect_error(&self) -> Option<&str> {
        self.connect_error.as_deref()
    }

    fn ready(device: DeviceRef, capabilities: Capabilities, channel: C) -> Self {
        Self {
            device,
            state: SessionState::Ready,
            capabilities,
            channel: Some(channel),
            connect_error: None,
        }
    }

    fn faulted(device: DeviceRef, error: impl Into<String>) -> Self {
        Self {
            device,
            state: SessionState::Faulted,
            capabilities: Capabilities::new(),
            channel: None,
            connect_error: Some(error.into()),
        }
    }
}

/// Owns the lifetime of all sessions in one capture run.
pub struct SessionManager<T: Transport> {
    transport: Arc<T>,
}

impl<T: Transport> SessionManager<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Resolve the device set for a run, arbitrating with the operator
    /// when required devices are missing.
    ///
    /// The operator may ask for discovery to be retried from scratch; the
    /// number of such retries is bounded by `max_attempts` as well, as an
    /// explicit loop rather than recursion, so the run always terminates.
    pub async fn resolve<A: Arbiter>(
        &self,
        discovery: &DiscoveryService<T>,
        required: &BTreeSet<String>,
        max_attempts: u32,
        arbiter: &A,
    ) -> SessionResult<DiscoveryOutcome> {
        let mut retries_left = max_attempts;

        loop {
            let outcome = discovery.discover(required, max_attempts).await?;
            if outcome.is_complete() {
                return Ok(outcome);
            }

            match arbiter.decide(&outcome.missing).await {
                ArbitrationDecision::Proceed => {
                    tracing::warn!(missing = ?outcome.missing, "proceeding with partial device set");
                    return Ok(outcome);
                }
                ArbitrationDecision::Abort => {
                    return Err(SessionError::OperatorAbort {
                        missing: outcome.missing.into_iter().collect(),
                    });
                }
                ArbitrationDecision::Retry => {
                    if retries_left == 0 {
                        return Err(SessionError::RetryBudgetExhausted {
                            missing: outcome.missing.into_iter().collect(),
                        });
                    }
                    retries_left -= 1;
                    tracing::info!(retries_left, "operator requested rediscovery");
                }
            }
        }
    }

    /// Connect to every device concurrently.
    ///
    /// Always returns one session per device; connect failures yield
    /// faulted sessions rather than aborting siblings.
    pub async fn establish(&self, devices: &[Device]) -> Vec<Session<T::Channel>> {
        join_all(devices.iter().map(|device| self.connect_one(device))).await
    }

    async fn connect_one(&self, device: &Device) -> Session<T::Channel> {
        let device_ref = DeviceRef::from(device);
        tracing::info!(device = %device_ref, "connecting");

        let mut channel = match self.transport.connect(&device.address).await {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!(device = %device_ref, error = %e, "connect failed");
                return Session::faulted(device_ref, e.to_string());
            }
        };

        match channel.pair().await {
            Ok(()) => {}
            Err(TransportError::PairingUnsupported(reason)) => {
                // Expected on some platforms; the channel still works.
                tracing::warn!(device = %device_ref, %reason, "pairing skipped");
            }
            Err(e) => {
                tracing::warn!(device = %device_ref, error = %e, "pairing failed");
                return Session::faulted(device_ref, e.to_string());
            }
        }

        let capabilities = channel.capabilities().clone();
        tracing::info!(device = %device_ref, "connected");
        Session::ready(device_ref, capabilities, channel)
    }

    /// Disconnect every session.
    ///
    /// A failing disconnect is logged and skipped; teardown never fails
    /// the run. Runs on every exit path of a capture run, including
    /// cancellation.
    pub async fn close(&self, sessions: &mut [Session<T::Channel>]) {
        for session in sessions.iter_mut() {
            if let Some(mut channel) = session.channel.take() {
                if let Err(e) = channel.disconnect().await {
                    tracing::warn!(device = %session.device, error = %e, "disconnect failed");
                }
            }
            session.state = SessionState::Closed;
        }
        tracing::info!("all sessions closed");
    }
}
