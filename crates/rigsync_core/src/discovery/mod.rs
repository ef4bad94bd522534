//! Device discovery with quorum semantics.
//!
//! Two modes: an unconstrained scan returns whatever matches the product
//! prefix in one bounded pass; a required-names scan repeats passes up to
//! a budget, accumulating sightings, and stops early the moment every
//! required name has been seen. Names still missing when the budget runs
//! out are surfaced to the caller, never silently dropped and never
//! decided here.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::DiscoverySettings;
use crate::models::Device;
use crate::transport::{Transport, TransportError};

/// Errors fatal to discovery (and therefore to the whole run).
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The wireless medium is unusable: missing hardware or permissions.
    #[error("wireless transport unavailable: {0}")]
    TransportUnavailable(String),
}

/// Result type for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// What a discovery run found.
#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    /// Devices found (restricted to the required set when one was given).
    pub devices: Vec<Device>,
    /// Required names never seen. Empty for unconstrained scans.
    pub missing: BTreeSet<String>,
    /// Scan passes spent.
    pub attempts: u32,
}

impl DiscoveryOutcome {
    /// Whether every required device was found.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Scans the medium for controllable devices.
pub struct DiscoveryService<T: Transport> {
    transport: Arc<T>,
    scan_timeout: Duration,
    product_prefix: String,
    retry_pause: Duration,
}

impl<T: Transport> DiscoveryService<T> {
    /// Create a service with default scan parameters.
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            scan_timeout: Duration::from_secs(5),
            product_prefix: "GoPro".to_string(),
            retry_pause: Duration::from_secs(1),
        }
    }

    /// Create a service from configuration.
    pub fn from_settings(transport: Arc<T>, settings: &DiscoverySettings) -> Self {
        Self {
            transport,
            scan_timeout: Duration::from_secs(settings.scan_timeout_secs),
            product_prefix: settings.product_prefix.clone(),
            retry_pause: Duration::from_secs(settings.retry_pause_secs),
        }
    }

    /// One scan pass, filtered to the product-name prefix.
    ///
    /// A pass that finds nothing is an empty result, not an error; only a
    /// broken medium fails.
    pub async fn scan_once(&self) -> DiscoveryResult<Vec<Device>> {
        let advertisements = match self.transport.scan(self.scan_timeout).await {
            Ok(ads) => ads,
            Err(TransportError::Unavailable(reason)) => {
                return Err(DiscoveryError::TransportUnavailable(reason));
            }
            Err(other) => {
                tracing::warn!(error = %other, "scan pass failed, treating as empty");
                Vec::new()
            }
        };

        let devices: Vec<Device> = advertisements
            .into_iter()
            .filter(|ad| ad.name.starts_with(&self.product_prefix))
            .map(|ad| Device::new(ad.name, ad.address))
            .collect();
        tracing::debug!(count = devices.len(), "scan pass complete");
        Ok(devices)
    }

    /// Discover devices, optionally insisting on a required name set.
    ///
    /// With an empty `required`, performs exactly one pass and returns
    /// every prefix-matched device. Otherwise repeats passes up to
    /// `max_attempts`, accumulating sightings across passes, and returns
    /// early once the found names cover `required`. Unresolved names are
    /// reported in the outcome's `missing` set for the caller to
    /// arbitrate.
    pub async fn discover(
        &self,
        required: &BTreeSet<String>,
        max_attempts: u32,
    ) -> DiscoveryResult<DiscoveryOutcome> {
        if required.is_empty() {
            let devices = self.scan_once().await?;
            tracing::info!(count = devices.len(), "discovered devices");
            return Ok(DiscoveryOutcome {
                devices,
                missing: BTreeSet::new(),
                attempts: 1,
            });
        }

        let mut found: BTreeMap<String, Device> = BTreeMap::new();
        let mut attempts = 0;

        while attempts < max_attempts {
            attempts += 1;
            tracing::info!(attempt = attempts, "discovery attempt");

            for device in self.scan_once().await? {
                if required.contains(&device.name) {
                    found.entry(device.name.clone()).or_insert(device);
                }
            }

            let missing = Self::missing_from(required, &found);
            if missing.is_empty() {
                tracing::info!("all required devices found");
                break;
            }
            tracing::warn!(?missing, attempt = attempts, "missing devices after attempt");

            if attempts < max_attempts {
                tokio::time::sleep(self.retry_pause).await;
            }
        }

        let missing = Self::missing_from(required, &found);
        Ok(DiscoveryOutcome {
            devices: found.into_values().collect(),
            missing,
            attempts,
        })
    }

    fn missing_from(required: &BTreeSet<String>, found: &BTreeMap<String, Device>) -> BTreeSet<String> {
        required
            .iter()
            .filter(|name| !found.contains_key(*name))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use crate::transport::Advertisement;
    use crate::models::DeviceAddress;

    fn service(transport: &MockTransport) -> DiscoveryService<MockTransport> {
        let mut service = DiscoveryService::new(Arc::new(transport.clone()));
        service.retry_pause = Duration::from_millis(1);
        service
    }

    fn names(required: &[&str]) -> BTreeSet<String> {
        required.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn unconstrained_scan_filters_by_prefix() {
        let transport = MockTransport::new();
        transport.add_camera("GoPro 1111", DeviceAddress::new("a1"));
        transport.add_camera("GoPro 2222", DeviceAddress::new("a2"));
        transport.add_camera("SomeHeadset", DeviceAddress::new("a3"));

        let outcome = service(&transport).discover(&BTreeSet::new(), 5).await.unwrap();
        assert_eq!(outcome.devices.len(), 2);
        assert!(outcome.is_complete());
        assert_eq!(outcome.attempts, 1);
        assert_eq!(transport.scan_count(), 1);
    }

    #[tokio::test]
    async fn required_scan_returns_early_when_quorum_met() {
        let transport = MockTransport::new();
        // First pass sees only one camera, second pass both.
        transport.push_scan_result(vec![Advertisement::new("GoPro 1111", "a1")]);
        transport.push_scan_result(vec![
            Advertisement::new("GoPro 1111", "a1"),
            Advertisement::new("GoPro 2222", "a2"),
        ]);

        let required = names(&["GoPro 1111", "GoPro 2222"]);
        let outcome = service(&transport).discover(&required, 5).await.unwrap();

        assert!(outcome.is_complete());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.devices.len(), 2);
    }

    #[tokio::test]
    async fn sightings_accumulate_across_passes() {
        let transport = MockTransport::new();
        // Each camera visible on a different pass; together they cover
        // the required set.
        transport.push_scan_result(vec![Advertisement::new("GoPro 1111", "a1")]);
        transport.push_scan_result(vec![Advertisement::new("GoPro 2222", "a2")]);

        let required = names(&["GoPro 1111", "GoPro 2222"]);
        let outcome = service(&transport).discover(&required, 5).await.unwrap();
        assert!(outcome.is_complete());
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test]
    async fn missing_devices_surface_after_budget() {
        let transport = MockTransport::new();
        transport.add_camera("GoPro 1111", DeviceAddress::new("a1"));

        let required = names(&["GoPro 1111", "GoPro 9999"]);
        let outcome = service(&transport).discover(&required, 3).await.unwrap();

        assert!(!outcome.is_complete());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.missing, names(&["GoPro 9999"]));
        assert_eq!(outcome.devices.len(), 1);
    }

    #[tokio::test]
    async fn required_scan_excludes_unrelated_devices() {
        let transport = MockTransport::new();
        transport.add_camera("GoPro 1111", DeviceAddress::new("a1"));
        transport.add_camera("GoPro 2222", DeviceAddress::new("a2"));

        let required = names(&["GoPro 1111"]);
        let outcome = service(&transport).discover(&required, 2).await.unwrap();
        assert_eq!(outcome.devices.len(), 1);
        assert_eq!(outcome.devices[0].name, "GoPro 1111");
    }

    #[tokio::test]
    async fn broken_medium_is_fatal() {
        let transport = MockTransport::new();
        transport.set_unavailable("adapter powered off");

        let result = service(&transport).discover(&BTreeSet::new(), 2).await;
        assert!(matches!(result, Err(DiscoveryError::TransportUnavailable(_))));
    }
}
