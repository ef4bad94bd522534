//! Camera-on-the-home-network transport.
//!
//! Cameras provisioned onto a private network expose an authenticated
//! HTTPS control surface. This transport enumerates the provisioned
//! fleet from an opaque credential store and maps request writes onto
//! fixed endpoints:
//!
//! - shutter: `GET /gopro/camera/shutter/start` / `.../stop`
//! - settings: `GET /gopro/camera/setting?setting={id}&option={id}`
//!
//! Authentication is HTTP basic auth; each camera pins its own
//! certificate, loaded as an opaque PEM blob and trusted as a root.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::models::{Command, DeviceAddress, Opcode, SETTING_FRAME_RATE};

use super::{Advertisement, Capabilities, ControlChannel, Transport, TransportError, TransportResult};

/// File listing provisioned cameras, one JSON chunk per camera separated
/// by blank lines.
const CREDENTIALS_FILE: &str = "gopro_credentials.txt";

/// Frame-rate setting id on the HTTP surface.
///
/// The wireless surface exposes frame rate as setting 3; the HTTP
/// surface exposes the same setting as 234.
const HTTP_SETTING_FRAME_RATE: u32 = 234;

/// Per-request timeout on the control surface.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Credentials for one provisioned camera. The store format is
/// collaborator-owned; only these four fields are read.
#[derive(Debug, Clone, Deserialize)]
pub struct CohnCredentials {
    pub identifier: String,
    pub ip_address: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
struct CohnEntry {
    credentials: CohnCredentials,
    certificate: PathBuf,
}

/// Transport over the private-network control surface.
///
/// "Scanning" enumerates the credential store rather than a radio: a
/// provisioned camera is assumed reachable until a connect says
/// otherwise.
pub struct CohnTransport {
    entries: Vec<CohnEntry>,
}

impl CohnTransport {
    /// Load the provisioned fleet from a credentials directory.
    ///
    /// Expects `gopro_credentials.txt` plus one `GoPro_{id}_cohn.crt`
    /// per camera. A missing store means the transport is unusable.
    pub fn from_credentials_dir(dir: &Path) -> TransportResult<Self> {
        let store = dir.join(CREDENTIALS_FILE);
        let content = fs::read_to_string(&store).map_err(|e| {
            TransportError::Unavailable(format!("cannot read {}: {}", store.display(), e))
        })?;

        let mut entries = Vec::new();
        for chunk in content.split("\n\n") {
            let chunk = chunk.trim();
            if chunk.is_empty() {
                continue;
            }
            let credentials: CohnCredentials = match serde_json::from_str(chunk) {
                Ok(creds) => creds,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping invalid credential block");
                    continue;
                }
            };
            let certificate = dir.join(format!("GoPro_{}_cohn.crt", credentials.identifier));
            entries.push(CohnEntry {
                credentials,
                certificate,
            });
        }

        if entries.is_empty() {
            return Err(TransportError::Unavailable(format!(
                "no usable credentials in {}",
                store.display()
            )));
        }
        Ok(Self { entries })
    }

    /// Advertised name for a provisioned camera.
    fn device_name(identifier: &str) -> String {
        format!("GoPro {}", identifier)
    }
}

impl Transport for CohnTransport {
    type Channel = CohnChannel;

    async fn scan(&self, _timeout: Duration) -> TransportResult<Vec<Advertisement>> {
        Ok(self
            .entries
            .iter()
            .map(|entry| {
                Advertisement::new(
                    Self::device_name(&entry.credentials.identifier),
                    DeviceAddress::new(entry.credentials.ip_address.clone()),
                )
            })
            .collect())
    }

    async fn connect(&self, address: &DeviceAddress) -> TransportResult<Self::Channel> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.credentials.ip_address == address.as_str())
            .ok_or_else(|| TransportError::connect_failed(address, "unknown camera address"))?;

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(REQUEST_TIMEOUT);

        match fs::read(&entry.certificate) {
            Ok(pem) => {
                let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                    TransportError::connect_failed(
                        address,
                        format!("bad certificate {}: {}", entry.certificate.display(), e),
                    )
                })?;
                builder = builder.add_root_certificate(cert);
            }
            Err(e) => {
                return Err(TransportError::connect_failed(
                    address,
                    format!("cannot read {}: {}", entry.certificate.display(), e),
                ));
            }
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::connect_failed(address, e.to_string()))?;

        let capabilities = Capabilities::new()
            .with("transport", "cohn")
            .with("identifier", entry.credentials.identifier.clone());

        Ok(CohnChannel {
            base_url: format!("https://{}", entry.credentials.ip_address),
            username: entry.credentials.username.clone(),
            password: entry.credentials.password.clone(),
            client,
            capabilities,
        })
    }
}

/// Open channel to one provisioned camera.
pub struct CohnChannel {
    base_url: String,
    username: String,
    password: String,
    client: reqwest::Client,
    capabilities: Capabilities,
}

impl CohnChannel {
    /// Map a request onto its control-surface path and query.
    ///
    /// Factored out of `write` so the mapping is testable without a
    /// camera on the network.
    fn request_path(opcode: Opcode, payload: &[u8]) -> TransportResult<String> {
        let command = Command::decode(opcode, payload)
            .ok_or_else(|| TransportError::Rejected("unrecognized request payload".to_string()))?;

        match command {
            Command::StartCapture => Ok("/gopro/camera/shutter/start".to_string()),
            Command::StopCapture => Ok("/gopro/camera/shutter/stop".to_string()),
            Command::ApplySetting { setting, option } => {
                let setting = if setting == SETTING_FRAME_RATE {
                    HTTP_SETTING_FRAME_RATE
                } else {
                    setting as u32
                };
                Ok(format!(
                    "/gopro/camera/setting?setting={}&option={}",
                    setting, option
                ))
            }
            Command::PowerOff => Err(TransportError::Unsupported(
                "power-off has no endpoint on the network surface".to_string(),
            )),
        }
    }
}

impl ControlChannel for CohnChannel {
    async fn pair(&mut self) -> TransportResult<()> {
        // Provisioning happened out of band; nothing to negotiate here.
        Ok(())
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn write(&self, opcode: Opcode, payload: &[u8]) -> TransportResult<()> {
        let path = Self::request_path(opcode, payload)?;
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "control request");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;

        response
            .error_for_status()
            .map_err(|e| TransportError::Rejected(e.to_string()))?;
        Ok(())
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        // Stateless surface; dropping the client is enough.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Resolution;

    #[test]
    fn shutter_requests_map_to_endpoints() {
        let (opcode, payload) = Command::StartCapture.encode();
        assert_eq!(
            CohnChannel::request_path(opcode, &payload).unwrap(),
            "/gopro/camera/shutter/start"
        );

        let (opcode, payload) = Command::StopCapture.encode();
        assert_eq!(
            CohnChannel::request_path(opcode, &payload).unwrap(),
            "/gopro/camera/shutter/stop"
        );
    }

    #[test]
    fn setting_request_translates_frame_rate_id() {
        let (opcode, payload) = Command::set_resolution(Resolution::R1080p).encode();
        assert_eq!(
            CohnChannel::request_path(opcode, &payload).unwrap(),
            "/gopro/camera/setting?setting=2&option=9"
        );

        let (opcode, payload) = Command::ApplySetting {
            setting: SETTING_FRAME_RATE,
            option: 1,
        }
        .encode();
        assert_eq!(
            CohnChannel::request_path(opcode, &payload).unwrap(),
            "/gopro/camera/setting?setting=234&option=1"
        );
    }

    #[test]
    fn power_off_is_unsupported() {
        let (opcode, payload) = Command::PowerOff.encode();
        assert!(matches!(
            CohnChannel::request_path(opcode, &payload),
            Err(TransportError::Unsupported(_))
        ));
    }

    #[test]
    fn credentials_dir_enumerates_cameras() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join(CREDENTIALS_FILE);
        fs::write(
            &store,
            concat!(
                "{\"identifier\":\"1234\",\"ip_address\":\"10.0.0.5\",",
                "\"username\":\"gopro\",\"password\":\"secret\"}\n",
                "\n",
                "not json at all\n",
                "\n",
                "{\"identifier\":\"5678\",\"ip_address\":\"10.0.0.6\",",
                "\"username\":\"gopro\",\"password\":\"secret2\"}\n",
            ),
        )
        .unwrap();

        let transport = CohnTransport::from_credentials_dir(dir.path()).unwrap();
        assert_eq!(transport.entries.len(), 2);
        assert_eq!(
            CohnTransport::device_name(&transport.entries[0].credentials.identifier),
            "GoPro 1234"
        );
    }

    #[test]
    fn missing_store_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let result = CohnTransport::from_credentials_dir(dir.path());
        assert!(matches!(result, Err(TransportError::Unavailable(_))));
    }
}
