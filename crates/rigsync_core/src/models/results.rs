//! End-of-run reporting types.
//!
//! A capture run finishes with a `RunSummary` enumerating every device it
//! touched and how each start/stop dispatch went, so nothing fails
//! silently. The summary is a plain value: serializable next to the run
//! log and renderable as text for the console.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::command::CommandResult;

/// One dispatch outcome, re-expressed against the run epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Whether the device acknowledged the command.
    pub acknowledged: bool,
    /// Milliseconds into the run at which the ack was captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_ms_into_run: Option<u64>,
    /// Failure reason, when not acknowledged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchReport {
    /// Convert a raw result, translating its monotonic stamp to an offset
    /// from the run epoch.
    pub fn from_result(result: &CommandResult, epoch: Instant) -> Self {
        Self {
            acknowledged: result.acknowledged,
            at_ms_into_run: result
                .issued_at
                .map(|at| at.saturating_duration_since(epoch).as_millis() as u64),
            error: result.error.clone(),
        }
    }
}

/// Per-device section of the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRunReport {
    /// Advertised device name.
    pub name: String,
    /// Transport address the session used.
    pub address: String,
    /// Whether a control session reached the ready state.
    pub connected: bool,
    /// Connect failure reason, when not connected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_error: Option<String>,
    /// Start-capture dispatch outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DispatchReport>,
    /// Stop-capture dispatch outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<DispatchReport>,
}

impl DeviceRunReport {
    /// Whether everything attempted on this device succeeded.
    pub fn succeeded(&self) -> bool {
        self.connected
            && self.start.as_ref().is_none_or(|r| r.acknowledged)
            && self.stop.as_ref().is_none_or(|r| r.acknowledged)
    }

    /// First failure reason on this device, if any.
    pub fn failure_reason(&self) -> Option<&str> {
        if let Some(reason) = self.connect_error.as_deref() {
            return Some(reason);
        }
        for report in [self.start.as_ref(), self.stop.as_ref()].into_iter().flatten() {
            if let Some(reason) = report.error.as_deref() {
                return Some(reason);
            }
        }
        None
    }
}

/// Summary of one capture run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Wall-clock start of the run.
    pub started_at: DateTime<Utc>,
    /// Required device names that discovery never resolved.
    pub missing_after_discovery: Vec<String>,
    /// One report per device a session was attempted for.
    pub devices: Vec<DeviceRunReport>,
}

impl RunSummary {
    /// Whether every device succeeded end to end.
    pub fn all_succeeded(&self) -> bool {
        self.missing_after_discovery.is_empty() && self.devices.iter().all(|d| d.succeeded())
    }

    /// Names of devices with at least one failure.
    pub fn failed_devices(&self) -> Vec<&str> {
        self.devices
            .iter()
            .filter(|d| !d.succeeded())
            .map(|d| d.name.as_str())
            .collect()
    }

    /// Render a human-readable summary block.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Capture run started {}\n",
            self.started_at.format("%Y-%m-%d %H:%M:%S%.3f UTC")
        ));
        if !self.missing_after_discovery.is_empty() {
            out.push_str(&format!(
                "Never discovered: {}\n",
                self.missing_after_discovery.join(", ")
            ));
        }
        for device in &self.devices {
            if device.succeeded() {
                let start = device
                    .start
                    .as_ref()
                    .and_then(|r| r.at_ms_into_run)
                    .map(|ms| format!("start +{}ms", ms))
                    .unwrap_or_else(|| "no start".to_string());
                let stop = device
                    .stop
                    .as_ref()
                    .and_then(|r| r.at_ms_into_run)
                    .map(|ms| format!("stop +{}ms", ms))
                    .unwrap_or_else(|| "no stop".to_string());
                out.push_str(&format!("  OK     {} ({}, {})\n", device.name, start, stop));
            } else {
                out.push_str(&format!(
                    "  FAILED {} ({})\n",
                    device.name,
                    device.failure_reason().unwrap_or("unknown reason")
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceAddress, DeviceRef};
    use std::time::Duration;

    fn device_ref(name: &str) -> DeviceRef {
        DeviceRef {
            name: name.to_string(),
            address: DeviceAddress::new("addr"),
        }
    }

    #[test]
    fn dispatch_report_offsets_from_epoch() {
        let epoch = Instant::now();
        let at = epoch + Duration::from_millis(250);
        let result = CommandResult::acknowledged(device_ref("GoPro 1234"), at);
        let report = DispatchReport::from_result(&result, epoch);
        assert!(report.acknowledged);
        assert_eq!(report.at_ms_into_run, Some(250));
    }

    #[test]
    fn failed_device_shows_in_summary() {
        let summary = RunSummary {
            started_at: Utc::now(),
            missing_after_discovery: Vec::new(),
            devices: vec![
                DeviceRunReport {
                    name: "GoPro 1111".to_string(),
                    address: "a1".to_string(),
                    connected: true,
                    connect_error: None,
                    start: Some(DispatchReport {
                        acknowledged: true,
                        at_ms_into_run: Some(3),
                        error: None,
                    }),
                    stop: Some(DispatchReport {
                        acknowledged: true,
                        at_ms_into_run: Some(2003),
                        error: None,
                    }),
                },
                DeviceRunReport {
                    name: "GoPro 2222".to_string(),
                    address: "a2".to_string(),
                    connected: true,
                    connect_error: None,
                    start: Some(DispatchReport {
                        acknowledged: false,
                        at_ms_into_run: None,
                        error: Some("write failed".to_string()),
                    }),
                    stop: Some(DispatchReport {
                        acknowledged: true,
                        at_ms_into_run: Some(2004),
                        error: None,
                    }),
                },
            ],
        };

        assert!(!summary.all_succeeded());
        assert_eq!(summary.failed_devices(), vec!["GoPro 2222"]);
        let text = summary.render_text();
        assert!(text.contains("OK     GoPro 1111"));
        assert!(text.contains("FAILED GoPro 2222"));
        assert!(text.contains("write failed"));
    }
}
