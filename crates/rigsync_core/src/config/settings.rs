//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level
//! updates.

use serde::{Deserialize, Serialize};

use crate::logging::{LogConfig, LogLevel};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Device discovery settings.
    #[serde(default)]
    pub discovery: DiscoverySettings,

    /// Capture-run settings.
    #[serde(default)]
    pub capture: CaptureSettings,

    /// Offline synchronization settings.
    #[serde(default)]
    pub sync: SyncSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Path configuration for footage, credentials, output and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Folder holding collected footage.
    #[serde(default)]
    pub footage_folder: String,

    /// Credential store for network-provisioned cameras.
    #[serde(default = "default_credentials_folder")]
    pub credentials_folder: String,

    /// Folder alignment output is written into.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Folder for run log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_credentials_folder() -> String {
    "certifications".to_string()
}

fn default_output_folder() -> String {
    "Synchronisation".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            footage_folder: String::new(),
            credentials_folder: default_credentials_folder(),
            output_folder: default_output_folder(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// Device discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Product-name prefix matched on unconstrained scans.
    #[serde(default = "default_product_prefix")]
    pub product_prefix: String,

    /// Per-pass scan timeout in seconds.
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,

    /// Scan-pass budget for quorum discovery.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause between scan passes in seconds.
    #[serde(default = "default_retry_pause_secs")]
    pub retry_pause_secs: u64,
}

fn default_product_prefix() -> String {
    "GoPro".to_string()
}

fn default_scan_timeout_secs() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    2
}

fn default_retry_pause_secs() -> u64 {
    1
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            product_prefix: default_product_prefix(),
            scan_timeout_secs: default_scan_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_pause_secs: default_retry_pause_secs(),
        }
    }
}

/// Capture-run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Default fixed hold between start and stop, in seconds.
    #[serde(default = "default_hold_secs")]
    pub hold_secs: u64,
}

fn default_hold_secs() -> u64 {
    2
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            hold_secs: default_hold_secs(),
        }
    }
}

/// Offline synchronization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Maximum gap in seconds between filename timestamps of files in
    /// the same trial.
    #[serde(default = "default_trial_tolerance_secs")]
    pub trial_tolerance_secs: u64,
}

fn default_trial_tolerance_secs() -> u64 {
    5
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            trial_tolerance_secs: default_trial_tolerance_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Minimum level written to run logs.
    #[serde(default)]
    pub level: LogLevel,

    /// Show timestamps on run-log lines.
    #[serde(default = "default_true")]
    pub show_timestamps: bool,

    /// External-tool output lines retained for error diagnosis.
    #[serde(default = "default_error_tail")]
    pub error_tail: usize,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> usize {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            show_timestamps: default_true(),
            error_tail: default_error_tail(),
        }
    }
}

impl LoggingSettings {
    /// Convert to a run-logger configuration.
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            show_timestamps: self.show_timestamps,
            error_tail: self.error_tail,
        }
    }
}

/// A named settings section, for atomic section-level updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Paths,
    Discovery,
    Capture,
    Sync,
    Logging,
}

impl ConfigSection {
    /// TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Discovery => "discovery",
            ConfigSection::Capture => "capture",
            ConfigSection::Sync => "sync",
            ConfigSection::Logging => "logging",
        }
    }

    /// All known sections, in file order.
    pub fn all() -> [ConfigSection; 5] {
        [
            ConfigSection::Paths,
            ConfigSection::Discovery,
            ConfigSection::Capture,
            ConfigSection::Sync,
            ConfigSection::Logging,
        ]
    }
}
