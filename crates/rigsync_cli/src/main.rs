//! RigSync command-line interface.
//!
//! Thin surface over `rigsync_core`: argument parsing, config loading,
//! transport selection, and console arbitration. No business logic.

mod arbiter;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Local;
use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use rigsync_core::capture::{CaptureOptions, CaptureRunner, HoldPolicy};
use rigsync_core::config::ConfigManager;
use rigsync_core::discovery::DiscoveryService;
use rigsync_core::logging::{init_tracing, LogConfig, RunLogger};
use rigsync_core::models::{Command, DeviceSelector, FrameRateOption, Resolution};
use rigsync_core::sync::SyncEngine;
use rigsync_core::transport::cohn::CohnTransport;
use rigsync_core::transport::mock::MockTransport;
use rigsync_core::transport::Transport;

use arbiter::ConsoleArbiter;

#[derive(Parser)]
#[command(name = "rigsync", version, about = "Multi-camera capture orchestration and timecode sync")]
struct Cli {
    /// Path to the config file (defaults to the user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use a simulated camera fleet instead of real hardware.
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List cameras visible on one scan pass.
    Scan,

    /// Run a synchronized capture across all cameras.
    Capture {
        /// Required camera name; may repeat. Without it, one scan pass
        /// decides the fleet.
        #[arg(long = "device")]
        devices: Vec<String>,

        /// Scan-pass budget for quorum discovery.
        #[arg(long)]
        attempts: Option<u32>,

        /// Record for a fixed number of seconds instead of waiting for
        /// Ctrl+C.
        #[arg(long)]
        hold_secs: Option<u64>,

        /// Write the run summary as JSON to this path.
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Apply resolution/frame-rate settings to all cameras.
    Settings {
        /// Frames per second (60, 120, 240).
        #[arg(long)]
        fps: Option<u32>,

        /// Vertical resolution (1080, 2700, 4000).
        #[arg(long)]
        resolution: Option<u32>,

        /// Required camera name; may repeat.
        #[arg(long = "device")]
        devices: Vec<String>,

        /// Scan-pass budget for quorum discovery.
        #[arg(long)]
        attempts: Option<u32>,
    },

    /// Put all cameras to sleep.
    PowerOff {
        /// Required camera name; may repeat.
        #[arg(long = "device")]
        devices: Vec<String>,

        /// Scan-pass budget for quorum discovery.
        #[arg(long)]
        attempts: Option<u32>,
    },

    /// Align recorded footage by embedded timecode.
    Sync {
        /// Folder of collected footage.
        footage: PathBuf,

        /// Output folder (defaults to the configured output folder under
        /// the footage folder).
        #[arg(long)]
        out: Option<PathBuf>,

        /// Trial-grouping tolerance in seconds.
        #[arg(long)]
        tolerance_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigManager::new(config_path(&cli)?);
    config.load_or_create().context("loading configuration")?;
    init_tracing(config.settings().logging.level);

    match &cli.command {
        Cmd::Scan => {
            if cli.mock {
                scan(mock_transport(), &config).await
            } else {
                scan(cohn_transport(&config)?, &config).await
            }
        }
        Cmd::Capture {
            devices,
            attempts,
            hold_secs,
            summary,
        } => {
            let opts = capture_options(&config, devices, *attempts, *hold_secs);
            if cli.mock {
                capture(mock_transport(), &config, &opts, summary.as_deref()).await
            } else {
                capture(cohn_transport(&config)?, &config, &opts, summary.as_deref()).await
            }
        }
        Cmd::Settings {
            fps,
            resolution,
            devices,
            attempts,
        } => {
            let commands = setting_commands(*fps, *resolution)?;
            let opts = capture_options(&config, devices, *attempts, None);
            if cli.mock {
                apply(mock_transport(), &config, &opts, &commands, "settings").await
            } else {
                apply(cohn_transport(&config)?, &config, &opts, &commands, "settings").await
            }
        }
        Cmd::PowerOff { devices, attempts } => {
            let commands = vec![Command::PowerOff];
            let opts = capture_options(&config, devices, *attempts, None);
            if cli.mock {
                apply(mock_transport(), &config, &opts, &commands, "poweroff").await
            } else {
                apply(cohn_transport(&config)?, &config, &opts, &commands, "poweroff").await
            }
        }
        Cmd::Sync {
            footage,
            out,
            tolerance_secs,
        } => sync_footage(&config, footage, out.as_deref(), *tolerance_secs),
    }
}

fn config_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    if let Some(path) = &cli.config {
        return Ok(path.clone());
    }
    let dirs = ProjectDirs::from("", "", "rigsync")
        .context("cannot resolve a user config directory")?;
    Ok(dirs.config_dir().join("config.toml"))
}

fn mock_transport() -> Arc<MockTransport> {
    Arc::new(MockTransport::with_cameras(3))
}

fn cohn_transport(config: &ConfigManager) -> anyhow::Result<Arc<CohnTransport>> {
    let dir = PathBuf::from(&config.settings().paths.credentials_folder);
    let transport = CohnTransport::from_credentials_dir(&dir)
        .with_context(|| format!("loading camera credentials from {}", dir.display()))?;
    Ok(Arc::new(transport))
}

fn capture_options(
    config: &ConfigManager,
    devices: &[String],
    attempts: Option<u32>,
    hold_secs: Option<u64>,
) -> CaptureOptions {
    let selectors: Vec<DeviceSelector> = devices
        .iter()
        .map(|name| DeviceSelector::ByName(name.clone()))
        .collect();

    let mut opts = CaptureOptions::with_required(&selectors);
    opts.max_attempts = attempts.unwrap_or(config.settings().discovery.max_attempts);
    opts.hold = match hold_secs {
        Some(secs) => HoldPolicy::Duration(Duration::from_secs(secs)),
        None => HoldPolicy::Trigger,
    };
    opts
}

fn run_logger(config: &ConfigManager, kind: &str) -> anyhow::Result<RunLogger> {
    let name = format!("{}_{}", kind, Local::now().format("%Y%m%d_%H%M%S"));
    let log_config: LogConfig = config.settings().logging.to_log_config();
    let logger = RunLogger::new(name, config.logs_folder(), log_config, None)
        .context("creating run log file")?;
    Ok(logger)
}

async fn scan<T: Transport>(transport: Arc<T>, config: &ConfigManager) -> anyhow::Result<()> {
    let discovery = DiscoveryService::from_settings(transport, &config.settings().discovery);
    let devices = discovery.scan_once().await?;

    if devices.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }
    println!("Found {} camera(s):", devices.len());
    for device in devices {
        println!("  {}", device);
    }
    Ok(())
}

async fn capture<T: Transport>(
    transport: Arc<T>,
    config: &ConfigManager,
    opts: &CaptureOptions,
    summary_path: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    let logger = run_logger(config, "capture")?;
    let runner = CaptureRunner::from_settings(transport, ConsoleArbiter, &config.settings().discovery);

    let summary = runner.run(opts, &logger).await?;
    logger.close();

    print!("{}", summary.render_text());
    println!("Run log: {}", logger.log_path().display());

    if let Some(path) = summary_path {
        let mut json = serde_json::to_string_pretty(&summary)?;
        json.push('\n');
        std::fs::write(path, json)
            .with_context(|| format!("writing run summary to {}", path.display()))?;
        println!("Run summary: {}", path.display());
    }
    Ok(())
}

async fn apply<T: Transport>(
    transport: Arc<T>,
    config: &ConfigManager,
    opts: &CaptureOptions,
    commands: &[Command],
    kind: &str,
) -> anyhow::Result<()> {
    let logger = run_logger(config, kind)?;
    let runner = CaptureRunner::from_settings(transport, ConsoleArbiter, &config.settings().discovery);

    let results = runner.apply(opts, commands, &logger).await?;
    logger.close();

    for (command, command_results) in &results {
        println!("{}:", command);
        for result in command_results {
            if result.is_ok() {
                println!("  ok     {}", result.device);
            } else {
                println!(
                    "  failed {}: {}",
                    result.device,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }
    Ok(())
}

fn setting_commands(fps: Option<u32>, resolution: Option<u32>) -> anyhow::Result<Vec<Command>> {
    let mut commands = Vec::new();

    if let Some(lines) = resolution {
        let resolution = Resolution::from_lines(lines)
            .with_context(|| format!("unsupported resolution {} (use 1080, 2700, or 4000)", lines))?;
        commands.push(Command::set_resolution(resolution));
    }
    if let Some(fps) = fps {
        let rate = FrameRateOption::from_fps(fps)
            .with_context(|| format!("unsupported frame rate {} (use 60, 120, or 240)", fps))?;
        commands.push(Command::set_frame_rate(rate));
    }

    if commands.is_empty() {
        bail!("nothing to apply: pass --fps and/or --resolution");
    }
    Ok(commands)
}

fn sync_footage(
    config: &ConfigManager,
    footage: &std::path::Path,
    out: Option<&std::path::Path>,
    tolerance_secs: Option<u64>,
) -> anyhow::Result<()> {
    let settings = config.settings();
    let tolerance = tolerance_secs.unwrap_or(settings.sync.trial_tolerance_secs);
    let out_dir = match out {
        Some(path) => path.to_path_buf(),
        None => footage.join(&settings.paths.output_folder),
    };

    let engine = SyncEngine::new().with_tolerance(tolerance);
    let report = engine
        .sync_folder(footage, &out_dir)
        .with_context(|| format!("synchronizing footage in {}", footage.display()))?;

    print!("{}", report.render_text());
    if let Some(path) = &report.output_json {
        println!("Alignment manifest: {}", path.display());
    }
    if let Some(path) = &report.output_csv {
        println!("Offsets table: {}", path.display());
    }
    Ok(())
}
