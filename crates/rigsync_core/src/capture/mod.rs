//! Capture-run orchestration.
//!
//! One run is: resolve devices (with operator arbitration when required
//! cameras are missing) -> establish sessions -> dispatch start -> wait
//! out the hold or an external stop trigger -> dispatch stop -> tear
//! down. Stop dispatch and teardown execute on every exit path of the
//! wait, including operator interrupt: a camera must never be left
//! recording because this process was interrupted.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Notify;

use crate::config::DiscoverySettings;
use crate::discovery::{DiscoveryOutcome, DiscoveryService};
use crate::dispatch::dispatch;
use crate::logging::RunLogger;
use crate::models::{
    Command, CommandResult, DeviceRunReport, DeviceSelector, DispatchReport, RunSummary,
};
use crate::session::{Arbiter, Session, SessionError, SessionManager};
use crate::transport::{ControlChannel, Transport};

/// How long to keep the cameras rolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldPolicy {
    /// Record for a fixed duration (still interruptible).
    Duration(Duration),
    /// Record until the operator stops the run (keypress/interrupt) or
    /// the stop trigger fires.
    Trigger,
}

/// Options for one capture run.
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Advertised names that must all be present, or empty to take
    /// whatever one scan pass finds.
    pub required: BTreeSet<String>,
    /// Scan-pass budget for quorum discovery; also bounds how many times
    /// the operator can ask for rediscovery.
    pub max_attempts: u32,
    /// Hold policy between start and stop.
    pub hold: HoldPolicy,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            required: BTreeSet::new(),
            max_attempts: 2,
            hold: HoldPolicy::Trigger,
        }
    }
}

impl CaptureOptions {
    /// Build options requiring the given devices, however the caller
    /// refers to them. Selectors collapse to advertised names here, once,
    /// at the API boundary.
    pub fn with_required(selectors: &[DeviceSelector]) -> Self {
        Self {
            required: selectors.iter().map(|s| s.name().to_string()).collect(),
            ..Self::default()
        }
    }
}

/// Errors terminating a capture run.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Discovery/arbitration-level failure (transport fatal, operator
    /// abort, exhausted retry budget).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Not a single session reached the ready state.
    #[error("no control sessions could be established")]
    NoSessions,
}

/// Result type for capture runs.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Orchestrates capture runs over one transport.
pub struct CaptureRunner<T: Transport, A: Arbiter> {
    discovery: DiscoveryService<T>,
    manager: SessionManager<T>,
    arbiter: A,
    stop: Arc<Notify>,
}

impl<T: Transport, A: Arbiter> CaptureRunner<T, A> {
    /// Create a runner with default discovery parameters.
    pub fn new(transport: Arc<T>, arbiter: A) -> Self {
        Self {
            discovery: DiscoveryService::new(Arc::clone(&transport)),
            manager: SessionManager::new(transport),
            arbiter,
            stop: Arc::new(Notify::new()),
        }
    }

    /// Create a runner with configured discovery parameters.
    pub fn from_settings(transport: Arc<T>, arbiter: A, settings: &DiscoverySettings) -> Self {
        Self {
            discovery: DiscoveryService::from_settings(Arc::clone(&transport), settings),
            manager: SessionManager::new(transport),
            arbiter,
            stop: Arc::new(Notify::new()),
        }
    }

    /// Handle that stops the hold wait from another task (or ahead of
    /// time; a pending notification is consumed by the next wait).
    pub fn stop_trigger(&self) -> Arc<Notify> {
        Arc::clone(&self.stop)
    }

    /// Run one capture: start every camera, hold, stop every camera,
    /// tear down.
    pub async fn run(&self, opts: &CaptureOptions, logger: &RunLogger) -> CaptureResult<RunSummary> {
        logger.phase("Discovery");
        let outcome = self
            .manager
            .resolve(&self.discovery, &opts.required, opts.max_attempts, &self.arbiter)
            .await?;
        logger.info(&format!(
            "discovered {} device(s) in {} attempt(s)",
            outcome.devices.len(),
            outcome.attempts
        ));
        for name in &outcome.missing {
            logger.warn(&format!("proceeding without {}", name));
        }

        logger.phase("Connect");
        let mut sessions = self.manager.establish(&outcome.devices).await;
        for session in sessions.iter().filter(|s| !s.is_ready()) {
            logger.warn(&format!(
                "no session for {}: {}",
                session.device(),
                session.connect_error().unwrap_or("unknown error")
            ));
        }
        if !sessions.iter().any(Session::is_ready) {
            self.manager.close(&mut sessions).await;
            return Err(CaptureError::NoSessions);
        }

        logger.phase("Capture");
        let started_at = Utc::now();
        let epoch = Instant::now();

        // From here to teardown there is no early return: the stop
        // dispatch and session close run however the wait ends.
        let start_results = dispatch(&sessions, &Command::StartCapture).await;
        log_dispatch(logger, "started recording on", &start_results, epoch);

        self.wait_hold(&opts.hold, logger).await;

        let stop_results = dispatch(&sessions, &Command::StopCapture).await;
        log_dispatch(logger, "stopped recording on", &stop_results, epoch);

        logger.phase("Teardown");
        self.manager.close(&mut sessions).await;

        let summary = summarize(started_at, epoch, &sessions, &outcome, &start_results, &stop_results);
        if summary.all_succeeded() {
            logger.success("capture run complete");
        } else {
            logger.warn(&format!(
                "capture run finished with failures: {}",
                summary.failed_devices().join(", ")
            ));
        }
        Ok(summary)
    }

    /// Dispatch a sequence of one-shot commands (settings, power-off) to
    /// the resolved device set, with the same arbitration and teardown
    /// guarantees as a capture run.
    pub async fn apply(
        &self,
        opts: &CaptureOptions,
        commands: &[Command],
        logger: &RunLogger,
    ) -> CaptureResult<Vec<(Command, Vec<CommandResult>)>> {
        logger.phase("Discovery");
        let outcome = self
            .manager
            .resolve(&self.discovery, &opts.required, opts.max_attempts, &self.arbiter)
            .await?;

        logger.phase("Connect");
        let mut sessions = self.manager.establish(&outcome.devices).await;
        if !sessions.iter().any(Session::is_ready) {
            self.manager.close(&mut sessions).await;
            return Err(CaptureError::NoSessions);
        }

        logger.phase("Dispatch");
        let mut results = Vec::with_capacity(commands.len());
        let epoch = Instant::now();
        for command in commands {
            let command_results = dispatch(&sessions, command).await;
            log_dispatch(logger, &format!("{} acknowledged by", command), &command_results, epoch);
            results.push((command.clone(), command_results));
        }

        logger.phase("Teardown");
        self.manager.close(&mut sessions).await;
        Ok(results)
    }

    /// Wait out the hold policy. Never fails; an interrupt simply ends
    /// the wait so the caller's stop dispatch proceeds.
    async fn wait_hold(&self, hold: &HoldPolicy, logger: &RunLogger) {
        match hold {
            HoldPolicy::Duration(duration) => {
                logger.info(&format!("holding for {:.1}s", duration.as_secs_f64()));
                tokio::select! {
                    _ = tokio::time::sleep(*duration) => {
                        logger.info("hold elapsed");
                    }
                    _ = self.stop.notified() => {
                        logger.info("stop requested");
                    }
                    _ = interrupt() => {
                        logger.warn("interrupted, stopping cameras");
                    }
                }
            }
            HoldPolicy::Trigger => {
                logger.info("recording; press Ctrl+C to stop all cameras");
                tokio::select! {
                    _ = self.stop.notified() => {
                        logger.info("stop requested");
                    }
                    _ = interrupt() => {
                        logger.warn("interrupted, stopping cameras");
                    }
                }
            }
        }
    }
}

/// Wait for the process interrupt signal, swallowing registration errors
/// (which would otherwise make the wait unkillable anyway).
async fn interrupt() {
    if tokio::signal::ctrl_c().await.is_err() {
        // Registration failed; park forever and let the other select
        // arms decide the wait.
        std::future::pending::<()>().await;
    }
}

fn log_dispatch(logger: &RunLogger, verb: &str, results: &[CommandResult], epoch: Instant) {
    for result in results {
        match result.issued_at {
            Some(at) => logger.info(&format!(
                "{} {} at +{}ms",
                verb,
                result.device,
                at.saturating_duration_since(epoch).as_millis()
            )),
            None => logger.warn(&format!(
                "{} {} failed: {}",
                verb,
                result.device,
                result.error.as_deref().unwrap_or("unknown error")
            )),
        }
    }
}

/// Merge session states and dispatch results into the run summary.
fn summarize<C: ControlChannel>(
    started_at: chrono::DateTime<Utc>,
    epoch: Instant,
    sessions: &[Session<C>],
    outcome: &DiscoveryOutcome,
    start_results: &[CommandResult],
    stop_results: &[CommandResult],
) -> RunSummary {
    let devices = sessions
        .iter()
        .enumerate()
        .map(|(i, session)| DeviceRunReport {
            name: session.device().name.clone(),
            address: session.device().address.to_string(),
            connected: session.connect_error().is_none(),
            connect_error: session.connect_error().map(str::to_string),
            start: start_results
                .get(i)
                .map(|r| DispatchReport::from_result(r, epoch)),
            stop: stop_results
                .get(i)
                .map(|r| DispatchReport::from_result(r, epoch)),
        })
        .collect();

    RunSummary {
        started_at,
        missing_after_discovery: outcome.missing.iter().cloned().collect(),
        devices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogConfig;
    use crate::models::{DeviceAddress, Opcode, Resolution};
    use crate::session::ArbitrationDecision;
    use crate::transport::mock::MockTransport;

    struct AutoProceed;

    impl Arbiter for AutoProceed {
        async fn decide(&self, _missing: &BTreeSet<String>) -> ArbitrationDecision {
            ArbitrationDecision::Proceed
        }
    }

    struct AutoAbort;

    impl Arbiter for AutoAbort {
        async fn decide(&self, _missing: &BTreeSet<String>) -> ArbitrationDecision {
            ArbitrationDecision::Abort
        }
    }

    fn test_logger(dir: &tempfile::TempDir) -> RunLogger {
        RunLogger::new("capture_test", dir.path(), LogConfig::default(), None).unwrap()
    }

    fn short_hold() -> CaptureOptions {
        CaptureOptions {
            hold: HoldPolicy::Duration(Duration::from_millis(5)),
            ..CaptureOptions::default()
        }
    }

    const START: [u8; 4] = [3, 1, 1, 1];
    const STOP: [u8; 4] = [3, 1, 1, 0];

    #[tokio::test]
    async fn run_starts_holds_and_stops_every_camera() {
        let transport = MockTransport::with_cameras(2);
        let dir = tempfile::tempdir().unwrap();
        let runner = CaptureRunner::new(Arc::new(transport.clone()), AutoProceed);

        let summary = runner.run(&short_hold(), &test_logger(&dir)).await.unwrap();

        assert!(summary.all_succeeded());
        for address in ["mock-1001", "mock-1002"] {
            let writes = transport.writes_for(&DeviceAddress::new(address));
            let payloads: Vec<&[u8]> = writes.iter().map(|w| w.payload.as_slice()).collect();
            // Start completes before stop is attempted on each session.
            assert_eq!(payloads, vec![&START[..], &STOP[..]]);
        }
    }

    #[tokio::test]
    async fn failed_start_on_one_camera_still_stops_the_others() {
        let transport = MockTransport::with_cameras(3);
        transport.fail_writes(&DeviceAddress::new("mock-1002"));
        let dir = tempfile::tempdir().unwrap();
        let runner = CaptureRunner::new(Arc::new(transport.clone()), AutoProceed);

        let summary = runner.run(&short_hold(), &test_logger(&dir)).await.unwrap();

        // Camera 2 is reported failed without affecting its siblings.
        assert_eq!(summary.failed_devices(), vec!["GoPro 1002"]);
        let camera2 = summary
            .devices
            .iter()
            .find(|d| d.name == "GoPro 1002")
            .unwrap();
        assert!(!camera2.start.as_ref().unwrap().acknowledged);

        for address in ["mock-1001", "mock-1003"] {
            let writes = transport.writes_for(&DeviceAddress::new(address));
            let payloads: Vec<&[u8]> = writes.iter().map(|w| w.payload.as_slice()).collect();
            assert_eq!(payloads, vec![&START[..], &STOP[..]]);
        }

        let healthy: Vec<_> = summary
            .devices
            .iter()
            .filter(|d| d.name != "GoPro 1002")
            .collect();
        assert!(healthy.iter().all(|d| d.succeeded()));
    }

    #[tokio::test]
    async fn pre_armed_stop_trigger_ends_the_hold() {
        let transport = MockTransport::with_cameras(1);
        let dir = tempfile::tempdir().unwrap();
        let runner = CaptureRunner::new(Arc::new(transport.clone()), AutoProceed);

        // Trigger fires before the wait begins; the pending notification
        // is consumed by the hold and the stop dispatch still runs.
        runner.stop_trigger().notify_one();
        let opts = CaptureOptions {
            hold: HoldPolicy::Trigger,
            ..CaptureOptions::default()
        };
        let summary = runner.run(&opts, &test_logger(&dir)).await.unwrap();

        assert!(summary.all_succeeded());
        let writes = transport.writes_for(&DeviceAddress::new("mock-1001"));
        assert_eq!(writes.last().unwrap().payload, STOP.to_vec());
    }

    #[tokio::test]
    async fn operator_abort_propagates() {
        let transport = MockTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let runner = CaptureRunner::new(Arc::new(transport), AutoAbort);

        let opts = CaptureOptions {
            required: ["GoPro 1111".to_string()].into_iter().collect(),
            max_attempts: 1,
            hold: HoldPolicy::Duration(Duration::from_millis(1)),
        };
        let result = runner.run(&opts, &test_logger(&dir)).await;
        assert!(matches!(
            result,
            Err(CaptureError::Session(SessionError::OperatorAbort { .. }))
        ));
    }

    #[tokio::test]
    async fn all_connects_failing_is_an_error() {
        let transport = MockTransport::with_cameras(1);
        transport.fail_connect(&DeviceAddress::new("mock-1001"));
        let dir = tempfile::tempdir().unwrap();
        let runner = CaptureRunner::new(Arc::new(transport), AutoProceed);

        let result = runner.run(&short_hold(), &test_logger(&dir)).await;
        assert!(matches!(result, Err(CaptureError::NoSessions)));
    }

    #[tokio::test]
    async fn apply_dispatches_setting_commands() {
        let transport = MockTransport::with_cameras(2);
        let dir = tempfile::tempdir().unwrap();
        let runner = CaptureRunner::new(Arc::new(transport.clone()), AutoProceed);

        let commands = vec![Command::set_resolution(Resolution::R4K)];
        let results = runner
            .apply(&CaptureOptions::default(), &commands, &test_logger(&dir))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].1.iter().all(CommandResult::is_ok));

        let writes = transport.writes();
        assert_eq!(writes.len(), 2);
        assert!(writes.iter().all(|w| w.opcode == Opcode::Setting));
    }
}
