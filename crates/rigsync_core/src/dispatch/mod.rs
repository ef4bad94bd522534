//! Concurrent command fan-out.
//!
//! One command goes to every session at once; each session's result is
//! stamped the moment that session acknowledges, independent of its
//! siblings. The cross-device timing skew visible in those stamps is
//! expected; the offline alignment stage corrects it from the recorded
//! media, so no ordering is imposed here and no failed write is retried
//! (retrying a shutter transition on a physical camera risks a duplicate
//! or missed transition).
//!
//! Results are gathered and merged, never accumulated through shared
//! mutable state, so a dispatch is re-entrancy safe by construction.

use std::time::Instant;

use futures_util::future::join_all;

use crate::models::{Command, CommandResult, Opcode};
use crate::session::Session;
use crate::transport::ControlChannel;

/// Send `command` to every session concurrently.
///
/// Returns one result per session, in session order. A per-session write
/// failure lands in that session's result and never blocks or cancels
/// dispatch to the others. Sessions that are not ready (connect failed,
/// already closed) yield failed results rather than being skipped, so the
/// run summary accounts for every device.
pub async fn dispatch<C: ControlChannel>(
    sessions: &[Session<C>],
    command: &Command,
) -> Vec<CommandResult> {
    let (opcode, payload) = command.encode();
    join_all(
        sessions
            .iter()
            .map(|session| dispatch_one(session, command, opcode, &payload)),
    )
    .await
}

async fn dispatch_one<C: ControlChannel>(
    session: &Session<C>,
    command: &Command,
    opcode: Opcode,
    payload: &[u8],
) -> CommandResult {
    let device = session.device().clone();

    let Some(channel) = session.channel() else {
        return CommandResult::failed(
            device,
            format!("session {} before {} dispatch", session.state(), command.name()),
        );
    };

    match channel.write(opcode, payload).await {
        Ok(()) => {
            let at = Instant::now();
            tracing::info!(device = %device, command = command.name(), "acknowledged");
            CommandResult::acknowledged(device, at)
        }
        Err(e) => {
            tracing::warn!(device = %device, command = command.name(), error = %e, "dispatch failed");
            CommandResult::failed(device, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveryService;
    use crate::models::DeviceAddress;
    use crate::session::SessionManager;
    use crate::transport::mock::MockTransport;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    async fn sessions_for(
        transport: &MockTransport,
    ) -> Vec<Session<<MockTransport as crate::transport::Transport>::Channel>> {
        let shared = Arc::new(transport.clone());
        let discovery = DiscoveryService::new(Arc::clone(&shared));
        let manager = SessionManager::new(shared);
        let outcome = discovery.discover(&BTreeSet::new(), 1).await.unwrap();
        manager.establish(&outcome.devices).await
    }

    #[tokio::test]
    async fn fan_out_returns_result_per_session() {
        let transport = MockTransport::with_cameras(3);
        let sessions = sessions_for(&transport).await;

        let results = dispatch(&sessions, &Command::StartCapture).await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.is_ok() && r.issued_at.is_some()));
        assert_eq!(transport.writes().len(), 3);
    }

    #[tokio::test]
    async fn one_failing_write_does_not_block_siblings() {
        let transport = MockTransport::with_cameras(3);
        transport.fail_writes(&DeviceAddress::new("mock-1002"));
        let sessions = sessions_for(&transport).await;

        let results = dispatch(&sessions, &Command::StartCapture).await;
        assert_eq!(results.len(), 3);

        let failed: Vec<_> = results.iter().filter(|r| !r.is_ok()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].device.name, "GoPro 1002");
        assert!(failed[0].error.as_deref().unwrap().contains("write"));

        // The two healthy cameras were still written to.
        assert_eq!(transport.writes().len(), 2);
    }

    #[tokio::test]
    async fn faulted_session_reports_instead_of_skipping() {
        let transport = MockTransport::with_cameras(2);
        transport.fail_connect(&DeviceAddress::new("mock-1001"));
        let sessions = sessions_for(&transport).await;

        let results = dispatch(&sessions, &Command::StopCapture).await;
        assert_eq!(results.len(), 2);

        let faulted = results.iter().find(|r| !r.is_ok()).unwrap();
        assert_eq!(faulted.device.name, "GoPro 1001");
        assert!(faulted.error.as_deref().unwrap().contains("faulted"));
        assert!(faulted.issued_at.is_none());
    }

    #[tokio::test]
    async fn acknowledgments_are_stamped_after_dispatch_begins() {
        let transport = MockTransport::with_cameras(2);
        let sessions = sessions_for(&transport).await;

        let before = Instant::now();
        let results = dispatch(&sessions, &Command::StartCapture).await;
        let after = Instant::now();

        for result in &results {
            let at = result.issued_at.unwrap();
            assert!(at >= before && at <= after);
        }
    }
}
