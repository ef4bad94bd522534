//! RigSync core - capture orchestration and timecode synchronization.
//!
//! This crate contains all business logic with zero UI dependencies:
//! discovering a fleet of wireless action cameras, driving synchronized
//! start/stop capture runs over their control channels, and (offline)
//! aligning the independently recorded files into a synchronized
//! multi-camera dataset via their embedded timecodes.
//!
//! The live-control half (`discovery`, `session`, `dispatch`, `capture`)
//! and the offline half (`probe`, `timecode`, `sync`) share no runtime
//! state - only the convention that a camera's identifier reappears in
//! the filenames of the footage it records.

pub mod capture;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod logging;
pub mod models;
pub mod probe;
pub mod session;
pub mod sync;
pub mod timecode;
pub mod transport;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
