//! Control commands, their wire encoding, and per-dispatch results.
//!
//! Commands are encoded as TLV request payloads addressed to one of two
//! request characteristics on the camera's control surface. The transport
//! is payload-agnostic: it writes `(opcode, payload)` and reports the ack.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::device::DeviceRef;

/// Setting id for video resolution.
pub const SETTING_RESOLUTION: u8 = 2;
/// Setting id for frame rate on the wireless control surface.
pub const SETTING_FRAME_RATE: u8 = 3;

/// Request characteristic a payload is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Opcode {
    /// Command request characteristic (shutter, power).
    Command,
    /// Setting request characteristic.
    Setting,
}

/// Video resolution options accepted by the cameras.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    R1080p,
    R2_7K,
    R4K,
}

impl Resolution {
    /// Map a vertical line count to a resolution option.
    pub fn from_lines(lines: u32) -> Option<Self> {
        match lines {
            1080 => Some(Resolution::R1080p),
            2700 => Some(Resolution::R2_7K),
            4000 => Some(Resolution::R4K),
            _ => None,
        }
    }

    /// Option id on the setting characteristic.
    pub fn option_id(&self) -> u8 {
        match self {
            Resolution::R1080p => 9,
            Resolution::R2_7K => 4,
            Resolution::R4K => 1,
        }
    }
}

/// Frame-rate options accepted by the cameras.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRateOption {
    Fps60,
    Fps120,
    Fps240,
}

impl FrameRateOption {
    /// Map a frames-per-second value to a frame-rate option.
    pub fn from_fps(fps: u32) -> Option<Self> {
        match fps {
            60 => Some(FrameRateOption::Fps60),
            120 => Some(FrameRateOption::Fps120),
            240 => Some(FrameRateOption::Fps240),
            _ => None,
        }
    }

    /// Option id on the setting characteristic.
    pub fn option_id(&self) -> u8 {
        match self {
            FrameRateOption::Fps60 => 2,
            FrameRateOption::Fps120 => 1,
            FrameRateOption::Fps240 => 0,
        }
    }
}

/// A command dispatched to every open session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Start recording (shutter on).
    StartCapture,
    /// Stop recording (shutter off).
    StopCapture,
    /// Change one camera setting to the given option.
    ApplySetting { setting: u8, option: u8 },
    /// Put the camera to sleep.
    PowerOff,
}

impl Command {
    /// Build a resolution-change command.
    pub fn set_resolution(resolution: Resolution) -> Self {
        Command::ApplySetting {
            setting: SETTING_RESOLUTION,
            option: resolution.option_id(),
        }
    }

    /// Build a frame-rate-change command.
    pub fn set_frame_rate(rate: FrameRateOption) -> Self {
        Command::ApplySetting {
            setting: SETTING_FRAME_RATE,
            option: rate.option_id(),
        }
    }

    /// Short name for logs and summaries.
    pub fn name(&self) -> &'static str {
        match self {
            Command::StartCapture => "start",
            Command::StopCapture => "stop",
            Command::ApplySetting { .. } => "setting",
            Command::PowerOff => "power-off",
        }
    }

    /// Encode into the request characteristic and TLV payload.
    ///
    /// Shutter requests are `[len, 0x01, value_len, on/off]`; setting
    /// requests are `[len, setting_id, value_len, option_id]`; power-off
    /// is the bare `[len, 0x05]` command.
    pub fn encode(&self) -> (Opcode, Vec<u8>) {
        match self {
            Command::StartCapture => (Opcode::Command, vec![3, 1, 1, 1]),
            Command::StopCapture => (Opcode::Command, vec![3, 1, 1, 0]),
            Command::ApplySetting { setting, option } => {
                (Opcode::Setting, vec![3, *setting, 1, *option])
            }
            Command::PowerOff => (Opcode::Command, vec![1, 5]),
        }
    }

    /// Decode a request back into a command.
    ///
    /// Transports that map requests onto a higher-level surface (e.g. an
    /// HTTP endpoint per command) use this to recover intent from the
    /// wire form. Returns `None` for payloads this module did not encode.
    pub fn decode(opcode: Opcode, payload: &[u8]) -> Option<Self> {
        match (opcode, payload) {
            (Opcode::Command, [3, 1, 1, 1]) => Some(Command::StartCapture),
            (Opcode::Command, [3, 1, 1, 0]) => Some(Command::StopCapture),
            (Opcode::Command, [1, 5]) => Some(Command::PowerOff),
            (Opcode::Setting, [3, setting, 1, option]) => Some(Command::ApplySetting {
                setting: *setting,
                option: *option,
            }),
            _ => None,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::ApplySetting { setting, option } => {
                write!(f, "setting {} -> option {}", setting, option)
            }
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Outcome of dispatching one command to one session.
///
/// Immutable once produced. `issued_at` is the monotonic instant captured
/// the moment this session's write was acknowledged; it is `None` when the
/// write failed before acknowledgment.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// The device the command was sent to.
    pub device: DeviceRef,
    /// Monotonic timestamp of this session's acknowledgment.
    pub issued_at: Option<Instant>,
    /// Whether the device acknowledged the command.
    pub acknowledged: bool,
    /// Failure reason, when not acknowledged.
    pub error: Option<String>,
}

impl CommandResult {
    /// Build an acknowledged result stamped at `at`.
    pub fn acknowledged(device: DeviceRef, at: Instant) -> Self {
        Self {
            device,
            issued_at: Some(at),
            acknowledged: true,
            error: None,
        }
    }

    /// Build a failed result with a reason.
    pub fn failed(device: DeviceRef, error: impl Into<String>) -> Self {
        Self {
            device,
            issued_at: None,
            acknowledged: false,
            error: Some(error.into()),
        }
    }

    /// Whether the command went through.
    pub fn is_ok(&self) -> bool {
        self.acknowledged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutter_encoding_round_trips() {
        for command in [Command::StartCapture, Command::StopCapture, Command::PowerOff] {
            let (opcode, payload) = command.encode();
            assert_eq!(Command::decode(opcode, &payload), Some(command));
        }
    }

    #[test]
    fn setting_encoding_round_trips() {
        let command = Command::set_resolution(Resolution::R2_7K);
        let (opcode, payload) = command.encode();
        assert_eq!(opcode, Opcode::Setting);
        assert_eq!(payload, vec![3, SETTING_RESOLUTION, 1, 4]);
        assert_eq!(Command::decode(opcode, &payload), Some(command));
    }

    #[test]
    fn decode_rejects_unknown_payloads() {
        assert_eq!(Command::decode(Opcode::Command, &[9, 9]), None);
        assert_eq!(Command::decode(Opcode::Setting, &[1]), None);
    }

    #[test]
    fn frame_rate_options_map_from_fps() {
        assert_eq!(FrameRateOption::from_fps(120), Some(FrameRateOption::Fps120));
        assert_eq!(FrameRateOption::from_fps(25), None);
    }

    #[test]
    fn failed_result_has_no_timestamp() {
        let device = DeviceRef {
            name: "GoPro 1234".to_string(),
            address: crate::models::DeviceAddress::new("a1"),
        };
        let result = CommandResult::failed(device, "write failed");
        assert!(!result.is_ok());
        assert!(result.issued_at.is_none());
        assert_eq!(result.error.as_deref(), Some("write failed"));
    }
}
