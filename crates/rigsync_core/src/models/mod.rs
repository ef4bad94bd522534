//! Shared data model: devices, commands, media records, run reports.

mod command;
mod device;
mod media;
mod results;

pub use command::{
    Command, CommandResult, FrameRateOption, Opcode, Resolution, SETTING_FRAME_RATE,
    SETTING_RESOLUTION,
};
pub use device::{Device, DeviceAddress, DeviceRef, DeviceSelector, SessionState};
pub use media::{FrameRate, MediaRecord};
pub use results::{DeviceRunReport, DispatchReport, RunSummary};
