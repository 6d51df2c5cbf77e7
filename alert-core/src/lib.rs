#![no_std]

// Alert and notification logic for the sensor station.
//
// Shared by the MCU firmware and the host emulator. Hardware is reached only
// through the output traits in `led` and `tone`.

mod fmt;

pub mod config;
pub mod handler;
pub mod led;
pub mod notification;
pub mod queue;
pub mod time;
pub mod tone;

pub use config::AlertConfig;
pub use handler::{AlertHandler, NextUpdate};
pub use led::{LedPatternDriver, LedState, PatternError, Rgb, RgbOutput};
pub use notification::{
    Category, ErrorStatus, InvalidValidity, Notification, SensorError, SensorType, Validity,
};
pub use queue::{NotificationQueue, QueueFull};
pub use time::Instant;
pub use tone::{Note, ToneDriver, ToneOutput};
