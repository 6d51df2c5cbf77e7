#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Glue between the embassy runtime and `alert-core`.
//!
//! Everything here is plain logic over the handler and the input latch so the
//! host test suite can drive it without an executor.

use alert_core::handler::{AlertHandler, NextUpdate};
use alert_core::led::RgbOutput;
use alert_core::notification::SensorType;
use alert_core::time::{Instant, millis_u32};
use alert_core::tone::ToneOutput;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Instant as EmbassyInstant};
use embedded_hal::delay::DelayNs;

use crate::status::AlertInputs;

/// Poll period while nothing is on display.
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Truncates the embassy tick clock to the wrapping millisecond counter
/// `alert-core` works with.
#[allow(clippy::cast_possible_truncation)]
pub fn alert_instant(now: EmbassyInstant) -> Instant {
    Instant::from_millis(now.as_millis() as u32)
}

/// Applies the latched inputs and runs one handler update.
///
/// A pending melody request plays first and blocks on `delay`; a pending
/// silence request replaces the plain update.
pub fn service<M, L, T, D, const N: usize>(
    handler: &mut AlertHandler<L, T, N>,
    inputs: &AlertInputs<M>,
    now: Instant,
    delay: &mut D,
) -> NextUpdate
where
    M: RawMutex,
    L: RgbOutput,
    T: ToneOutput,
    D: DelayNs,
{
    for sensor in SensorType::ALL {
        handler.update_validity(sensor, inputs.validity(sensor));
    }
    handler.update_pairing(inputs.pairing());

    if inputs.take_melody_request() {
        handler.play_melody(delay);
    }
    if inputs.take_silence_request() {
        let duration = handler.config().silence_duration;
        return handler.silence(duration, now);
    }
    handler.update(now)
}

/// Converts the handler's request (and any running tone) into a sleep time.
pub fn next_wake(next: NextUpdate, tone_remaining: Option<core::time::Duration>) -> Duration {
    let requested = next
        .delay()
        .map_or(IDLE_POLL_INTERVAL, |delay| to_embassy(delay).min(IDLE_POLL_INTERVAL));
    match tone_remaining {
        Some(remaining) => requested.min(to_embassy(remaining)),
        None => requested,
    }
}

fn to_embassy(duration: core::time::Duration) -> Duration {
    Duration::from_millis(u64::from(millis_u32(duration)))
}

/// Tracks when a fire-and-forget tone has to be switched off.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ToneWindow {
    ends_at: Option<Instant>,
}

impl ToneWindow {
    pub const fn new() -> Self {
        Self { ends_at: None }
    }

    pub fn open(&mut self, now: Instant, duration: core::time::Duration) {
        self.ends_at = Some(now + duration);
    }

    pub fn close(&mut self) {
        self.ends_at = None;
    }

    pub fn is_open(&self) -> bool {
        self.ends_at.is_some()
    }

    /// Time until the tone ends, or `None` once it has (or none is running).
    pub fn remaining(&self, now: Instant) -> Option<core::time::Duration> {
        self.ends_at.and_then(|end| now.until(end))
    }

    /// Returns `true` exactly once, on the first call past the end.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.ends_at {
            Some(end) if now.has_reached(end) => {
                self.ends_at = None;
                true
            }
            _ => false,
        }
    }
}
