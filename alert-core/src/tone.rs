//! Piezo buzzer driver.

use core::fmt;
use core::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::fmt::{debug, trace};
use crate::time::millis_u32;

/// One note of a melody.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Note {
    pub frequency_hz: u32,
    pub duration: Duration,
}

impl Note {
    #[must_use]
    pub const fn new(frequency_hz: u32, duration: Duration) -> Self {
        Self {
            frequency_hz,
            duration,
        }
    }
}

/// Abstraction over the buzzer hardware.
///
/// `start` must return immediately. The output is expected to end by itself
/// after `duration`; [`ToneOutput::stop`] cuts it off at an exact point.
pub trait ToneOutput {
    type Error: fmt::Debug;

    fn start(&mut self, frequency_hz: u32, duration: Duration) -> Result<(), Self::Error>;

    /// Cuts a running tone short.
    fn stop(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl<T: ToneOutput + ?Sized> ToneOutput for &mut T {
    type Error = T::Error;

    fn start(&mut self, frequency_hz: u32, duration: Duration) -> Result<(), Self::Error> {
        (**self).start(frequency_hz, duration)
    }

    fn stop(&mut self) -> Result<(), Self::Error> {
        (**self).stop()
    }
}

/// Fire-and-forget tone emitter with a global sound switch.
pub struct ToneDriver<T> {
    output: T,
    enabled: bool,
}

impl<T: ToneOutput> ToneDriver<T> {
    /// `enabled = false` turns every call into a no-op.
    pub fn new(output: T, enabled: bool) -> Self {
        Self { output, enabled }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Starts a tone and returns without waiting for it to end.
    ///
    /// Hardware errors are logged and dropped; the next beep retries anyway.
    pub fn start_tone(&mut self, frequency_hz: u32, duration: Duration) {
        if !self.enabled {
            trace!("tone: sound disabled, skipping {} Hz", frequency_hz);
            return;
        }
        if self.output.start(frequency_hz, duration).is_err() {
            debug!("tone: failed to start {} Hz", frequency_hz);
        }
    }

    pub fn stop_tone(&mut self) {
        if self.output.stop().is_err() {
            debug!("tone: failed to stop output");
        }
    }

    /// Plays `notes` back to back, blocking on `delay`. Every note is
    /// stopped explicitly before its trailing `gap` of silence.
    pub fn play_melody<D: DelayNs>(&mut self, notes: &[Note], gap: Duration, delay: &mut D) {
        if !self.enabled {
            return;
        }
        debug!("tone: playing {} note melody", notes.len());
        for note in notes {
            self.start_tone(note.frequency_hz, note.duration);
            delay.delay_ms(millis_u32(note.duration));
            self.stop_tone();
            delay.delay_ms(millis_u32(gap));
        }
    }

    #[must_use]
    pub fn output(&self) -> &T {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut T {
        &mut self.output
    }
}
