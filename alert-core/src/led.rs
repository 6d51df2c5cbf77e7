//! RGB LED blink pattern driver.
//!
//! A pattern is a list of [`BlinkStep`]s, each an on period followed by an off
//! period, drawn in a single color. The driver is polled: every call to
//! [`LedPatternDriver::update_led_status`] flips the LED if the current
//! segment has run out and reports how long the caller may wait before the
//! next call. A returned zero means "call again now" while a pattern is
//! running, or "nothing left to do" once it is finished or disabled.

use core::fmt;
use core::time::Duration;

use embedded_hal::pwm::SetDutyCycle;
use heapless::Vec;

use crate::fmt::{debug, trace};
use crate::time::Instant;

/// Longest pattern the driver stores.
pub const MAX_PATTERN_STEPS: usize = 8;

/// 8-bit per channel LED color.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    /// All channels dark.
    pub const OFF: Self = Self::new(0, 0, 0);

    #[must_use]
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Decodes a `0xRRGGBB` color code.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_hex(code: u32) -> Self {
        Self::new((code >> 16) as u8, (code >> 8) as u8, code as u8)
    }

    #[must_use]
    pub const fn is_off(self) -> bool {
        self.red == 0 && self.green == 0 && self.blue == 0
    }
}

/// One on/off beat of a blink pattern.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlinkStep {
    pub on: Duration,
    pub off: Duration,
}

impl BlinkStep {
    #[must_use]
    pub const fn new(on: Duration, off: Duration) -> Self {
        Self { on, off }
    }

    /// Builds a step from millisecond counts.
    #[must_use]
    pub const fn millis(on: u64, off: u64) -> Self {
        Self::new(Duration::from_millis(on), Duration::from_millis(off))
    }
}

/// Observable driver state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedState {
    Disabled,
    On,
    Off,
    Finished,
}

/// Rejected pattern definitions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PatternError {
    /// The on and off duration lists differ in length.
    LengthMismatch { on: usize, off: usize },
    /// The pattern has more steps than [`MAX_PATTERN_STEPS`].
    TooManySteps(usize),
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::LengthMismatch { on, off } => {
                write!(f, "{on} on durations but {off} off durations")
            }
            PatternError::TooManySteps(count) => {
                write!(f, "{count} steps exceed the limit of {MAX_PATTERN_STEPS}")
            }
        }
    }
}

/// Abstraction over the physical RGB LED.
pub trait RgbOutput {
    /// Drives the LED with `color`; [`Rgb::OFF`] turns it dark.
    fn set_color(&mut self, color: Rgb);
}

impl<T: RgbOutput + ?Sized> RgbOutput for &mut T {
    fn set_color(&mut self, color: Rgb) {
        (**self).set_color(color);
    }
}

/// [`RgbOutput`] backed by three PWM channels, one per color.
///
/// Duty cycle is proportional to the channel value. Write failures are
/// dropped: the next pattern flip rewrites every channel anyway.
pub struct PwmRgbLed<R, G, B> {
    red: R,
    green: G,
    blue: B,
}

impl<R, G, B> PwmRgbLed<R, G, B>
where
    R: SetDutyCycle,
    G: SetDutyCycle,
    B: SetDutyCycle,
{
    pub fn new(red: R, green: G, blue: B) -> Self {
        Self { red, green, blue }
    }

    pub fn channels(&self) -> (&R, &G, &B) {
        (&self.red, &self.green, &self.blue)
    }

    /// Consumes the adapter and returns the channels.
    pub fn into_inner(self) -> (R, G, B) {
        (self.red, self.green, self.blue)
    }
}

impl<R, G, B> RgbOutput for PwmRgbLed<R, G, B>
where
    R: SetDutyCycle,
    G: SetDutyCycle,
    B: SetDutyCycle,
{
    fn set_color(&mut self, color: Rgb) {
        let red = self.red.set_duty_cycle_fraction(u16::from(color.red), 255);
        let green = self.green.set_duty_cycle_fraction(u16::from(color.green), 255);
        let blue = self.blue.set_duty_cycle_fraction(u16::from(color.blue), 255);
        if red.is_err() || green.is_err() || blue.is_err() {
            debug!("led: PWM duty update failed");
        }
    }
}

/// Polled blink pattern state machine driving an [`RgbOutput`].
pub struct LedPatternDriver<L> {
    output: L,
    color: Rgb,
    steps: Vec<BlinkStep, MAX_PATTERN_STEPS>,
    index: usize,
    looping: bool,
    lit: bool,
    finished: bool,
    enabled: bool,
    muted: bool,
    last_change: Instant,
}

impl<L: RgbOutput> LedPatternDriver<L> {
    /// Creates a driver with no pattern loaded and the LED dark.
    pub fn new(mut output: L) -> Self {
        output.set_color(Rgb::OFF);
        Self {
            output,
            color: Rgb::OFF,
            steps: Vec::new(),
            index: 0,
            looping: false,
            lit: false,
            finished: true,
            enabled: true,
            muted: false,
            last_change: Instant::ZERO,
        }
    }

    /// Loads a pattern from parallel on/off duration lists and lights the LED.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when the lists differ in length or exceed
    /// [`MAX_PATTERN_STEPS`]; the running pattern is left untouched.
    pub fn set_pattern(
        &mut self,
        color: Rgb,
        on: &[Duration],
        off: &[Duration],
        looping: bool,
        now: Instant,
    ) -> Result<(), PatternError> {
        if on.len() != off.len() {
            return Err(PatternError::LengthMismatch {
                on: on.len(),
                off: off.len(),
            });
        }
        if on.len() > MAX_PATTERN_STEPS {
            return Err(PatternError::TooManySteps(on.len()));
        }

        let steps = on
            .iter()
            .zip(off)
            .map(|(&on, &off)| BlinkStep::new(on, off))
            .collect();
        self.load(color, steps, looping, now);
        Ok(())
    }

    /// Loads a pattern from a step table and lights the LED.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::TooManySteps`] when `steps` exceeds
    /// [`MAX_PATTERN_STEPS`]; the running pattern is left untouched.
    pub fn set_steps(
        &mut self,
        color: Rgb,
        steps: &[BlinkStep],
        looping: bool,
        now: Instant,
    ) -> Result<(), PatternError> {
        let steps = Vec::from_slice(steps).map_err(|_| PatternError::TooManySteps(steps.len()))?;
        self.load(color, steps, looping, now);
        Ok(())
    }

    /// Advances the pattern and returns the time until the next call is due.
    pub fn update_led_status(&mut self, now: Instant) -> Duration {
        if self.muted {
            self.muted = false;
            if self.enabled && !self.finished {
                self.write_current();
            }
        }
        if self.finished || !self.enabled {
            trace!(
                "led: idle (finished={}, enabled={})",
                self.finished,
                self.enabled
            );
            return Duration::ZERO;
        }

        if self.steps.is_empty() {
            self.finish(now);
            return Duration::ZERO;
        }

        let remaining = self.remaining(now);
        if !remaining.is_zero() {
            return remaining;
        }

        if self.lit {
            self.switch(false, now);
        } else {
            // Off period at this index is done, move to the next step.
            self.index += 1;
            if self.index >= self.steps.len() {
                if !self.looping {
                    self.finish(now);
                    return Duration::ZERO;
                }
                self.index = 0;
            }
            self.switch(true, now);
        }
        self.remaining(now)
    }

    /// Resumes stepping where the pattern stopped and returns the next delay.
    pub fn enable(&mut self, now: Instant) -> Duration {
        self.enabled = true;
        if !self.finished {
            self.write_current();
        }
        self.update_led_status(now)
    }

    /// Turns the LED off and stops stepping until [`Self::enable`] is called.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.muted = false;
        self.output.set_color(Rgb::OFF);
    }

    /// Darkens the LED until the next [`Self::update_led_status`] call, which
    /// resumes the pattern without resetting it.
    pub fn silence(&mut self) {
        self.muted = true;
        self.output.set_color(Rgb::OFF);
    }

    /// Pattern state, ignoring a pending [`Self::silence`].
    #[must_use]
    pub fn state(&self) -> LedState {
        if !self.enabled {
            LedState::Disabled
        } else if self.finished {
            LedState::Finished
        } else if self.lit {
            LedState::On
        } else {
            LedState::Off
        }
    }

    /// Returns `true` while the LED is physically emitting light.
    #[must_use]
    pub fn is_lit(&self) -> bool {
        self.state() == LedState::On && !self.muted
    }

    #[must_use]
    pub fn is_silenced(&self) -> bool {
        self.muted
    }

    #[must_use]
    pub fn color(&self) -> Rgb {
        self.color
    }

    /// Index of the active step.
    #[must_use]
    pub fn step_index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn steps(&self) -> &[BlinkStep] {
        &self.steps
    }

    #[must_use]
    pub fn output(&self) -> &L {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut L {
        &mut self.output
    }

    fn load(
        &mut self,
        color: Rgb,
        steps: Vec<BlinkStep, MAX_PATTERN_STEPS>,
        looping: bool,
        now: Instant,
    ) {
        debug!(
            "led: new pattern color={:?} steps={} looping={}",
            color,
            steps.len(),
            looping
        );
        self.color = color;
        self.steps = steps;
        self.looping = looping;
        self.index = 0;
        self.finished = false;
        self.enabled = true;
        self.muted = false;
        self.switch(true, now);
    }

    fn remaining(&self, now: Instant) -> Duration {
        let Some(step) = self.steps.get(self.index) else {
            return Duration::ZERO;
        };
        let segment = if self.lit { step.on } else { step.off };
        segment.saturating_sub(now.wrapping_duration_since(self.last_change))
    }

    fn finish(&mut self, now: Instant) {
        self.switch(false, now);
        self.finished = true;
        debug!("led: pattern finished");
    }

    fn switch(&mut self, lit: bool, now: Instant) {
        self.lit = lit;
        self.last_change = now;
        self.write_current();
    }

    fn write_current(&mut self) {
        let color = if self.lit { self.color } else { Rgb::OFF };
        self.output.set_color(color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb = Rgb::from_hex(0xFF_00_00);

    #[derive(Default)]
    struct MockLed {
        current: Rgb,
        writes: usize,
    }

    impl RgbOutput for MockLed {
        fn set_color(&mut self, color: Rgb) {
            self.current = color;
            self.writes += 1;
        }
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn at(value: u32) -> Instant {
        Instant::from_millis(value)
    }

    #[test]
    fn looping_pattern_walks_on_off_tables() {
        let mut led = LedPatternDriver::new(MockLed::default());
        led.set_pattern(RED, &[ms(1_000), ms(1_000)], &[ms(1_000), ms(4_000)], true, at(0))
            .expect("valid pattern");
        assert_eq!(led.state(), LedState::On);
        assert_eq!(led.output().current, RED);

        assert_eq!(led.update_led_status(at(400)), ms(600));
        assert_eq!(led.state(), LedState::On);

        assert_eq!(led.update_led_status(at(1_000)), ms(1_000));
        assert_eq!(led.state(), LedState::Off);
        assert_eq!(led.output().current, Rgb::OFF);

        assert_eq!(led.update_led_status(at(2_000)), ms(1_000));
        assert_eq!(led.state(), LedState::On);
        assert_eq!(led.step_index(), 1);

        assert_eq!(led.update_led_status(at(3_000)), ms(4_000));
        assert_eq!(led.state(), LedState::Off);

        assert_eq!(led.update_led_status(at(7_000)), ms(1_000));
        assert_eq!(led.step_index(), 0);
        assert_eq!(led.state(), LedState::On);
        assert_eq!(led.output().current, RED);
    }

    #[test]
    fn one_shot_pattern_finishes_dark() {
        let mut led = LedPatternDriver::new(MockLed::default());
        led.set_steps(RED, &[BlinkStep::millis(100, 100)], false, at(0))
            .expect("valid pattern");

        assert_eq!(led.update_led_status(at(100)), ms(100));
        assert_eq!(led.update_led_status(at(200)), Duration::ZERO);
        assert_eq!(led.update_led_status(at(200)), Duration::ZERO);
        assert_eq!(led.state(), LedState::Finished);
        assert_eq!(led.output().current, Rgb::OFF);

        let writes = led.output().writes;
        assert_eq!(led.update_led_status(at(10_000)), Duration::ZERO);
        assert_eq!(led.output().writes, writes, "finished driver must not touch hardware");
    }

    #[test]
    fn empty_pattern_finishes_on_first_tick() {
        let mut led = LedPatternDriver::new(MockLed::default());
        led.set_pattern(RED, &[], &[], true, at(0)).expect("empty lists are valid");

        assert_eq!(led.update_led_status(at(0)), Duration::ZERO);
        assert_eq!(led.state(), LedState::Finished);
        assert_eq!(led.output().current, Rgb::OFF);
    }

    #[test]
    fn mismatched_lists_are_rejected_without_side_effects() {
        let mut led = LedPatternDriver::new(MockLed::default());
        led.set_steps(RED, &[BlinkStep::millis(500, 500)], true, at(0))
            .expect("valid pattern");

        let error = led
            .set_pattern(Rgb::from_hex(0x00_FF_00), &[ms(1)], &[ms(1), ms(2)], true, at(10))
            .expect_err("length mismatch must be rejected");
        assert_eq!(error, PatternError::LengthMismatch { on: 1, off: 2 });
        assert_eq!(led.color(), RED);
        assert_eq!(led.steps().len(), 1);
    }

    #[test]
    fn oversized_pattern_is_rejected() {
        let mut led = LedPatternDriver::new(MockLed::default());
        let steps = [BlinkStep::millis(1, 1); MAX_PATTERN_STEPS + 1];

        assert_eq!(
            led.set_steps(RED, &steps, true, at(0)),
            Err(PatternError::TooManySteps(MAX_PATTERN_STEPS + 1))
        );
    }

    #[test]
    fn silence_darkens_for_one_call_and_resumes_pattern() {
        let mut led = LedPatternDriver::new(MockLed::default());
        led.set_steps(RED, &[BlinkStep::millis(1_000, 1_000)], true, at(0))
            .expect("valid pattern");

        led.silence();
        assert_eq!(led.output().current, Rgb::OFF);
        assert!(led.is_silenced());
        assert!(!led.is_lit());
        assert_eq!(led.state(), LedState::On);

        assert_eq!(led.update_led_status(at(300)), ms(700));
        assert_eq!(led.output().current, RED);
        assert!(led.is_lit());
    }

    #[test]
    fn disable_stops_stepping_until_enabled() {
        let mut led = LedPatternDriver::new(MockLed::default());
        led.set_steps(RED, &[BlinkStep::millis(1_000, 1_000)], true, at(0))
            .expect("valid pattern");

        led.disable();
        assert_eq!(led.state(), LedState::Disabled);
        assert_eq!(led.output().current, Rgb::OFF);
        assert_eq!(led.update_led_status(at(5_000)), Duration::ZERO);
        assert_eq!(led.output().current, Rgb::OFF);

        assert_eq!(led.enable(at(500)), ms(500));
        assert_eq!(led.state(), LedState::On);
        assert_eq!(led.output().current, RED);
    }

    #[test]
    fn segment_timing_survives_clock_wrap() {
        let mut led = LedPatternDriver::new(MockLed::default());
        let start = Instant::from_millis(u32::MAX - 199);
        led.set_steps(RED, &[BlinkStep::millis(500, 500)], true, start)
            .expect("valid pattern");

        assert_eq!(led.update_led_status(start + ms(300)), ms(200));
        assert_eq!(led.update_led_status(start + ms(500)), ms(500));
        assert_eq!(led.state(), LedState::Off);
    }

    #[test]
    fn hex_colors_decode_per_channel() {
        assert_eq!(Rgb::from_hex(0xFF_99_00), Rgb::new(0xFF, 0x99, 0x00));
        assert!(Rgb::from_hex(0).is_off());
    }
}
