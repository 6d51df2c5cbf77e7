//! Board wiring for the RGB status LED and the piezo buzzer.
//!
//! The LED sits on TIM3 channels 1-3 (PA6 red, PA7 green, PB0 blue) and the
//! buzzer on TIM2 channel 1 (PA0). Both are driven push-pull through the
//! STM32 timers; `alert-core` only ever sees the [`RgbOutput`] and
//! [`ToneOutput`] traits.

#![cfg(target_os = "none")]

use core::convert::Infallible;

use alert_core::led::PwmRgbLed;
use alert_core::tone::ToneOutput;
use embassy_stm32::Peri;
use embassy_stm32::gpio::OutputType;
use embassy_stm32::peripherals::{PA0, PA6, PA7, PB0, TIM2, TIM3};
use embassy_stm32::time::{Hertz, khz};
use embassy_stm32::timer::low_level::CountingMode;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm, SimplePwmChannel};
use embassy_time::Instant as EmbassyInstant;

use crate::alerts::{ToneWindow, alert_instant};

/// LED PWM carrier; well above flicker.
const LED_PWM_FREQUENCY_KHZ: u32 = 1;
/// Buzzer carrier before the first tone reprograms it.
const BUZZER_IDLE_FREQUENCY_KHZ: u32 = 3;

pub type StatusLed = PwmRgbLed<
    SimplePwmChannel<'static, TIM3>,
    SimplePwmChannel<'static, TIM3>,
    SimplePwmChannel<'static, TIM3>,
>;

/// Builds the three-channel LED adapter.
pub fn status_led(
    timer: Peri<'static, TIM3>,
    red: Peri<'static, PA6>,
    green: Peri<'static, PA7>,
    blue: Peri<'static, PB0>,
) -> StatusLed {
    let pwm = SimplePwm::new(
        timer,
        Some(PwmPin::new(red, OutputType::PushPull)),
        Some(PwmPin::new(green, OutputType::PushPull)),
        Some(PwmPin::new(blue, OutputType::PushPull)),
        None,
        khz(LED_PWM_FREQUENCY_KHZ),
        CountingMode::EdgeAlignedUp,
    );
    let channels = pwm.split();
    let (mut red, mut green, mut blue) = (channels.ch1, channels.ch2, channels.ch3);
    red.enable();
    green.enable();
    blue.enable();
    PwmRgbLed::new(red, green, blue)
}

/// Piezo on a PWM channel at 50 % duty; the carrier sets the pitch.
pub struct PwmBuzzer {
    pwm: SimplePwm<'static, TIM2>,
    window: ToneWindow,
}

impl PwmBuzzer {
    pub fn new(timer: Peri<'static, TIM2>, pin: Peri<'static, PA0>) -> Self {
        let mut pwm = SimplePwm::new(
            timer,
            Some(PwmPin::new(pin, OutputType::PushPull)),
            None,
            None,
            None,
            khz(BUZZER_IDLE_FREQUENCY_KHZ),
            CountingMode::EdgeAlignedUp,
        );
        pwm.ch1().disable();
        Self {
            pwm,
            window: ToneWindow::new(),
        }
    }

    /// Switches the buzzer off once the running tone has played out.
    pub fn service(&mut self, now: EmbassyInstant) -> Option<core::time::Duration> {
        let now = alert_instant(now);
        if self.window.expire(now) {
            self.pwm.ch1().disable();
        }
        self.window.remaining(now)
    }
}

impl ToneOutput for PwmBuzzer {
    type Error = Infallible;

    fn start(
        &mut self,
        frequency_hz: u32,
        duration: core::time::Duration,
    ) -> Result<(), Self::Error> {
        self.pwm.set_frequency(Hertz(frequency_hz));
        let mut channel = self.pwm.ch1();
        channel.set_duty_cycle_percent(50);
        channel.enable();
        self.window.open(alert_instant(EmbassyInstant::now()), duration);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Self::Error> {
        self.pwm.ch1().disable();
        self.window.close();
        Ok(())
    }
}
