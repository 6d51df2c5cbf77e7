//! Alert dispatch.
//!
//! [`AlertHandler`] turns debounced sensor validity codes and the pairing flag
//! into queued notifications, then drives the LED and buzzer for whichever
//! notification currently ranks highest. It is polled: the owning loop feeds
//! inputs, calls [`AlertHandler::update`] and sleeps for at most the returned
//! delay before calling it again.

use core::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::config::AlertConfig;
use crate::fmt::{debug, error, info, trace, warn};
use crate::led::{LedPatternDriver, LedState, RgbOutput};
use crate::notification::{InvalidValidity, Notification, SENSOR_COUNT, SensorType, Validity};
use crate::queue::{DEFAULT_QUEUE_CAPACITY, NotificationQueue, QueueFull};
use crate::time::{Instant, millis_u32};
use crate::tone::{ToneDriver, ToneOutput};

/// When the handler wants to be polled again.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NextUpdate {
    /// Nothing to display; poll at the normal loop interval.
    Idle,
    /// Poll again once this much time has passed. Zero means right away.
    In(Duration),
}

impl NextUpdate {
    /// Requested delay, or `None` when idle.
    #[must_use]
    pub const fn delay(self) -> Option<Duration> {
        match self {
            NextUpdate::Idle => None,
            NextUpdate::In(delay) => Some(delay),
        }
    }

    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, NextUpdate::Idle)
    }
}

/// Notification queue plus the LED and buzzer it is rendered on.
pub struct AlertHandler<L, T, const N: usize = DEFAULT_QUEUE_CAPACITY> {
    config: AlertConfig,
    queue: NotificationQueue<N>,
    led: LedPatternDriver<L>,
    tone: ToneDriver<T>,
    previous_displayed: Option<Notification>,
    validity: [Validity; SENSOR_COUNT],
    pairing_active: bool,
    silence: Option<Silence>,
    last_tone_at: Option<Instant>,
}

/// Active silence request, kept as a start plus a length so that expiry is
/// judged on elapsed time.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Silence {
    since: Instant,
    length: Duration,
}

impl Silence {
    /// Time left, or `None` once `length` has elapsed.
    fn remaining(self, now: Instant) -> Option<Duration> {
        self.length
            .checked_sub(now.wrapping_duration_since(self.since))
            .filter(|remaining| !remaining.is_zero())
    }
}

impl<L: RgbOutput, T: ToneOutput, const N: usize> AlertHandler<L, T, N> {
    /// Creates a handler with an empty queue and every sensor in band.
    pub fn new(config: AlertConfig, led: L, tone: T) -> Self {
        Self {
            queue: NotificationQueue::new(),
            led: LedPatternDriver::new(led),
            tone: ToneDriver::new(tone, config.sound_enabled),
            previous_displayed: None,
            validity: [Validity::Nothing; SENSOR_COUNT],
            pairing_active: false,
            silence: None,
            last_tone_at: None,
            config,
        }
    }

    /// Queues an arbitrary notification.
    ///
    /// # Errors
    ///
    /// Returns [`QueueFull`] when the queue has no room left.
    pub fn add_notification(&mut self, notification: Notification) -> Result<(), QueueFull> {
        self.queue.add(notification).map(|top| {
            trace!("alert: queued {:?}, top is {:?}", notification, top);
        })
    }

    /// Records a new validity code for `sensor`.
    ///
    /// Repeating the current code is a no-op. A change first withdraws the
    /// sensor's previous error, then queues a new one unless the reading is
    /// back in band. Any change ends silent mode.
    pub fn update_validity(&mut self, sensor: SensorType, validity: Validity) {
        let index = sensor.as_index();
        let previous = self.validity[index];
        if validity == previous {
            return;
        }

        if previous != Validity::Nothing {
            let removed = self.queue.remove_by_sensor(sensor);
            trace!("alert: withdrew {} errors for {:?}", removed, sensor);
        }
        self.validity[index] = validity;
        self.end_silence();

        let Some(status) = validity.status() else {
            info!("alert: {:?} back in band", sensor);
            return;
        };
        let priority = self.config.priority(sensor, status);
        info!("alert: {:?} out of band ({:?})", sensor, status);
        self.enqueue(Notification::sensor_error(sensor, status, priority));
    }

    /// Raw-code variant of [`Self::update_validity`].
    ///
    /// # Errors
    ///
    /// Returns [`InvalidValidity`] for codes other than 0, 1 or 2; the handler
    /// state is left untouched.
    pub fn update_validity_raw(
        &mut self,
        sensor: SensorType,
        raw: u8,
    ) -> Result<(), InvalidValidity> {
        match Validity::try_from(raw) {
            Ok(validity) => {
                self.update_validity(sensor, validity);
                Ok(())
            }
            Err(invalid) => {
                warn!("alert: ignoring validity code {} for {:?}", raw, sensor);
                Err(invalid)
            }
        }
    }

    /// Tracks the pairing mode flag and raises or withdraws its notification
    /// on each edge. Any change ends silent mode.
    pub fn update_pairing(&mut self, active: bool) {
        if active == self.pairing_active {
            return;
        }
        self.pairing_active = active;
        self.end_silence();

        let notification = Notification::plain(self.config.pairing_priority);
        if active {
            info!("alert: pairing mode on");
            self.enqueue(notification);
        } else {
            info!("alert: pairing mode off");
            self.queue.remove_matching(&notification);
        }
    }

    /// Mutes the outputs until `now + duration` and runs one update.
    pub fn silence(&mut self, duration: Duration, now: Instant) -> NextUpdate {
        info!("alert: silenced for {} ms", millis_u32(duration));
        self.silence = Some(Silence {
            since: now,
            length: duration,
        });
        self.update(now)
    }

    /// Renders the top notification and returns when to call again.
    pub fn update(&mut self, now: Instant) -> NextUpdate {
        if self.silence.is_some_and(|silence| silence.remaining(now).is_none()) {
            debug!("alert: silence expired");
            self.silence = None;
        }

        let Some(top) = self.queue.peek().copied() else {
            if self.previous_displayed.take().is_some() {
                debug!("alert: queue drained");
            }
            self.led.disable();
            return NextUpdate::Idle;
        };

        if self.config.always_silent {
            self.silence = Some(Silence {
                since: now,
                length: self.config.silence_duration,
            });
        }
        if let Some(remaining) = self.silence.and_then(|silence| silence.remaining(now)) {
            self.led.silence();
            return NextUpdate::In(remaining);
        }

        if top.is_sensor_error() && self.tone_due(now) {
            let tone = self.config.tone;
            self.tone.start_tone(tone.frequency_hz, tone.duration);
            self.last_tone_at = Some(now);
        }

        if self.previous_displayed != Some(top) && !self.display(top, now) {
            return NextUpdate::Idle;
        }

        let delay = self.led.update_led_status(now);
        // Patterns load looping, so only an empty one finishes. Nothing is left to time.
        match self.led.state() {
            LedState::Finished | LedState::Disabled => NextUpdate::Idle,
            LedState::On | LedState::Off => NextUpdate::In(delay),
        }
    }

    /// Plays the configured melody, blocking on `delay` until it ends.
    pub fn play_melody<D: DelayNs>(&mut self, delay: &mut D) {
        self.tone
            .play_melody(self.config.melody, self.config.melody_gap, delay);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns `true` while a silence request is in effect.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.silence.is_some()
    }

    #[must_use]
    pub fn validity(&self, sensor: SensorType) -> Validity {
        self.validity[sensor.as_index()]
    }

    #[must_use]
    pub fn is_pairing(&self) -> bool {
        self.pairing_active
    }

    /// Notification whose pattern is currently programmed on the LED.
    #[must_use]
    pub fn displayed(&self) -> Option<&Notification> {
        self.previous_displayed.as_ref()
    }

    #[must_use]
    pub fn last_tone_at(&self) -> Option<Instant> {
        self.last_tone_at
    }

    #[must_use]
    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    #[must_use]
    pub fn queue(&self) -> &NotificationQueue<N> {
        &self.queue
    }

    #[must_use]
    pub fn led(&self) -> &LedPatternDriver<L> {
        &self.led
    }

    #[must_use]
    pub fn tone(&self) -> &ToneDriver<T> {
        &self.tone
    }

    /// Buzzer access for outputs that need servicing between updates.
    pub fn tone_mut(&mut self) -> &mut ToneDriver<T> {
        &mut self.tone
    }

    fn enqueue(&mut self, notification: Notification) {
        if let Err(QueueFull(rejected)) = self.add_notification(notification) {
            warn!("alert: queue full, dropped {:?}", rejected);
        }
    }

    fn end_silence(&mut self) {
        if self.silence.take().is_some() {
            debug!("alert: input change ends silence");
        }
    }

    fn tone_due(&self, now: Instant) -> bool {
        let interval = self.config.tone.interval;
        self.last_tone_at
            .is_none_or(|last| now.wrapping_duration_since(last) >= interval)
    }

    /// Programs the LED for `notification`. Returns `false` when the pattern
    /// was rejected and the LED has been switched off instead.
    fn display(&mut self, notification: Notification, now: Instant) -> bool {
        let (color, steps) = match notification {
            Notification::Plain { .. } => (self.config.pairing_color, self.config.pairing_blink),
            Notification::SensorError(error) => (
                self.config.color(error.sensor),
                self.config.blink_steps(error.status),
            ),
        };

        match self.led.set_steps(color, steps, true, now) {
            Ok(()) => {
                debug!("alert: displaying {:?}", notification);
                self.previous_displayed = Some(notification);
                true
            }
            Err(rejected) => {
                error!("alert: blink pattern rejected: {:?}", rejected);
                self.previous_displayed = None;
                self.led.disable();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::led::Rgb;
    use crate::notification::ErrorStatus;

    #[derive(Default)]
    struct Led {
        current: Rgb,
    }

    impl RgbOutput for Led {
        fn set_color(&mut self, color: Rgb) {
            self.current = color;
        }
    }

    #[derive(Default)]
    struct Buzzer {
        beeps: usize,
    }

    impl ToneOutput for Buzzer {
        type Error = core::convert::Infallible;

        fn start(&mut self, _: u32, _: Duration) -> Result<(), Self::Error> {
            self.beeps += 1;
            Ok(())
        }
    }

    fn handler() -> AlertHandler<Led, Buzzer> {
        AlertHandler::new(AlertConfig::DEFAULT, Led::default(), Buzzer::default())
    }

    fn at(millis: u32) -> Instant {
        Instant::from_millis(millis)
    }

    #[test]
    fn empty_handler_is_idle_and_dark() {
        let mut alerts = handler();
        assert_eq!(alerts.update(at(0)), NextUpdate::Idle);
        assert_eq!(alerts.led().state(), LedState::Disabled);
        assert!(alerts.displayed().is_none());
    }

    #[test]
    fn finished_pattern_goes_idle_with_work_queued() {
        let config = AlertConfig {
            pairing_blink: &[],
            ..AlertConfig::DEFAULT
        };
        let mut alerts: AlertHandler<Led, Buzzer> = AlertHandler::new(config, Led::default(), Buzzer::default());
        alerts.update_pairing(true);

        assert_eq!(alerts.update(at(0)), NextUpdate::Idle);
        assert_eq!(alerts.led().state(), LedState::Finished);
        assert!(!alerts.is_empty());
    }

    #[test]
    fn validity_changes_replace_the_sensor_error() {
        let mut alerts = handler();
        alerts.update_validity(SensorType::SoilHumidity, Validity::High);
        alerts.update_validity(SensorType::SoilHumidity, Validity::High);
        assert_eq!(alerts.queue().len(), 1);

        alerts.update_validity(SensorType::SoilHumidity, Validity::Low);
        assert_eq!(alerts.queue().len(), 1);
        assert_eq!(
            alerts.queue().peek(),
            Some(&Notification::sensor_error(SensorType::SoilHumidity, ErrorStatus::Low, 50))
        );

        alerts.update_validity(SensorType::SoilHumidity, Validity::Nothing);
        assert!(alerts.is_empty());
    }

    #[test]
    fn raw_codes_outside_the_enum_are_ignored() {
        let mut alerts = handler();
        assert_eq!(
            alerts.update_validity_raw(SensorType::AirQuality, 7),
            Err(InvalidValidity(7))
        );
        assert!(alerts.is_empty());
        assert_eq!(alerts.validity(SensorType::AirQuality), Validity::Nothing);

        assert_eq!(alerts.update_validity_raw(SensorType::AirQuality, 2), Ok(()));
        assert_eq!(alerts.validity(SensorType::AirQuality), Validity::High);
    }

    #[test]
    fn sensor_error_lights_its_color_and_beeps() {
        let mut alerts = handler();
        alerts.update_validity(SensorType::AirTemperature, Validity::High);

        assert_eq!(alerts.update(at(0)), NextUpdate::In(Duration::from_millis(1_000)));
        assert_eq!(alerts.led().output().current, Rgb::from_hex(0xFF_00_00));
        assert_eq!(alerts.tone().output().beeps, 1);
        assert_eq!(alerts.last_tone_at(), Some(at(0)));
    }

    #[test]
    fn pairing_notification_does_not_beep() {
        let mut alerts = handler();
        alerts.update_pairing(true);

        assert_eq!(alerts.update(at(0)), NextUpdate::In(Duration::from_millis(1_000)));
        assert_eq!(alerts.led().color(), AlertConfig::DEFAULT.pairing_color);
        assert_eq!(alerts.tone().output().beeps, 0);

        alerts.update_pairing(false);
        assert!(alerts.is_empty());
        assert_eq!(alerts.update(at(10)), NextUpdate::Idle);
    }

    #[test]
    fn always_silent_keeps_outputs_muted() {
        let config = AlertConfig {
            always_silent: true,
            ..AlertConfig::DEFAULT
        };
        let mut alerts: AlertHandler<Led, Buzzer> =
            AlertHandler::new(config, Led::default(), Buzzer::default());
        alerts.update_validity(SensorType::AirPressure, Validity::Low);

        assert_eq!(alerts.update(at(0)), NextUpdate::In(config.silence_duration));
        assert_eq!(alerts.tone().output().beeps, 0);
        assert!(alerts.led().output().current.is_off());
    }

    #[test]
    fn next_update_accessors() {
        assert_eq!(NextUpdate::Idle.delay(), None);
        assert!(NextUpdate::Idle.is_idle());
        assert_eq!(NextUpdate::In(Duration::ZERO).delay(), Some(Duration::ZERO));
    }
}
