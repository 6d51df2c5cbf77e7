//! Station alert configuration.
//!
//! Everything the handler needs to turn a notification into light and sound
//! lives here as `const` data so the firmware can keep it in flash. Hosts and
//! tests start from [`AlertConfig::DEFAULT`] and override fields as needed.

use core::time::Duration;

use crate::led::{BlinkStep, Rgb};
use crate::notification::{ErrorStatus, SENSOR_COUNT, SensorType};
use crate::tone::Note;

/// Sensor error priorities, indexed by [`SensorType::as_index`], then
/// `[high, low]`.
pub const SENSOR_PRIORITIES: [[u8; 2]; SENSOR_COUNT] = [
    [51, 50], // soil humidity
    [31, 30], // light intensity
    [21, 20], // air humidity
    [41, 40], // air temperature
    [61, 60], // air quality
    [11, 10], // air pressure
];

/// LED colors per sensor, indexed by [`SensorType::as_index`].
pub const SENSOR_COLORS: [Rgb; SENSOR_COUNT] = [
    Rgb::from_hex(0x00_00_FF),
    Rgb::from_hex(0xFF_FF_00),
    Rgb::from_hex(0xFF_FF_FF),
    Rgb::from_hex(0xFF_00_00),
    Rgb::from_hex(0xFF_00_FF),
    Rgb::from_hex(0xFF_99_00),
];

/// Two beats: on, short pause, on, long off.
pub const HIGH_ERROR_BLINK: [BlinkStep; 2] =
    [BlinkStep::millis(1_000, 1_000), BlinkStep::millis(1_000, 4_000)];

/// One beat: on, long off.
pub const LOW_ERROR_BLINK: [BlinkStep; 1] = [BlinkStep::millis(1_000, 4_000)];

/// Two beats, looping while pairing mode is active.
pub const PAIRING_BLINK: [BlinkStep; 2] =
    [BlinkStep::millis(1_000, 1_000), BlinkStep::millis(1_000, 4_000)];

pub const PAIRING_COLOR: Rgb = Rgb::from_hex(0x00_FF_00);

pub const PAIRING_PRIORITY: u8 = 10;

/// Rising arpeggio played once a central finished pairing.
pub const PAIRING_SUCCESS_MELODY: [Note; 4] = [
    Note::new(2_093, Duration::from_millis(120)),
    Note::new(2_637, Duration::from_millis(120)),
    Note::new(3_136, Duration::from_millis(120)),
    Note::new(4_186, Duration::from_millis(240)),
];

/// Pause inserted after every melody note.
pub const MELODY_NOTE_GAP: Duration = Duration::from_millis(50);

/// Single warning beep emitted while a sensor error is on display.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ToneConfig {
    pub frequency_hz: u32,
    pub duration: Duration,
    /// Minimum time between two beeps.
    pub interval: Duration,
}

impl ToneConfig {
    pub const DEFAULT: Self = Self {
        frequency_hz: 3_000,
        duration: Duration::from_millis(100),
        interval: Duration::from_secs(15),
    };
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Tunables for [`crate::AlertHandler`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AlertConfig {
    pub sensor_priorities: [[u8; 2]; SENSOR_COUNT],
    pub sensor_colors: [Rgb; SENSOR_COUNT],
    pub high_error_blink: &'static [BlinkStep],
    pub low_error_blink: &'static [BlinkStep],
    pub pairing_priority: u8,
    pub pairing_color: Rgb,
    pub pairing_blink: &'static [BlinkStep],
    pub tone: ToneConfig,
    /// When `false` the buzzer never sounds.
    pub sound_enabled: bool,
    /// How long a silence request mutes the outputs.
    pub silence_duration: Duration,
    /// Keeps the handler in silent mode permanently; bench debugging aid.
    pub always_silent: bool,
    pub melody: &'static [Note],
    pub melody_gap: Duration,
}

impl AlertConfig {
    pub const DEFAULT: Self = Self {
        sensor_priorities: SENSOR_PRIORITIES,
        sensor_colors: SENSOR_COLORS,
        high_error_blink: &HIGH_ERROR_BLINK,
        low_error_blink: &LOW_ERROR_BLINK,
        pairing_priority: PAIRING_PRIORITY,
        pairing_color: PAIRING_COLOR,
        pairing_blink: &PAIRING_BLINK,
        tone: ToneConfig::DEFAULT,
        sound_enabled: true,
        silence_duration: Duration::from_secs(300),
        always_silent: false,
        melody: &PAIRING_SUCCESS_MELODY,
        melody_gap: MELODY_NOTE_GAP,
    };

    /// Queue priority of a sensor error.
    #[must_use]
    pub const fn priority(&self, sensor: SensorType, status: ErrorStatus) -> u8 {
        let [high, low] = self.sensor_priorities[sensor.as_index()];
        match status {
            ErrorStatus::High => high,
            ErrorStatus::Low => low,
        }
    }

    #[must_use]
    pub const fn color(&self, sensor: SensorType) -> Rgb {
        self.sensor_colors[sensor.as_index()]
    }

    /// Blink steps used for an error in the given direction.
    #[must_use]
    pub const fn blink_steps(&self, status: ErrorStatus) -> &'static [BlinkStep] {
        match status {
            ErrorStatus::High => self.high_error_blink,
            ErrorStatus::Low => self.low_error_blink,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
