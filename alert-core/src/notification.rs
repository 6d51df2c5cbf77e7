//! Notification data model shared by the queue and the alert handler.
//!
//! A [`Notification`] is either a plain status notice (pairing mode, for
//! instance) or a [`SensorError`] raised when one of the monitored quantities
//! leaves its configured band. Both carry an 8-bit priority; the category is
//! the primary sort key, so every plain notification outranks every sensor
//! error no matter the numeric priorities involved.

use core::cmp::Ordering;
use core::convert::TryFrom;
use core::fmt;

/// Number of monitored quantities.
pub const SENSOR_COUNT: usize = 6;

/// Sort precedence of plain notifications. Higher wins.
pub const NOTIFICATION_PRECEDENCE: u8 = 1;
/// Sort precedence of sensor errors. Higher wins.
pub const SENSOR_ERROR_PRECEDENCE: u8 = 0;

/// Quantities monitored by the station.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorType {
    SoilHumidity,
    LightIntensity,
    AirHumidity,
    AirTemperature,
    AirQuality,
    AirPressure,
}

impl SensorType {
    /// Every sensor in table order.
    pub const ALL: [SensorType; SENSOR_COUNT] = [
        SensorType::SoilHumidity,
        SensorType::LightIntensity,
        SensorType::AirHumidity,
        SensorType::AirTemperature,
        SensorType::AirQuality,
        SensorType::AirPressure,
    ];

    /// Deterministic index for per-sensor lookup tables.
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            SensorType::SoilHumidity => 0,
            SensorType::LightIntensity => 1,
            SensorType::AirHumidity => 2,
            SensorType::AirTemperature => 3,
            SensorType::AirQuality => 4,
            SensorType::AirPressure => 5,
        }
    }

    /// Attempts to construct a [`SensorType`] from a table index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(SensorType::SoilHumidity),
            1 => Some(SensorType::LightIntensity),
            2 => Some(SensorType::AirHumidity),
            3 => Some(SensorType::AirTemperature),
            4 => Some(SensorType::AirQuality),
            5 => Some(SensorType::AirPressure),
            _ => None,
        }
    }

    /// Short lowercase label used in logs and the emulator.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            SensorType::SoilHumidity => "soil-humidity",
            SensorType::LightIntensity => "light-intensity",
            SensorType::AirHumidity => "air-humidity",
            SensorType::AirTemperature => "air-temperature",
            SensorType::AirQuality => "air-quality",
            SensorType::AirPressure => "air-pressure",
        }
    }

    /// Parses a label produced by [`SensorType::label`].
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|sensor| sensor.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Direction in which a reading left its band.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorStatus {
    High,
    Low,
}

/// Debounced validity code reported by the sensor layer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Validity {
    /// Reading is within its band.
    #[default]
    Nothing,
    Low,
    High,
}

impl Validity {
    const NOTHING_CODE: u8 = 0;
    const LOW_CODE: u8 = 1;
    const HIGH_CODE: u8 = 2;

    /// Encodes the validity as the raw code used by the sensor layer.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            Validity::Nothing => Self::NOTHING_CODE,
            Validity::Low => Self::LOW_CODE,
            Validity::High => Self::HIGH_CODE,
        }
    }

    /// Error status represented by this code, if any.
    #[must_use]
    pub const fn status(self) -> Option<ErrorStatus> {
        match self {
            Validity::Nothing => None,
            Validity::Low => Some(ErrorStatus::Low),
            Validity::High => Some(ErrorStatus::High),
        }
    }
}

/// Raw validity code outside the three known values.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidValidity(pub u8);

impl fmt::Display for InvalidValidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validity code {} is out of range", self.0)
    }
}

impl TryFrom<u8> for Validity {
    type Error = InvalidValidity;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            Self::NOTHING_CODE => Ok(Validity::Nothing),
            Self::LOW_CODE => Ok(Validity::Low),
            Self::HIGH_CODE => Ok(Validity::High),
            other => Err(InvalidValidity(other)),
        }
    }
}

/// Coarse class of a notification, used as the primary sort key.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Category {
    Notification,
    SensorError,
}

impl Category {
    /// Sort precedence of the category; higher values are served first.
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Category::Notification => NOTIFICATION_PRECEDENCE,
            Category::SensorError => SENSOR_ERROR_PRECEDENCE,
        }
    }
}

/// Out-of-band reading for one monitored quantity.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorError {
    pub sensor: SensorType,
    pub status: ErrorStatus,
    pub priority: u8,
}

impl SensorError {
    #[must_use]
    pub const fn new(sensor: SensorType, status: ErrorStatus, priority: u8) -> Self {
        Self {
            sensor,
            status,
            priority,
        }
    }
}

/// Condition that may be signaled on the LED and buzzer.
///
/// Equality is structural: two sensor errors are equal only when priority,
/// sensor and status all match. Ordering (see [`Notification::cmp_rank`])
/// looks at category and priority alone.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notification {
    Plain { priority: u8 },
    SensorError(SensorError),
}

impl Notification {
    /// Creates a plain notification.
    #[must_use]
    pub const fn plain(priority: u8) -> Self {
        Notification::Plain { priority }
    }

    /// Creates a sensor error notification.
    #[must_use]
    pub const fn sensor_error(sensor: SensorType, status: ErrorStatus, priority: u8) -> Self {
        Notification::SensorError(SensorError::new(sensor, status, priority))
    }

    #[must_use]
    pub const fn category(&self) -> Category {
        match self {
            Notification::Plain { .. } => Category::Notification,
            Notification::SensorError(_) => Category::SensorError,
        }
    }

    #[must_use]
    pub const fn priority(&self) -> u8 {
        match self {
            Notification::Plain { priority } => *priority,
            Notification::SensorError(error) => error.priority,
        }
    }

    /// Returns the sensor error payload when this is a sensor error.
    #[must_use]
    pub const fn as_sensor_error(&self) -> Option<&SensorError> {
        match self {
            Notification::SensorError(error) => Some(error),
            Notification::Plain { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_sensor_error(&self) -> bool {
        matches!(self, Notification::SensorError(_))
    }

    /// Sort key: category precedence first, then priority.
    #[must_use]
    pub const fn rank(&self) -> (u8, u8) {
        (self.category().precedence(), self.priority())
    }

    /// Compares two notifications by rank only.
    #[must_use]
    pub fn cmp_rank(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }

    /// Returns `true` when `self` would be displayed ahead of `other`.
    #[must_use]
    pub fn outranks(&self, other: &Self) -> bool {
        self.cmp_rank(other) == Ordering::Greater
    }
}

impl From<SensorError> for Notification {
    fn from(error: SensorError) -> Self {
        Notification::SensorError(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_notifications_compare_by_priority() {
        let n1 = Notification::plain(7);
        let n2 = Notification::plain(3);
        let n3 = Notification::plain(3);

        assert!(n1.outranks(&n2));
        assert!(!n2.outranks(&n1));
        assert!(!n2.outranks(&n3));
        assert_ne!(n1, n2);
        assert_eq!(n2, n3);
    }

    #[test]
    fn category_outranks_numeric_priority() {
        let notice = Notification::plain(5);
        let error = Notification::sensor_error(SensorType::AirPressure, ErrorStatus::Low, 220);

        assert!(notice.outranks(&error));
        assert!(!error.outranks(&notice));
    }

    #[test]
    fn sensor_error_equality_includes_sensor_and_status() {
        let base = Notification::sensor_error(SensorType::SoilHumidity, ErrorStatus::High, 51);
        let other_status =
            Notification::sensor_error(SensorType::SoilHumidity, ErrorStatus::Low, 51);
        let other_sensor =
            Notification::sensor_error(SensorType::AirQuality, ErrorStatus::High, 51);

        assert_eq!(base, base);
        assert_ne!(base, other_status);
        assert_ne!(base, other_sensor);
        assert_eq!(base.cmp_rank(&other_sensor), Ordering::Equal);
        assert_ne!(base, Notification::plain(51));
    }

    #[test]
    fn validity_codes_round_trip_and_reject_out_of_range() {
        for validity in [Validity::Nothing, Validity::Low, Validity::High] {
            assert_eq!(Validity::try_from(validity.to_raw()), Ok(validity));
        }
        assert_eq!(Validity::try_from(3), Err(InvalidValidity(3)));
        assert_eq!(Validity::try_from(u8::MAX), Err(InvalidValidity(u8::MAX)));
    }

    #[test]
    fn sensor_index_and_label_lookup_are_consistent() {
        for (index, sensor) in SensorType::ALL.into_iter().enumerate() {
            assert_eq!(sensor.as_index(), index);
            assert_eq!(SensorType::from_index(index), Some(sensor));
            assert_eq!(SensorType::from_label(sensor.label()), Some(sensor));
        }
        assert_eq!(SensorType::from_index(SENSOR_COUNT), None);
        assert_eq!(SensorType::from_label("Air-Quality"), Some(SensorType::AirQuality));
    }
}
