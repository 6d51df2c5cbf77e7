#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Input latch shared between the alert task and its collaborators.
//!
//! The sensor, pairing and button handling live in other tasks. They publish
//! into an [`AlertInputs`] through lock-free atomics and poke a signal so the
//! alert task wakes up early instead of waiting out its current delay.

use alert_core::notification::{SENSOR_COUNT, SensorType, Validity};
use embassy_sync::blocking_mutex::raw::RawMutex;
#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::signal::Signal;
use portable_atomic::{AtomicBool, AtomicU8, Ordering};

#[cfg(target_os = "none")]
pub type InputMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
pub type InputMutex = NoopRawMutex;

/// Latest inputs for the alert handler.
pub struct AlertInputs<M: RawMutex = InputMutex> {
    /// Raw validity codes, always one of the [`Validity`] encodings.
    validity: [AtomicU8; SENSOR_COUNT],
    pairing: AtomicBool,
    silence_requested: AtomicBool,
    melody_requested: AtomicBool,
    changed: Signal<M, ()>,
}

impl<M: RawMutex> AlertInputs<M> {
    pub const fn new() -> Self {
        Self {
            validity: [const { AtomicU8::new(0) }; SENSOR_COUNT],
            pairing: AtomicBool::new(false),
            silence_requested: AtomicBool::new(false),
            melody_requested: AtomicBool::new(false),
            changed: Signal::new(),
        }
    }

    /// Publishes the debounced validity of `sensor`.
    pub fn record_validity(&self, sensor: SensorType, validity: Validity) {
        let raw = validity.to_raw();
        if self.validity[sensor.as_index()].swap(raw, Ordering::Relaxed) != raw {
            self.changed.signal(());
        }
    }

    /// Publishes a raw validity code; codes outside the known set are dropped.
    pub fn record_validity_raw(&self, sensor: SensorType, raw: u8) -> bool {
        match Validity::try_from(raw) {
            Ok(validity) => {
                self.record_validity(sensor, validity);
                true
            }
            Err(invalid) => {
                log_invalid_validity(sensor, invalid.0);
                false
            }
        }
    }

    pub fn record_pairing(&self, active: bool) {
        if self.pairing.swap(active, Ordering::Relaxed) != active {
            self.changed.signal(());
        }
    }

    /// Latches a silence button press until the alert task consumes it.
    pub fn request_silence(&self) {
        self.silence_requested.store(true, Ordering::Relaxed);
        self.changed.signal(());
    }

    /// Latches a request to play the pairing-success melody.
    pub fn request_pairing_melody(&self) {
        self.melody_requested.store(true, Ordering::Relaxed);
        self.changed.signal(());
    }

    pub fn validity(&self, sensor: SensorType) -> Validity {
        let raw = self.validity[sensor.as_index()].load(Ordering::Relaxed);
        Validity::try_from(raw).unwrap_or_default()
    }

    pub fn pairing(&self) -> bool {
        self.pairing.load(Ordering::Relaxed)
    }

    /// Returns and clears a pending silence request.
    pub fn take_silence_request(&self) -> bool {
        self.silence_requested.swap(false, Ordering::Relaxed)
    }

    /// Returns and clears a pending melody request.
    pub fn take_melody_request(&self) -> bool {
        self.melody_requested.swap(false, Ordering::Relaxed)
    }

    /// Waits until any input changes.
    pub async fn changed(&self) {
        self.changed.wait().await;
    }

    /// Returns `true` when a change is pending and clears it.
    pub fn take_change(&self) -> bool {
        self.changed.try_take().is_some()
    }
}

impl<M: RawMutex> Default for AlertInputs<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "none")]
fn log_invalid_validity(sensor: SensorType, raw: u8) {
    defmt::warn!("status: dropping validity code {} for {}", raw, sensor);
}

#[cfg(not(target_os = "none"))]
fn log_invalid_validity(sensor: SensorType, raw: u8) {
    println!("status: dropping validity code {raw} for {sensor}");
}
