use alert_core::config::AlertConfig;
use alert_core::handler::AlertHandler;
use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;

use crate::hw::{self, PwmBuzzer, StatusLed};
use crate::status::AlertInputs;

mod alert_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Handler type owned by the alert task.
pub type StationAlerts = AlertHandler<StatusLed, PwmBuzzer>;

/// Input latch written by the sensor, pairing and button tasks.
pub static INPUTS: AlertInputs = AlertInputs::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA6,
        PA7,
        PB0,
        TIM2,
        TIM3,
        ..
    } = hal::init(config);

    let led = hw::status_led(TIM3, PA6, PA7, PB0);
    let buzzer = PwmBuzzer::new(TIM2, PA0);
    let alerts: StationAlerts = AlertHandler::new(AlertConfig::DEFAULT, led, buzzer);

    spawner
        .spawn(alert_task::run(alerts, &INPUTS))
        .expect("failed to spawn alert task");

    core::future::pending::<()>().await;
}
