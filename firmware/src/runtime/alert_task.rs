use embassy_futures::select::select;
use embassy_time::{Delay, Instant, Timer};

use super::StationAlerts;
use crate::alerts::{alert_instant, next_wake, service};
use crate::status::AlertInputs;

#[embassy_executor::task]
pub async fn run(mut alerts: StationAlerts, inputs: &'static AlertInputs) -> ! {
    defmt::info!("alerts: task started");
    let mut delay = Delay;

    loop {
        let now = Instant::now();
        let next = service(&mut alerts, inputs, alert_instant(now), &mut delay);
        let tone_remaining = alerts.tone_mut().output_mut().service(Instant::now());
        let wake = next_wake(next, tone_remaining);

        defmt::trace!("alerts: next pass in {}ms", wake.as_millis());
        select(Timer::after(wake), inputs.changed()).await;
    }
}
