use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use alert_core::config::AlertConfig;
use alert_core::handler::{AlertHandler, NextUpdate};
use alert_core::led::{Rgb, RgbOutput};
use alert_core::notification::{Notification, SensorType};
use alert_core::time::Instant;
use alert_core::tone::ToneOutput;
use embedded_hal::delay::DelayNs;

use crate::command::{Command, HELP_TOPICS};

/// Poll period the station loop uses while the handler is idle.
const IDLE_POLL: Duration = Duration::from_secs(1);
/// Smallest clock step, so a zero delay cannot stall `advance`.
const MIN_STEP: Duration = Duration::from_millis(1);

/// Simulated millisecond clock shared by the session and its outputs.
#[derive(Clone, Default)]
struct SimClock(Rc<Cell<Instant>>);

impl SimClock {
    fn now(&self) -> Instant {
        self.0.get()
    }

    fn set(&self, now: Instant) {
        self.0.set(now);
    }
}

/// Output lines produced by the fake hardware, stamped with the sim clock.
#[derive(Clone, Default)]
struct EventLog {
    clock: SimClock,
    lines: Rc<RefCell<Vec<String>>>,
}

impl EventLog {
    fn push(&self, message: String) {
        let stamp = self.clock.now().as_millis();
        self.lines
            .borrow_mut()
            .push(format!("[t={stamp:>8}ms] {message}"));
    }

    fn drain(&self) -> Vec<String> {
        self.lines.borrow_mut().drain(..).collect()
    }
}

struct ConsoleLed {
    log: EventLog,
    current: Option<Rgb>,
}

impl RgbOutput for ConsoleLed {
    fn set_color(&mut self, color: Rgb) {
        if self.current == Some(color) {
            return;
        }
        self.current = Some(color);
        if color.is_off() {
            self.log.push("led off".to_string());
        } else {
            self.log.push(format!("led on  {}", hex(color)));
        }
    }
}

struct ConsoleBuzzer {
    log: EventLog,
}

impl ToneOutput for ConsoleBuzzer {
    type Error = Infallible;

    fn start(&mut self, frequency_hz: u32, duration: Duration) -> Result<(), Self::Error> {
        self.log.push(format!(
            "buzzer {frequency_hz} Hz for {}ms",
            duration.as_millis()
        ));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Self::Error> {
        self.log.push("buzzer off".to_string());
        Ok(())
    }
}

/// Blocking delay that advances the simulated clock instead of sleeping.
struct SimDelay {
    clock: SimClock,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        let now = self.clock.now();
        self.clock
            .set(now + Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        let now = self.clock.now();
        self.clock.set(now + Duration::from_millis(u64::from(ms)));
    }
}

type EmulatedAlerts = AlertHandler<ConsoleLed, ConsoleBuzzer>;

pub struct Session {
    alerts: EmulatedAlerts,
    clock: SimClock,
    log: EventLog,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    /// Starts a session at t=0; `transcript` mirrors every line to a file.
    pub fn new(config: AlertConfig, transcript: Option<&Path>) -> io::Result<Self> {
        let clock = SimClock::default();
        let log = EventLog {
            clock: clock.clone(),
            lines: Rc::default(),
        };
        let led = ConsoleLed {
            log: log.clone(),
            current: None,
        };
        let buzzer = ConsoleBuzzer { log: log.clone() };
        let transcript = transcript.map(TranscriptLogger::new).transpose()?;

        Ok(Self {
            alerts: AlertHandler::new(config, led, buzzer),
            clock,
            log,
            transcript,
        })
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        self.record(TranscriptRole::Host, trimmed)?;

        let mut lines = match Command::parse(trimmed) {
            Ok(command) => {
                tracing::debug!(?command, "executing command");
                self.execute(command)
            }
            Err(err) => {
                tracing::debug!(%err, line = trimmed, "rejected command");
                vec![format!("ERR syntax {err}")]
            }
        };
        let mut events = self.log.drain();
        events.append(&mut lines);

        for line in &events {
            self.record(TranscriptRole::Emulator, line)?;
        }
        Ok(events)
    }

    fn execute(&mut self, command: Command) -> Vec<String> {
        let now = self.now();
        match command {
            Command::Sensor { sensor, raw } => {
                if let Err(err) = self.alerts.update_validity_raw(sensor, raw) {
                    return vec![format!("ERR {err}")];
                }
                let next = self.alerts.update(now);
                vec![format!(
                    "OK {sensor}={:?} {}",
                    self.alerts.validity(sensor),
                    describe_next(next)
                )]
            }
            Command::Pairing(active) => {
                self.alerts.update_pairing(active);
                let next = self.alerts.update(now);
                vec![format!("OK pairing={} {}", on_off(active), describe_next(next))]
            }
            Command::Notify(priority) => {
                if let Err(err) = self.alerts.add_notification(Notification::plain(priority)) {
                    return vec![format!("ERR {err}")];
                }
                let next = self.alerts.update(now);
                vec![format!("OK queued priority={priority} {}", describe_next(next))]
            }
            Command::Silence(duration) => {
                let duration = duration.unwrap_or(self.alerts.config().silence_duration);
                let next = self.alerts.silence(duration, now);
                vec![format!(
                    "OK silenced for {}ms {}",
                    duration.as_millis(),
                    describe_next(next)
                )]
            }
            Command::Advance(duration) => {
                let passes = self.advance(duration);
                vec![format!("OK advanced {}ms in {passes} passes", duration.as_millis())]
            }
            Command::Melody => {
                let mut delay = SimDelay {
                    clock: self.clock.clone(),
                };
                self.alerts.play_melody(&mut delay);
                vec![format!(
                    "OK melody finished at t={}ms",
                    self.now().as_millis()
                )]
            }
            Command::Status => self.status_lines(),
            Command::Help(topic) => help_lines(topic),
        }
    }

    /// Runs the station loop until `duration` of simulated time has passed.
    /// Returns how many handler passes ran.
    fn advance(&mut self, duration: Duration) -> usize {
        let target = self.now() + duration;
        let mut passes = 0;
        loop {
            let now = self.now();
            let next = self.alerts.update(now);
            passes += 1;

            let step = next.delay().unwrap_or(IDLE_POLL).max(MIN_STEP);
            let wake = now + step;
            if wake.signed_millis_since(target) > 0 {
                self.clock.set(target);
                return passes;
            }
            self.clock.set(wake);
        }
    }

    fn status_lines(&self) -> Vec<String> {
        let alerts = &self.alerts;
        let led = alerts.led();
        let mut lines = vec![
            format!("time      : {}ms", self.now().as_millis()),
            format!(
                "queue     : {}/{} top={}",
                alerts.queue().len(),
                alerts.queue().capacity(),
                alerts.queue().peek().copied().map_or_else(|| "-".to_string(), describe)
            ),
            format!(
                "displayed : {}",
                alerts.displayed().copied().map_or_else(|| "-".to_string(), describe)
            ),
            format!(
                "led       : {:?} color={} step={}",
                led.state(),
                hex(led.color()),
                led.step_index()
            ),
            format!(
                "silent    : {}  pairing: {}",
                yes_no(alerts.is_silent()),
                on_off(alerts.is_pairing())
            ),
        ];
        for sensor in SensorType::ALL {
            lines.push(format!("  {:<16}{:?}", sensor.label(), alerts.validity(sensor)));
        }
        lines
    }

    fn record(&mut self, role: TranscriptRole, line: &str) -> io::Result<()> {
        match self.transcript.as_mut() {
            Some(transcript) => transcript.append_line(self.clock.now(), role, line),
            None => Ok(()),
        }
    }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        writeln!(logger.writer, "# Sensor station alert emulator transcript")?;
        writeln!(logger.writer, "# Timestamps are simulated milliseconds")?;
        writeln!(logger.writer)?;
        logger.writer.flush()?;
        Ok(logger)
    }

    fn append_line(&mut self, now: Instant, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>8} ms] {} {}",
            now.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

fn help_lines(topic: Option<&'static str>) -> Vec<String> {
    match topic {
        Some(topic) => HELP_TOPICS
            .iter()
            .filter(|(name, _)| *name == topic)
            .map(|(_, usage)| (*usage).to_string())
            .collect(),
        None => {
            let names: Vec<&str> = HELP_TOPICS.iter().map(|(name, _)| *name).collect();
            vec![format!("Commands: {}", names.join(", "))]
        }
    }
}

fn describe(notification: Notification) -> String {
    match notification {
        Notification::Plain { priority } => format!("notification(p={priority})"),
        Notification::SensorError(error) => format!(
            "{}-{:?}(p={})",
            error.sensor, error.status, error.priority
        ),
    }
}

fn describe_next(next: NextUpdate) -> String {
    match next {
        NextUpdate::Idle => "next=idle".to_string(),
        NextUpdate::In(delay) => format!("next={}ms", delay.as_millis()),
    }
}

fn hex(color: Rgb) -> String {
    format!("#{:02X}{:02X}{:02X}", color.red, color.green, color.blue)
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(AlertConfig::DEFAULT, None).expect("session without transcript")
    }

    fn run(session: &mut Session, line: &str) -> Vec<String> {
        session.handle_command(line).expect("in-memory session")
    }

    #[test]
    fn sensor_error_lights_led_and_beeps() {
        let mut session = session();
        let lines = run(&mut session, "sensor air-temperature high");

        assert!(lines.iter().any(|line| line.ends_with("led on  #FF0000")), "{lines:?}");
        assert!(lines.iter().any(|line| line.contains("buzzer 3000 Hz")), "{lines:?}");
        assert!(lines.last().is_some_and(|line| line.starts_with("OK air-temperature=High")));
    }

    #[test]
    fn advance_walks_the_blink_pattern() {
        let mut session = session();
        run(&mut session, "sensor soil-humidity low");
        let lines = run(&mut session, "advance 5s");

        assert_eq!(session.now(), Instant::from_millis(5_000));
        assert!(lines.iter().any(|line| line.contains("t=    1000ms] led off")), "{lines:?}");
        assert!(lines.iter().any(|line| line.contains("t=    5000ms] led on")), "{lines:?}");
    }

    #[test]
    fn silence_mutes_until_expiry() {
        let mut session = session();
        run(&mut session, "sensor air-quality high");
        let lines = run(&mut session, "silence 5s");
        assert!(lines.iter().any(|line| line.contains("led off")), "{lines:?}");
        assert!(lines.last().is_some_and(|line| line.ends_with("next=5000ms")));

        run(&mut session, "advance 2s");
        let status = run(&mut session, "status");
        assert!(status.iter().any(|line| line.starts_with("silent    : yes")));

        run(&mut session, "advance 4s");
        let status = run(&mut session, "status");
        assert!(status.iter().any(|line| line.starts_with("silent    : no")));
    }

    #[test]
    fn invalid_validity_is_reported() {
        let mut session = session();
        let lines = run(&mut session, "sensor air-pressure 5");
        assert_eq!(lines, vec!["ERR validity code 5 is out of range".to_string()]);
    }

    #[test]
    fn melody_advances_the_clock() {
        let mut session = session();
        let lines = run(&mut session, "melody");

        let config = AlertConfig::DEFAULT;
        let notes = lines.iter().filter(|line| line.contains(" Hz for ")).count();
        let stops = lines.iter().filter(|line| line.ends_with("buzzer off")).count();
        assert_eq!(notes, config.melody.len());
        assert_eq!(stops, config.melody.len());
        let expected: Duration = config
            .melody
            .iter()
            .map(|note| note.duration + config.melody_gap)
            .sum();
        assert_eq!(session.now(), Instant::ZERO + expected);
    }

    #[test]
    fn syntax_errors_do_not_touch_state() {
        let mut session = session();
        let lines = run(&mut session, "sensor");
        assert_eq!(lines, vec!["ERR syntax missing <name>".to_string()]);
        let help = run(&mut session, "help");
        assert!(help.first().is_some_and(|line| line.starts_with("Commands:")));
    }
}
