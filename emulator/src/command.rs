//! Line grammar for the emulator REPL, built from `winnow` combinators.

use std::fmt;
use std::time::Duration;

use alert_core::notification::SensorType;
use winnow::ascii::{Caseless, dec_uint, multispace0};
use winnow::combinator::{alt, empty, preceded, repeat, terminated};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take_while;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "sensor",
        "sensor <name> <nothing|low|high|0-2>  - publish a debounced validity code",
    ),
    (
        "pairing",
        "pairing <on|off>                      - toggle pairing mode",
    ),
    (
        "notify",
        "notify <priority>                     - queue a plain notification",
    ),
    (
        "silence",
        "silence [duration]                    - press the silence button",
    ),
    (
        "advance",
        "advance <duration>                    - run the alert loop for a while",
    ),
    (
        "melody",
        "melody                                - play the pairing-success melody",
    ),
    (
        "status",
        "status                                - show queue, LED and silence state",
    ),
    (
        "help",
        "help [topic]                          - show help for a command",
    ),
];

/// Parsed REPL command.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command {
    Sensor { sensor: SensorType, raw: u8 },
    Pairing(bool),
    Notify(u8),
    Silence(Option<Duration>),
    Advance(Duration),
    Melody,
    Status,
    Help(Option<&'static str>),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParseError {
    UnknownCommand(String),
    UnknownSensor(String),
    UnknownTopic(String),
    MissingArgument(&'static str),
    InvalidValue { argument: &'static str, value: String },
    TrailingInput(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnknownCommand(word) => write!(f, "unknown command `{word}`"),
            ParseError::UnknownSensor(word) => write!(f, "unknown sensor `{word}`"),
            ParseError::UnknownTopic(word) => write!(f, "no help for `{word}`"),
            ParseError::MissingArgument(name) => write!(f, "missing <{name}>"),
            ParseError::InvalidValue { argument, value } => {
                write!(f, "invalid <{argument}> `{value}`")
            }
            ParseError::TrailingInput(rest) => write!(f, "unexpected `{rest}`"),
        }
    }
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let words = split_words
            .parse(line)
            .map_err(|_| ParseError::MissingArgument("command"))?;
        let mut words = words.into_iter();
        let Some(head) = words.next() else {
            return Err(ParseError::MissingArgument("command"));
        };
        let keyword = command_keyword
            .parse(head)
            .map_err(|_| ParseError::UnknownCommand(head.to_string()))?;

        let command = match keyword {
            Keyword::Sensor => {
                let name = words.next().ok_or(ParseError::MissingArgument("name"))?;
                let sensor = SensorType::from_label(name)
                    .ok_or_else(|| ParseError::UnknownSensor(name.to_string()))?;
                let value = words.next().ok_or(ParseError::MissingArgument("validity"))?;
                Command::Sensor {
                    sensor,
                    raw: argument(validity, "validity", value)?,
                }
            }
            Keyword::Pairing => {
                let value = words.next().ok_or(ParseError::MissingArgument("on|off"))?;
                Command::Pairing(argument(switch, "on|off", value)?)
            }
            Keyword::Notify => {
                let value = words.next().ok_or(ParseError::MissingArgument("priority"))?;
                Command::Notify(argument(dec_uint, "priority", value)?)
            }
            Keyword::Silence => Command::Silence(words.next().map(parse_duration).transpose()?),
            Keyword::Advance => {
                let value = words.next().ok_or(ParseError::MissingArgument("duration"))?;
                Command::Advance(parse_duration(value)?)
            }
            Keyword::Melody => Command::Melody,
            Keyword::Status => Command::Status,
            Keyword::Help => Command::Help(words.next().map(help_topic).transpose()?),
        };

        let rest: Vec<&str> = words.collect();
        if rest.is_empty() {
            Ok(command)
        } else {
            Err(ParseError::TrailingInput(rest.join(" ")))
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Keyword {
    Sensor,
    Pairing,
    Notify,
    Silence,
    Advance,
    Melody,
    Status,
    Help,
}

/// Runs `parser` over a whole word, reporting `argument` on failure.
fn argument<'a, O>(
    mut parser: impl Parser<&'a str, O, ErrMode<ContextError>>,
    argument: &'static str,
    value: &'a str,
) -> Result<O, ParseError> {
    parser.parse(value).map_err(|_| ParseError::InvalidValue {
        argument,
        value: value.to_string(),
    })
}

/// Parses `250`, `250ms`, `2s` or `5m`. Bare numbers are milliseconds.
pub fn parse_duration(value: &str) -> Result<Duration, ParseError> {
    argument(duration, "duration", value)
}

fn split_words<'a>(input: &mut &'a str) -> ModalResult<Vec<&'a str>> {
    preceded(multispace0, repeat(0.., terminated(word, multispace0))).parse_next(input)
}

fn word<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| !c.is_whitespace()).parse_next(input)
}

fn command_keyword(input: &mut &str) -> ModalResult<Keyword> {
    alt((
        Caseless("sensor").value(Keyword::Sensor),
        Caseless("pairing").value(Keyword::Pairing),
        Caseless("notify").value(Keyword::Notify),
        Caseless("silence").value(Keyword::Silence),
        Caseless("advance").value(Keyword::Advance),
        Caseless("melody").value(Keyword::Melody),
        Caseless("status").value(Keyword::Status),
        Caseless("help").value(Keyword::Help),
    ))
    .parse_next(input)
}

/// Validity name or raw code. Out-of-range codes pass through so the handler
/// can reject them.
fn validity(input: &mut &str) -> ModalResult<u8> {
    alt((
        alt((Caseless("nothing"), Caseless("ok"))).value(0),
        Caseless("low").value(1),
        Caseless("high").value(2),
        dec_uint,
    ))
    .parse_next(input)
}

fn switch(input: &mut &str) -> ModalResult<bool> {
    alt((
        alt((Caseless("on"), "1", Caseless("true"))).value(true),
        alt((Caseless("off"), "0", Caseless("false"))).value(false),
    ))
    .parse_next(input)
}

fn duration(input: &mut &str) -> ModalResult<Duration> {
    (amount, unit_scale)
        .verify_map(|(amount, scale)| amount.checked_mul(scale).map(Duration::from_millis))
        .parse_next(input)
}

fn amount(input: &mut &str) -> ModalResult<u64> {
    dec_uint.parse_next(input)
}

/// Milliseconds per unit; `ms` has to be tried before `m`.
fn unit_scale(input: &mut &str) -> ModalResult<u64> {
    alt((
        Caseless("ms").value(1),
        Caseless("s").value(1_000),
        Caseless("m").value(60_000),
        empty.value(1),
    ))
    .parse_next(input)
}

fn help_topic(word: &str) -> Result<&'static str, ParseError> {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .find(|name| name.eq_ignore_ascii_case(word))
        .ok_or_else(|| ParseError::UnknownTopic(word.to_string()))
}
