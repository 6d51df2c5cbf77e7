mod command;
mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use alert_core::config::AlertConfig;
use session::Session;

const USAGE: &str = "Usage: station-emulator [--verbose] [--transcript <path>]";

struct Options {
    transcript: Option<PathBuf>,
    verbose: bool,
}

fn main() -> io::Result<()> {
    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let level = if options.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let app_name = env!("CARGO_PKG_NAME").replace('-', "_");
            format!("{app_name}={level},alert_core={level}").into()
        }))
        .init();

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(AlertConfig::DEFAULT, options.transcript.as_deref())?;
    let mut line = String::new();
    tracing::info!(transcript = ?options.transcript, "emulator session started");

    writeln!(
        writer,
        "Sensor station alert emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options {
        transcript: None,
        verbose: false,
    };
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--transcript=") {
            options.transcript = Some(PathBuf::from(value));
        } else if arg == "--transcript" {
            let value = args
                .next()
                .ok_or_else(|| "Expected value after --transcript".to_string())?;
            options.transcript = Some(PathBuf::from(value));
        } else if arg == "--verbose" || arg == "-v" {
            options.verbose = true;
        } else {
            return Err(format!("Unknown argument `{arg}`"));
        }
    }
    Ok(options)
}
