use std::num::IntErrorKind;

use crate::core::lib::{ElectronError, ElectronResult};

pub const EXIT_COMMANDS: [&str; 6] = ["q", "quit", "exit", "bye", "close", "stop"];

/// Words the line editor offers for completion.
pub const COMMAND_WORDS: [&str; 8] = [
    "history", "help", "q", "quit", "exit", "bye", "close", "stop",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Exit,
    Help,
    /// `None` shows the full history, `Some(n)` the last `n` records.
    History(Option<usize>),
    Query(String),
}

pub fn parse(input: &str) -> ElectronResult<Command> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Command::Empty);
    }

    let lowered = input.to_lowercase();
    if EXIT_COMMANDS.contains(&lowered.as_str()) {
        return Ok(Command::Exit);
    }
    if lowered == "help" {
        return Ok(Command::Help);
    }

    let mut words = lowered.split_whitespace();
    if words.next() == Some("history") {
        let args: Vec<&str> = words.collect();
        return match args.as_slice() {
            [] => Ok(Command::History(None)),
            [n] => match n.parse::<usize>() {
                Ok(n) if n > 0 => Ok(Command::History(Some(n))),
                // More records than can ever exist.
                Err(e) if *e.kind() == IntErrorKind::PosOverflow => Ok(Command::History(None)),
                _ => Err(history_usage(n)),
            },
            _ => Err(history_usage(&args.join(" "))),
        };
    }

    Ok(Command::Query(input.to_string()))
}

fn history_usage(arg: &str) -> ElectronError {
    ElectronError::CommandParseError(format!(
        "'{}' is not a valid argument for history. Please provide a positive number.",
        arg
    ))
}
