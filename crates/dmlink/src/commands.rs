//! Console commands read from stdin
//!
//! One command per line:
//!
//! ```text
//! set <strip> <fader|pan|mute> <value>
//! toggle
//! show <strip>
//! label <strip> <text...>
//! monitor [count]
//! log on|off
//! ports
//! open in|out <port name...>
//! help
//! quit
//! ```
//!
//! Strips are written as one token: `ch3`, `channel3`, `bus12`, `aux1`,
//! `master` (or `main`).

use dmlink_midi::{ChannelKey, ControlType, Section};

/// Monitor lines printed when no count is given
pub const DEFAULT_MONITOR_LINES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    In,
    Out,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set {
        strip: ChannelKey,
        control: ControlType,
        value: i32,
    },
    Toggle,
    Show(ChannelKey),
    Label {
        strip: ChannelKey,
        text: String,
    },
    Monitor(usize),
    Log(bool),
    Ports,
    Open {
        direction: PortDirection,
        name: String,
    },
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: {0} (try 'help')")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("unknown strip: {0}")]
    BadStrip(String),

    #[error("unknown control: {0} (fader, pan or mute)")]
    BadControl(String),

    #[error("not a number: {0}")]
    BadValue(String),
}

pub const HELP: &str = "\
set <strip> <fader|pan|mute> <value>   change a control (strip: ch3, bus1, aux2, master)
toggle                                 switch linked-pair / wide stereo display
show <strip>                           print a strip's values and label
label <strip> <text>                   set a scribble strip label
monitor [count]                        print recent MIDI traffic
log on|off                             append MIDI traffic to the log file
ports                                  list MIDI ports
open in|out <port>                     open a MIDI port
quit                                   exit";

/// Parse one console line; blank lines yield `Ok(None)`
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    let Some((word, rest)) = split_word(line) else {
        return Ok(None);
    };

    let command = match word.to_lowercase().as_str() {
        "set" => {
            let mut args = rest.split_whitespace();
            let (Some(strip), Some(control), Some(value), None) =
                (args.next(), args.next(), args.next(), args.next())
            else {
                return Err(CommandError::Usage("set <strip> <fader|pan|mute> <value>"));
            };
            let control = ControlType::parse(control)
                .ok_or_else(|| CommandError::BadControl(control.to_string()))?;
            Command::Set {
                strip: parse_strip(strip)?,
                control,
                value: parse_value(control, value)?,
            }
        }
        "toggle" => Command::Toggle,
        "show" => match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
            [strip] => Command::Show(parse_strip(strip)?),
            _ => return Err(CommandError::Usage("show <strip>")),
        },
        "label" => {
            let Some((strip, text)) = split_word(rest) else {
                return Err(CommandError::Usage("label <strip> <text>"));
            };
            Command::Label {
                strip: parse_strip(strip)?,
                text: text.to_string(),
            }
        }
        "monitor" => match rest {
            "" => Command::Monitor(DEFAULT_MONITOR_LINES),
            count => Command::Monitor(
                count
                    .parse()
                    .map_err(|_| CommandError::BadValue(count.to_string()))?,
            ),
        },
        "log" => match rest.to_lowercase().as_str() {
            "on" => Command::Log(true),
            "off" => Command::Log(false),
            _ => return Err(CommandError::Usage("log on|off")),
        },
        "ports" => Command::Ports,
        "open" => {
            let usage = CommandError::Usage("open in|out <port>");
            let Some((direction, name)) = split_word(rest) else {
                return Err(usage);
            };
            let direction = match direction.to_lowercase().as_str() {
                "in" => PortDirection::In,
                "out" => PortDirection::Out,
                _ => return Err(usage),
            };
            if name.is_empty() {
                return Err(usage);
            }
            Command::Open {
                direction,
                name: name.to_string(),
            }
        }
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };

    Ok(Some(command))
}

/// First whitespace-separated word and the trimmed remainder
fn split_word(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => Some((word, rest.trim())),
        None => Some((text, "")),
    }
}

/// Strip token such as `ch3`, `bus12` or `master`
pub fn parse_strip(token: &str) -> Result<ChannelKey, CommandError> {
    let lower = token.to_lowercase();
    let expanded = if lower == "main" {
        "master".to_string()
    } else if lower.starts_with("ch") && !lower.starts_with("channel") {
        format!("channel{}", &lower[2..])
    } else {
        lower
    };

    let key = ChannelKey::parse(&expanded);
    let in_range = match key.section.max_number() {
        Some(max) => (1..=max).contains(&key.number),
        None => false,
    };
    let has_number = key.section == Section::Master
        || expanded.ends_with(|c: char| c.is_ascii_digit());

    if in_range && has_number {
        Ok(key)
    } else {
        Err(CommandError::BadStrip(token.to_string()))
    }
}

/// Numeric value; mute also accepts on/off
fn parse_value(control: ControlType, raw: &str) -> Result<i32, CommandError> {
    if control == ControlType::Mute {
        match raw.to_lowercase().as_str() {
            "on" => return Ok(1),
            "off" => return Ok(0),
            _ => {}
        }
    }
    raw.parse()
        .map_err(|_| CommandError::BadValue(raw.to_string()))
}
