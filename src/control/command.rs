//! Command grammar and warning taxonomy
//!
//! Commands arrive as text lines: `<command> [<value>] [add]`. Parsing maps
//! a line onto the closed [`Command`] enum; every recoverable problem along
//! the way (and later, during handling) is a [`Warning`], surfaced in the
//! response and never propagated as a hard error.

use thiserror::Error;

use crate::state::Polarity;

/// Recoverable problem reported back with a response.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Warning {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("bad option for {field}: {reason}")]
    BadOption { field: &'static str, reason: String },

    #[error("{field} must be within [{min}, {max}] dB, value clamped")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
    },

    #[error("could not commit '{command}' downstream: {reason}")]
    Downstream {
        command: &'static str,
        reason: String,
    },

    #[error("headroom exhausted, committed at the {gain_min} dB gain floor")]
    HeadroomExceeded { gain_min: f64 },
}

impl Warning {
    pub fn bad_option(field: &'static str, reason: impl Into<String>) -> Self {
        Warning::BadOption {
            field,
            reason: reason.into(),
        }
    }

    pub fn downstream(command: &'static str, error: impl std::fmt::Display) -> Self {
        Warning::Downstream {
            command,
            reason: error.to_string(),
        }
    }
}

/// Argument of the on/off switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
    Flip,
}

impl Toggle {
    pub fn apply(self, current: bool) -> bool {
        match self {
            Toggle::On => true,
            Toggle::Off => false,
            Toggle::Flip => !current,
        }
    }

    fn parse(field: &'static str, word: &str) -> Result<Self, Warning> {
        match word {
            "on" => Ok(Toggle::On),
            "off" => Ok(Toggle::Off),
            "toggle" => Ok(Toggle::Flip),
            other => Err(Warning::bad_option(
                field,
                format!("'{other}' is not one of on/off/toggle"),
            )),
        }
    }
}

/// Argument of the polarity command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolarityArg {
    Set(Polarity),
    Flip,
}

impl PolarityArg {
    pub fn apply(self, current: Polarity) -> Polarity {
        match self {
            PolarityArg::Set(polarity) => polarity,
            PolarityArg::Flip => current.flipped(),
        }
    }
}

/// The closed set of commands the dispatcher understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Show,
    Status,
    Level { value: f64, add: bool },
    Gain { value: f64 },
    Balance { value: f64, add: bool },
    Bass { value: f64, add: bool },
    Treble { value: f64, add: bool },
    LoudnessRef { value: f64, add: bool },
    Mute(Toggle),
    Loudness(Toggle),
    Mono(Toggle),
    Polarity(PolarityArg),
    Input { name: String },
    Xo { name: String },
    Drc { set: Option<String> },
    Peq { set: Option<String> },
}

/// Parse one command line.
pub fn parse(line: &str) -> Result<Command, Warning> {
    let mut tokens = line.trim().split_whitespace();
    let name = tokens.next().unwrap_or("");
    let arg = tokens.next();
    let add = tokens.next() == Some("add");

    match name {
        "show" => Ok(Command::Show),
        "status" => Ok(Command::Status),
        "level" => Ok(Command::Level {
            value: parse_db("level", arg)?,
            add,
        }),
        "gain" => Ok(Command::Gain {
            value: parse_db("gain", arg)?,
        }),
        "balance" => Ok(Command::Balance {
            value: parse_db("balance", arg)?,
            add,
        }),
        "bass" => Ok(Command::Bass {
            value: parse_db("bass", arg)?,
            add,
        }),
        "treble" => Ok(Command::Treble {
            value: parse_db("treble", arg)?,
            add,
        }),
        "loudness_ref" => Ok(Command::LoudnessRef {
            value: parse_db("loudness_ref", arg)?,
            add,
        }),
        "mute" => Ok(Command::Mute(parse_toggle("mute", arg)?)),
        "loudness" => Ok(Command::Loudness(parse_toggle("loudness", arg)?)),
        "mono" => Ok(Command::Mono(parse_toggle("mono", arg)?)),
        "polarity" => Ok(Command::Polarity(parse_polarity(arg)?)),
        "input" => Ok(Command::Input {
            name: parse_id("input", arg)?,
        }),
        "xo" => Ok(Command::Xo {
            name: parse_id("xo", arg)?,
        }),
        "drc" => Ok(Command::Drc {
            set: parse_optional_id("drc", arg)?,
        }),
        "peq" => Ok(Command::Peq {
            set: parse_optional_id("peq", arg)?,
        }),
        other => Err(Warning::UnknownCommand(other.to_string())),
    }
}

fn parse_db(field: &'static str, arg: Option<&str>) -> Result<f64, Warning> {
    let word = arg.ok_or_else(|| Warning::bad_option(field, "missing value"))?;
    word.parse::<f64>()
        .map_err(|_| Warning::bad_option(field, format!("'{word}' is not a dB value")))
        .and_then(|value| {
            if value.is_finite() {
                Ok(value)
            } else {
                Err(Warning::bad_option(field, "value must be finite"))
            }
        })
}

fn parse_toggle(field: &'static str, arg: Option<&str>) -> Result<Toggle, Warning> {
    let word = arg.ok_or_else(|| Warning::bad_option(field, "missing value"))?;
    Toggle::parse(field, word)
}

fn parse_polarity(arg: Option<&str>) -> Result<PolarityArg, Warning> {
    match arg {
        Some("+") => Ok(PolarityArg::Set(Polarity::Direct)),
        Some("-") => Ok(PolarityArg::Set(Polarity::Inverted)),
        Some("toggle") => Ok(PolarityArg::Flip),
        Some(other) => Err(Warning::bad_option(
            "polarity",
            format!("'{other}' is not one of +/-/toggle"),
        )),
        None => Err(Warning::bad_option("polarity", "missing value")),
    }
}

fn parse_id(field: &'static str, arg: Option<&str>) -> Result<String, Warning> {
    arg.map(str::to_string)
        .ok_or_else(|| Warning::bad_option(field, "missing id"))
}

fn parse_optional_id(field: &'static str, arg: Option<&str>) -> Result<Option<String>, Warning> {
    match parse_id(field, arg)?.as_str() {
        "off" | "none" => Ok(None),
        name => Ok(Some(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_parse_level_absolute_and_relative() {
        assert_eq!(
            parse("level -20.5").unwrap(),
            Command::Level {
                value: -20.5,
                add: false
            }
        );
        assert_eq!(
            parse("level 2 add").unwrap(),
            Command::Level {
                value: 2.0,
                add: true
            }
        );
    }

    #[test]
    fn test_parse_strips_line_endings() {
        assert_eq!(parse("mute on\r\n").unwrap(), Command::Mute(Toggle::On));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse("frobnicate 3").unwrap_err(),
            Warning::UnknownCommand("frobnicate".to_string())
        );
    }

    #[test]
    fn test_missing_and_malformed_numeric_argument() {
        assert!(matches!(
            parse("bass").unwrap_err(),
            Warning::BadOption { field: "bass", .. }
        ));
        assert!(matches!(
            parse("bass much").unwrap_err(),
            Warning::BadOption { field: "bass", .. }
        ));
        assert!(matches!(
            parse("level nan").unwrap_err(),
            Warning::BadOption { field: "level", .. }
        ));
    }

    #[test_case("on", false => true)]
    #[test_case("off", true => false)]
    #[test_case("toggle", true => false)]
    #[test_case("toggle", false => true)]
    fn test_toggle_words(word: &str, current: bool) -> bool {
        Toggle::parse("mute", word).unwrap().apply(current)
    }

    #[test]
    fn test_bad_toggle_word() {
        assert!(Toggle::parse("mute", "maybe").is_err());
    }

    #[test]
    fn test_polarity_arguments() {
        assert_eq!(
            parse("polarity -").unwrap(),
            Command::Polarity(PolarityArg::Set(Polarity::Inverted))
        );
        assert_eq!(
            parse("polarity toggle").unwrap(),
            Command::Polarity(PolarityArg::Flip)
        );
        assert!(parse("polarity sideways").is_err());
    }

    #[test]
    fn test_correction_sets_accept_off() {
        assert_eq!(parse("drc off").unwrap(), Command::Drc { set: None });
        assert_eq!(
            parse("peq vocal").unwrap(),
            Command::Peq {
                set: Some("vocal".to_string())
            }
        );
    }

    #[test]
    fn test_empty_line_is_unknown() {
        assert_eq!(
            parse("").unwrap_err(),
            Warning::UnknownCommand(String::new())
        );
    }
}
