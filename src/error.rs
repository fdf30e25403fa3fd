// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Error type shared by the battery loader, the dispatcher and the CLI.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// Custom battery file could not be parsed.
    BatteryFile { line: usize, reason: String },
    /// A test option is missing, malformed or out of range.
    InvalidOption {
        test: String,
        option: String,
        reason: String,
    },
    UnknownTest(String),
    UnknownBattery(String),
    UnknownGenerator(String),
    /// Generator emitted bits above its declared output width.
    GeneratorOutputWidth { name: String, width: u32 },
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BatteryFile { line, reason } => write!(f, "Error in line {line}. {reason}"),
            Error::InvalidOption {
                test,
                option,
                reason,
            } => write!(f, "Invalid '{option}' value for test '{test}': {reason}"),
            Error::UnknownTest(name) => write!(f, "Unknown test '{name}'"),
            Error::UnknownBattery(name) => write!(f, "Unknown battery '{name}'"),
            Error::UnknownGenerator(name) => write!(f, "Unknown generator '{name}'"),
            Error::GeneratorOutputWidth { name, width } => write!(
                f,
                "Generator '{name}' returned values wider than its declared {width} bits"
            ),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battery_file_error_names_the_line() {
        let e = Error::BatteryFile {
            line: 7,
            reason: "Unknown test 'foo'".to_owned(),
        };
        assert_eq!(e.to_string(), "Error in line 7. Unknown test 'foo'");
    }
}
