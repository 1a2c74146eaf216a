//! Node modes
//!
//! A mode selects which remote operation the node performs. Only
//! `runFunction` is recognized today; anything else is carried through as
//! [`Mode::Unknown`] and rejected at dispatch time.

use std::fmt;

/// Remote operation selected by the node configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Score a payload against an online deployment
    RunFunction,
    /// Unrecognized mode name (kept verbatim for error reporting)
    Unknown(String),
}

impl Mode {
    pub const RUN_FUNCTION: &'static str = "runFunction";

    /// Parse a configured mode. Blank input means "no mode selected".
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw.map(str::trim) {
            None | Some("") => None,
            Some(Self::RUN_FUNCTION) => Some(Mode::RunFunction),
            Some(other) => Some(Mode::Unknown(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Mode::RunFunction => Self::RUN_FUNCTION,
            Mode::Unknown(name) => name,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
