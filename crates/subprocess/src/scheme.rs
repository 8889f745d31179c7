//! Custom scheme registrations forwarded from the host
//!
//! Schemes must be registered identically in every process, so the host
//! serialises its list onto the command line:
//!
//! ```text
//! --custom-scheme=app|65;asset|3
//! ```
//!
//! Each `;`-separated entry is `name|options`, where `options` is the decimal
//! value of [`SchemeOptions`].

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::args::{self, CUSTOM_SCHEME};
use crate::error::SubprocessError;

/// Scheme registration flags, bit-compatible with `cef_scheme_options_t`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SchemeOptions(u32);

impl SchemeOptions {
    pub const NONE: Self = Self(0);
    pub const STANDARD: Self = Self(1 << 0);
    pub const LOCAL: Self = Self(1 << 1);
    pub const DISPLAY_ISOLATED: Self = Self(1 << 2);
    pub const SECURE: Self = Self(1 << 3);
    pub const CORS_ENABLED: Self = Self(1 << 4);
    pub const CSP_BYPASSING: Self = Self(1 << 5);
    pub const FETCH_ENABLED: Self = Self(1 << 6);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SchemeOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for SchemeOptions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// A scheme the engine must register before any browser is created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomScheme {
    pub name: String,
    pub options: SchemeOptions,
}

impl CustomScheme {
    pub fn new(name: impl Into<String>, options: SchemeOptions) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }
}

impl fmt::Display for CustomScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.name, self.options.bits())
    }
}

/// Parse every scheme carried by `--custom-scheme`
///
/// No switch, or an empty one, yields an empty list.
pub fn parse_command_line<S: AsRef<str>>(args: &[S]) -> Result<Vec<CustomScheme>, SubprocessError> {
    match args::argument_value(args, CUSTOM_SCHEME) {
        Some(value) => parse_schemes(value),
        None => Ok(Vec::new()),
    }
}

/// Parse the value of a `--custom-scheme` switch
pub fn parse_schemes(value: &str) -> Result<Vec<CustomScheme>, SubprocessError> {
    value
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_entry)
        .collect()
}

fn parse_entry(entry: &str) -> Result<CustomScheme, SubprocessError> {
    let mut tokens = entry.split('|');
    let name = tokens.next().unwrap_or_default().trim();

    let options = match tokens.next().map(str::trim) {
        None | Some("") => SchemeOptions::NONE,
        Some(raw) => raw
            .parse::<u32>()
            .map(SchemeOptions::from_bits)
            .map_err(|_| SubprocessError::InvalidSchemeOptions {
                scheme: name.to_string(),
                options: raw.to_string(),
            })?,
    };

    Ok(CustomScheme::new(name, options))
}

/// Serialise schemes back into a `--custom-scheme` switch
pub fn to_command_line(schemes: &[CustomScheme]) -> String {
    let joined = schemes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(";");
    format!("{CUSTOM_SCHEME}={joined}")
}
