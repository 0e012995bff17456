//! Command and reply line codec
//!
//! Requests are single lines of the form `@verb arg arg\r`:
//! - integer arguments render as decimal (`48`)
//! - array arguments render as comma-joined hex literals without whitespace (`0x12,0x4`)
//! - every argument is preceded by exactly one space, so an empty array still
//!   leaves its separating space on the line
//!
//! Replies have the form `STATUS(n)[,value,value,...]` where each value is an
//! integer literal (decimal, `0x`, `0o` or `0b`).

use core::fmt::Write;

use crate::error::BlasterError;
use crate::status;

/// First character of every request; selects the firmware's non-echoing command mode
pub const COMMAND_PREFIX: char = '@';

/// Request line terminator
pub const COMMAND_TERMINATOR: char = '\r';

/// A single command argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Scalar, rendered as decimal
    Int(i64),
    /// Array, rendered as comma-joined hex literals
    Array(Vec<i64>),
    /// Single literal character (e.g. the `Z` of a tri-state GPIO)
    Char(char),
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Int(value)
    }
}

impl From<u32> for Arg {
    fn from(value: u32) -> Self {
        Arg::Int(i64::from(value))
    }
}

impl From<u16> for Arg {
    fn from(value: u16) -> Self {
        Arg::Int(i64::from(value))
    }
}

impl From<u8> for Arg {
    fn from(value: u8) -> Self {
        Arg::Int(i64::from(value))
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Int(i64::from(value))
    }
}

impl From<char> for Arg {
    fn from(value: char) -> Self {
        Arg::Char(value)
    }
}

impl From<Vec<i64>> for Arg {
    fn from(values: Vec<i64>) -> Self {
        Arg::Array(values)
    }
}

impl From<&[i64]> for Arg {
    fn from(values: &[i64]) -> Self {
        Arg::Array(values.to_vec())
    }
}

impl From<&[u8]> for Arg {
    fn from(values: &[u8]) -> Self {
        Arg::Array(values.iter().copied().map(i64::from).collect())
    }
}

impl From<&[u16]> for Arg {
    fn from(values: &[u16]) -> Self {
        Arg::Array(values.iter().copied().map(i64::from).collect())
    }
}

/// A request for the adapter: verb plus ordered arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    verb: String,
    args: Vec<Arg>,
}

impl Command {
    /// Create a command without arguments
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Render the command as a wire line (prefix, verb, arguments, terminator)
    pub fn encode(&self) -> String {
        encode(&self.verb, &self.args)
    }
}

/// Encode a verb and its arguments into a request line
pub fn encode(verb: &str, args: &[Arg]) -> String {
    let mut line = String::with_capacity(verb.len() + 2);
    line.push(COMMAND_PREFIX);
    line.push_str(verb);

    for arg in args {
        line.push(' ');
        match arg {
            Arg::Int(value) => {
                let _ = write!(line, "{value}");
            }
            Arg::Array(values) => {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        line.push(',');
                    }
                    push_hex(&mut line, *value);
                }
            }
            Arg::Char(c) => line.push(*c),
        }
    }

    line.push(COMMAND_TERMINATOR);
    line
}

fn push_hex(line: &mut String, value: i64) {
    if value < 0 {
        let _ = write!(line, "-{:#x}", value.unsigned_abs());
    } else {
        let _ = write!(line, "{value:#x}");
    }
}

/// A decoded reply: status tag plus ordered values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status tag, e.g. `OK(0)`. For a reply without `)` this is the whole trimmed line.
    pub status: String,
    /// Values following the status tag
    pub values: Vec<i64>,
}

impl Response {
    /// Whether the status is the success tag
    pub fn is_ok(&self) -> bool {
        self.status == status::OK
    }

    /// Values on success, [`BlasterError::Protocol`] otherwise
    pub fn into_values(self) -> Result<Vec<i64>, BlasterError> {
        if self.is_ok() {
            Ok(self.values)
        } else {
            Err(BlasterError::Protocol(self.status))
        }
    }

    /// Like [`Response::into_values`], but one anticipated non-success status maps
    /// to `Ok(None)` instead of an error
    pub fn into_values_or(self, alternate: &str) -> Result<Option<Vec<i64>>, BlasterError> {
        if self.status == alternate {
            return Ok(None);
        }
        self.into_values().map(Some)
    }
}

/// Decode a raw reply line
///
/// A line without `)` (empty reply, timeout, console error text) yields the trimmed
/// line as status and no values. A token that is not an integer literal fails the
/// whole decode.
pub fn decode(raw: &str) -> Result<Response, BlasterError> {
    let line = raw.trim();

    let Some(end) = line.find(')') else {
        return Ok(Response {
            status: line.to_string(),
            values: Vec::new(),
        });
    };

    let status = line[..=end].to_string();
    let rest = &line[end + 1..];
    let rest = rest.strip_prefix(',').unwrap_or(rest);

    let values = if rest.is_empty() {
        Vec::new()
    } else {
        rest.split(',').map(parse_int).collect::<Result<Vec<_>, _>>()?
    };

    Ok(Response { status, values })
}

/// Parse an integer literal the way the adapter's host tooling always has
///
/// Accepts surrounding whitespace, an optional sign, `0x`/`0o`/`0b` prefixes in either
/// case and single `_` separators between digits. A decimal literal with a leading
/// zero is rejected unless every digit is zero.
pub fn parse_int(token: &str) -> Result<i64, BlasterError> {
    let invalid = || BlasterError::Format(format!("invalid integer literal '{token}'"));

    let s = token.trim();
    let (negative, body) = if let Some(body) = s.strip_prefix('-') {
        (true, body)
    } else if let Some(body) = s.strip_prefix('+') {
        (false, body)
    } else {
        (false, s)
    };

    let (radix, digits) = match body.get(..2) {
        Some("0x") | Some("0X") => (16, body[2..].strip_prefix('_').unwrap_or(&body[2..])),
        Some("0o") | Some("0O") => (8, body[2..].strip_prefix('_').unwrap_or(&body[2..])),
        Some("0b") | Some("0B") => (2, body[2..].strip_prefix('_').unwrap_or(&body[2..])),
        _ => (10, body),
    };

    if digits.is_empty()
        || digits.starts_with('_')
        || digits.ends_with('_')
        || digits.contains("__")
    {
        return Err(invalid());
    }

    let cleaned: String = digits.chars().filter(|c| *c != '_').collect();
    if !cleaned.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }
    if radix == 10 && cleaned.starts_with('0') && cleaned.chars().any(|c| c != '0') {
        return Err(invalid());
    }

    let magnitude = u64::from_str_radix(&cleaned, radix).map_err(|_| invalid())?;
    if negative {
        0i64.checked_sub_unsigned(magnitude).ok_or_else(invalid)
    } else {
        i64::try_from(magnitude).map_err(|_| invalid())
    }
}
