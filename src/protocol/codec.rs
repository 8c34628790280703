//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Argument
//! ```text
//! ┌──────────────┬───────────────────────┬─────────────────────┐
//! │ digits (1)   │ length (digits bytes) │ payload (length)    │
//! └──────────────┴───────────────────────┴─────────────────────┘
//! ```
//! `digits` is a single ASCII digit 1-9 and must equal the number of decimal
//! digits in `length`, so `10` (zero length) and `205` (leading zero) are both
//! rejected.
//!
//! ### Frames
//! - Request:  `get<key>`, `put<key><value>`, `del<key>`, `bye`
//! - Response: `ack`, `nil`, `err`, `val<value>`

use std::io::Write;

use bytes::{BufMut, Bytes, BytesMut};

use super::{Command, CommandType, Response};
use crate::error::{RelayError, Result};

/// Length of a command or response token
pub const TOKEN_LEN: usize = 3;

/// Largest digit count an argument header can declare
pub const MAX_DIGIT_COUNT: usize = 9;

/// Largest payload an argument can carry
pub const MAX_ARGUMENT_LEN: usize = 999_999_999;

/// Digit count reported for negative input; never matches a legal header
pub const INVALID_DIGIT_COUNT: i64 = -1337;

// =============================================================================
// Arguments
// =============================================================================

/// Number of decimal digits in `n`
///
/// Zero has zero digits. Negative input returns [`INVALID_DIGIT_COUNT`].
pub fn digit_count(n: i64) -> i64 {
    if n < 0 {
        return INVALID_DIGIT_COUNT;
    }

    let mut n = n;
    let mut digits = 0;
    while n != 0 {
        n /= 10;
        digits += 1;
    }
    digits
}

fn protocol(message: impl Into<String>) -> RelayError {
    RelayError::Protocol(message.into())
}

/// Parse an argument header
///
/// Returns `(header_len, payload_len)`, or `None` if `bytes` ends before the
/// header does.
fn argument_header(bytes: &[u8]) -> Result<Option<(usize, usize)>> {
    let Some(&first) = bytes.first() else {
        return Ok(None);
    };

    let declared = char::from(first)
        .to_digit(10)
        .map(|d| d as usize)
        .filter(|d| (1..=MAX_DIGIT_COUNT).contains(d))
        .ok_or_else(|| protocol(format!("invalid digit count byte 0x{first:02x}")))?;

    let Some(length_digits) = bytes.get(1..1 + declared) else {
        if bytes[1..].iter().all(u8::is_ascii_digit) {
            return Ok(None);
        }
        return Err(protocol("argument length is not a decimal number"));
    };

    if !length_digits.iter().all(u8::is_ascii_digit) {
        return Err(protocol("argument length is not a decimal number"));
    }

    let payload_len = length_digits
        .iter()
        .fold(0i64, |acc, b| acc * 10 + i64::from(b - b'0'));

    let actual = digit_count(payload_len);
    if actual != declared as i64 {
        return Err(protocol(format!(
            "argument declares {declared} length digits but length {payload_len} has {actual}"
        )));
    }

    Ok(Some((1 + declared, payload_len as usize)))
}

/// Parse one length-prefixed argument from the start of `bytes`
///
/// Returns the payload and the number of bytes consumed (header + payload),
/// so the next argument starts at `bytes[consumed..]`.
pub fn parse_argument(bytes: &[u8]) -> Result<(String, usize)> {
    if bytes.is_empty() {
        return Err(protocol("missing argument"));
    }

    let (header_len, payload_len) =
        argument_header(bytes)?.ok_or_else(|| protocol("argument header is truncated"))?;

    let end = header_len + payload_len;
    let payload = bytes.get(header_len..end).ok_or_else(|| {
        protocol(format!(
            "argument declares {} bytes but only {} remain",
            payload_len,
            bytes.len() - header_len
        ))
    })?;

    let value = std::str::from_utf8(payload)
        .map_err(|e| protocol(format!("argument is not valid UTF-8: {e}")))?;

    Ok((value.to_owned(), end))
}

/// Check that `value` can be carried by a single argument
pub fn validate_argument(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(protocol("arguments cannot be empty"));
    }
    if value.len() > MAX_ARGUMENT_LEN {
        return Err(protocol(format!(
            "argument of {} bytes exceeds the {} byte limit",
            value.len(),
            MAX_ARGUMENT_LEN
        )));
    }
    Ok(())
}

/// Append `value` as a length-prefixed argument
///
/// Fails without touching `dst` if `value` cannot be carried by an argument.
pub fn encode_argument(dst: &mut BytesMut, value: &str) -> Result<()> {
    validate_argument(value)?;

    let len = value.len();
    let digits = len.to_string();

    dst.reserve(1 + digits.len() + len);
    dst.put_u8(b'0' + digits.len() as u8);
    dst.put_slice(digits.as_bytes());
    dst.put_slice(value.as_bytes());
    Ok(())
}

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
pub fn encode_command(command: &Command) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(64);
    buf.put_slice(command.command_type().token());

    match command {
        Command::Get { key } | Command::Delete { key } => encode_argument(&mut buf, key)?,
        Command::Put { key, value } => {
            encode_argument(&mut buf, key)?;
            encode_argument(&mut buf, value)?;
        }
        Command::Bye => {}
    }

    Ok(buf.freeze())
}

/// Decode a command from bytes
///
/// Anything after the last argument is ignored.
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let token = bytes.get(..TOKEN_LEN).ok_or_else(|| {
        protocol(format!(
            "frame of {} bytes is shorter than a command token",
            bytes.len()
        ))
    })?;

    let command_type = CommandType::from_token(token).ok_or_else(|| {
        protocol(format!(
            "unknown command {:?}",
            String::from_utf8_lossy(token)
        ))
    })?;

    let args = &bytes[TOKEN_LEN..];
    match command_type {
        CommandType::Get => {
            let (key, _) = parse_argument(args)?;
            Ok(Command::Get { key })
        }
        CommandType::Delete => {
            let (key, _) = parse_argument(args)?;
            Ok(Command::Delete { key })
        }
        CommandType::Put => {
            let (key, consumed) = parse_argument(args)?;
            let (value, _) = parse_argument(&args[consumed..])?;
            Ok(Command::Put { key, value })
        }
        CommandType::Bye => Ok(Command::Bye),
    }
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// An empty `val` cannot be expressed on the wire and is an error.
pub fn encode_response(response: &Response) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(TOKEN_LEN);
    buf.put_slice(response.token());
    if let Response::Value(value) = response {
        encode_argument(&mut buf, value)?;
    }
    Ok(buf.freeze())
}

/// Decode a response from the start of `bytes`
///
/// Returns the response and the number of bytes it occupies, or `None` if
/// more bytes are needed to complete it.
pub fn decode_response(bytes: &[u8]) -> Result<Option<(Response, usize)>> {
    let Some(token) = bytes.get(..TOKEN_LEN) else {
        return Ok(None);
    };

    match token {
        b"ack" => Ok(Some((Response::Ack, TOKEN_LEN))),
        b"nil" => Ok(Some((Response::Nil, TOKEN_LEN))),
        b"err" => Ok(Some((Response::Error, TOKEN_LEN))),
        b"val" => {
            let rest = &bytes[TOKEN_LEN..];
            let Some((header_len, payload_len)) = argument_header(rest)? else {
                return Ok(None);
            };
            if rest.len() < header_len + payload_len {
                return Ok(None);
            }
            let (value, consumed) = parse_argument(rest)?;
            Ok(Some((Response::Value(value), TOKEN_LEN + consumed)))
        }
        other => Err(RelayError::UnexpectedResponse(format!(
            "unknown response token {:?}",
            String::from_utf8_lossy(other)
        ))),
    }
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    writer.write_all(&encode_command(command)?)?;
    writer.flush()?;
    Ok(())
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writer.write_all(&encode_response(response)?)?;
    writer.flush()?;
    Ok(())
}
