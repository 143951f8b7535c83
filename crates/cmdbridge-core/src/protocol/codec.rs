//! JSON codec: one request document in, one response document out.
//!
//! The protocol is framing-free at the byte level.  A client sends exactly one
//! complete JSON object per connection and signals the end of it in one of two
//! ways:
//!
//! 1. The document simply becomes parseable (most clients append a trailing
//!    `\n`, which we treat as insignificant whitespace), or
//! 2. the client half-closes its write side, at which point whatever has
//!    arrived must parse as a complete document.
//!
//! The connection routine owns the socket and the read loop; this module is a
//! pure transform over byte slices.  [`decode_frame`] supports the incremental
//! case ("is this buffer a complete request yet?") and [`decode_command`] is
//! the strict end-of-stream decode.  Responses are encoded with a trailing
//! newline because the reference client reads until it sees one.
//!
//! Decoding enforces the full request contract:
//!
//! - the top-level value must be a JSON object,
//! - `type` must be present and a non-empty string,
//! - `params`, if present and non-null, must be an object.
//!
//! Any violation yields a [`DecodeError`] with a human-readable message and
//! never a partial [`Command`].

use serde_json::Value;
use thiserror::Error;

use crate::protocol::command::{Command, ParamMap, Response};

/// Upper bound a connection routine may impose on request size, re-exported
/// here so codec errors can name it.  1 MiB matches the reference client's
/// own receive-buffer safeguard.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Errors that can occur while decoding a request.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The bytes are not valid JSON (including truncated JSON at end of
    /// stream).
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The top-level JSON value is not an object.
    #[error("expected a JSON object at the top level, got {found}")]
    NotAnObject { found: &'static str },

    /// The required `type` field is absent.
    #[error("missing required field 'type'")]
    MissingType,

    /// The `type` field is present but not a string.
    #[error("field 'type' must be a string, got {found}")]
    TypeNotAString { found: &'static str },

    /// The `type` field is an empty string.
    #[error("field 'type' must be a non-empty string")]
    EmptyType,

    /// The `params` field is present but not an object.
    #[error("field 'params' must be an object, got {found}")]
    ParamsNotAnObject { found: &'static str },

    /// The request grew past the connection's size limit without ever
    /// becoming a complete JSON document.
    #[error("request exceeds the {limit}-byte limit without completing")]
    RequestTooLarge { limit: usize },
}

/// Outcome of an incremental decode attempt over a partially received buffer.
#[derive(Debug)]
pub enum DecodeProgress {
    /// The buffer held one complete, valid request.
    Complete(Command),
    /// The buffer is empty or holds a truncated JSON document; keep reading.
    NeedMoreData,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Strictly decodes one complete request from `bytes`.
///
/// Use this at end of stream, when no more data can arrive.  Leading and
/// trailing ASCII whitespace (including the conventional trailing `\n`) is
/// ignored.
///
/// # Errors
///
/// Returns [`DecodeError`] if the bytes are not valid JSON or violate the
/// request contract.  A truncated document is an error here, unlike in
/// [`decode_frame`].
pub fn decode_command(bytes: &[u8]) -> Result<Command, DecodeError> {
    let value: Value = serde_json::from_slice(trim_whitespace(bytes))?;
    command_from_value(value)
}

/// Attempts to decode one request from a buffer that may still be growing.
///
/// Call this after each read: [`DecodeProgress::NeedMoreData`] means the
/// buffer is empty or ends mid-document and the caller should read more;
/// [`DecodeProgress::Complete`] carries the decoded command.
///
/// # Errors
///
/// Returns [`DecodeError`] for anything that no amount of further data can
/// repair: syntactically broken JSON, a non-object top level, or a contract
/// violation on `type`/`params`.
pub fn decode_frame(buf: &[u8]) -> Result<DecodeProgress, DecodeError> {
    let trimmed = trim_whitespace(buf);
    if trimmed.is_empty() {
        return Ok(DecodeProgress::NeedMoreData);
    }
    match serde_json::from_slice::<Value>(trimmed) {
        Ok(value) => command_from_value(value).map(DecodeProgress::Complete),
        // serde reports a truncated-but-so-far-valid document as an EOF
        // error; that is the "keep reading" case.
        Err(e) if e.is_eof() => Ok(DecodeProgress::NeedMoreData),
        Err(e) => Err(DecodeError::InvalidJson(e)),
    }
}

/// Encodes a response envelope as UTF-8 JSON with a trailing newline.
///
/// Serialization of [`Response`] cannot fail (it contains only JSON-native
/// types), so this returns bytes rather than a `Result`.
pub fn encode_response(response: &Response) -> Vec<u8> {
    let mut bytes = serde_json::to_vec(response).unwrap_or_else(|_| {
        // Unreachable for Response, but degrade to a valid envelope rather
        // than panic inside the write path.
        br#"{"status":"error","error":"response serialization failed"}"#.to_vec()
    });
    bytes.push(b'\n');
    bytes
}

// ── Validation ────────────────────────────────────────────────────────────────

/// Validates a parsed JSON value against the request contract.
fn command_from_value(value: Value) -> Result<Command, DecodeError> {
    let mut obj = match value {
        Value::Object(obj) => obj,
        other => {
            return Err(DecodeError::NotAnObject {
                found: json_type_name(&other),
            })
        }
    };

    let command_type = match obj.remove("type") {
        None => return Err(DecodeError::MissingType),
        Some(Value::String(s)) if s.is_empty() => return Err(DecodeError::EmptyType),
        Some(Value::String(s)) => s,
        Some(other) => {
            return Err(DecodeError::TypeNotAString {
                found: json_type_name(&other),
            })
        }
    };

    // Absent params and an explicit `"params": null` both mean "no
    // parameters"; the reference client serializes empty bags as null.
    let params: ParamMap = match obj.remove("params") {
        None | Some(Value::Null) => ParamMap::new(),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(DecodeError::ParamsNotAnObject {
                found: json_type_name(&other),
            })
        }
    };

    Ok(Command {
        command_type,
        params,
    })
}

/// Returns the JSON type name of a value, for error messages.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn trim_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

// ── Tests ─────────────────────────────────────────────────────────────────────
