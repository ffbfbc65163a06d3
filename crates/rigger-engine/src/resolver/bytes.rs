//! `slice-bytes`: contiguous subranges of a byte string.

use crate::error::{EngineError, Result};
use crate::resolver::args::{self, ResolvedArgs};

const OP: &str = "slice-bytes";

/// Evaluates `{ value, start?, end?, range? }`.
///
/// `range` is `"start:end"` with optional surrounding brackets; it is
/// mutually exclusive with `start`/`end`. Indices are byte offsets, may be
/// negative (counted from the end), and are clamped to `[0, len]`.
/// `start >= end` yields `"0x"`.
pub fn slice_bytes(resolved: &ResolvedArgs) -> Result<serde_json::Value> {
    let value = args::require(resolved, "value", OP)?;
    let bytes = args::parse_hex_bytes(value, OP, "value")?;
    let len = bytes.len() as i128;

    let range = args::optional(resolved, "range");
    let start_arg = args::optional(resolved, "start");
    let end_arg = args::optional(resolved, "end");

    if range.is_some() && (start_arg.is_some() || end_arg.is_some()) {
        return Err(EngineError::Validation(format!(
            "{}: 'range' cannot be combined with 'start'/'end'",
            OP
        )));
    }

    let (start, end) = match range {
        Some(range) => parse_range(range)?,
        None => (
            start_arg.map(|v| parse_index(v, "start")).transpose()?,
            end_arg.map(|v| parse_index(v, "end")).transpose()?,
        ),
    };

    let start = clamp(start.unwrap_or(0), len);
    let end = clamp(end.unwrap_or(len), len);
    let sliced: &[u8] = if start >= end {
        &[]
    } else {
        &bytes[start as usize..end as usize]
    };
    Ok(serde_json::Value::String(format!("0x{}", hex::encode(sliced))))
}

/// Maps a possibly-negative index into `[0, len]`.
fn clamp(index: i128, len: i128) -> i128 {
    let absolute = if index < 0 { len + index } else { index };
    absolute.clamp(0, len)
}

fn parse_index(value: &serde_json::Value, field: &str) -> Result<i128> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().map(i128::from).ok_or_else(|| {
            EngineError::Validation(format!("{}: '{}' must be an integer, got {}", OP, field, n))
        }),
        serde_json::Value::String(s) => s.trim().parse().map_err(|_| {
            EngineError::Validation(format!("{}: '{}' is not a valid index: {}", OP, field, s))
        }),
        other => Err(EngineError::Validation(format!(
            "{}: '{}' must be an integer, got {}",
            OP, field, other
        ))),
    }
}

/// Parses `"[start:end]"` or `"start:end"`; either side may be empty.
fn parse_range(value: &serde_json::Value) -> Result<(Option<i128>, Option<i128>)> {
    let s = value.as_str().ok_or_else(|| {
        EngineError::Validation(format!("{}: 'range' must be a string", OP))
    })?;
    let trimmed = s.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(trimmed);

    let mut parts = inner.splitn(2, ':');
    let (start, end) = match (parts.next(), parts.next()) {
        (Some(start), Some(end)) => (start.trim(), end.trim()),
        _ => {
            return Err(EngineError::Validation(format!(
                "{}: malformed range '{}', expected \"start:end\"",
                OP, s
            )))
        }
    };

    let parse_side = |side: &str, name: &str| -> Result<Option<i128>> {
        if side.is_empty() {
            return Ok(None);
        }
        side.parse().map(Some).map_err(|_| {
            EngineError::Validation(format!("{}: range {} '{}' is not an integer", OP, name, side))
        })
    };
    Ok((parse_side(start, "start")?, parse_side(end, "end")?))
}
