//! String to field-value conversions for path and query parameters.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use prost_types::FieldMask;
use std::str::FromStr;
use thiserror::Error;

/// A value that does not convert to the target field type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} value {value:?}")]
pub struct ConvertError {
    pub kind: &'static str,
    pub value: String,
}

impl ConvertError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

pub type ConvertResult<T> = Result<T, ConvertError>;

pub fn string(val: &str) -> ConvertResult<String> {
    Ok(val.to_string())
}

/// Accepts `1 t T TRUE true True 0 f F FALSE false False`
pub fn bool_value(val: &str) -> ConvertResult<bool> {
    match val {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(ConvertError::new("bool", val)),
    }
}

fn number<T: FromStr>(kind: &'static str, val: &str) -> ConvertResult<T> {
    val.parse().map_err(|_| ConvertError::new(kind, val))
}

pub fn int32(val: &str) -> ConvertResult<i32> {
    number("int32", val)
}

pub fn int64(val: &str) -> ConvertResult<i64> {
    number("int64", val)
}

pub fn uint32(val: &str) -> ConvertResult<u32> {
    number("uint32", val)
}

pub fn uint64(val: &str) -> ConvertResult<u64> {
    number("uint64", val)
}

pub fn float32(val: &str) -> ConvertResult<f32> {
    number("float", val)
}

pub fn float64(val: &str) -> ConvertResult<f64> {
    number("double", val)
}

/// Base64, standard alphabet first, then URL-safe
pub fn bytes(val: &str) -> ConvertResult<Vec<u8>> {
    STANDARD
        .decode(val)
        .or_else(|_| URL_SAFE.decode(val))
        .map_err(|_| ConvertError::new("bytes", val))
}

/// Enum by value name or by number.
///
/// `values` lists the enum's `(name, number)` pairs.
pub fn enum_value(val: &str, values: &[(&str, i32)]) -> ConvertResult<i32> {
    if let Some((_, number)) = values.iter().find(|(name, _)| *name == val) {
        return Ok(*number);
    }
    match val.parse::<i32>() {
        Ok(number) if values.iter().any(|(_, n)| *n == number) => Ok(number),
        _ => Err(ConvertError::new("enum", val)),
    }
}

/// Split a delimited value and convert each element
pub fn repeated<T>(
    val: &str,
    sep: char,
    convert: impl Fn(&str) -> ConvertResult<T>,
) -> ConvertResult<Vec<T>> {
    if val.is_empty() {
        return Ok(Vec::new());
    }
    val.split(sep).map(convert).collect()
}

/// Comma-separated field paths; camelCase path segments become snake_case
pub fn field_mask(val: &str) -> ConvertResult<FieldMask> {
    let mut paths = Vec::new();
    for path in val.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if path.split('.').any(|seg| seg.is_empty() || !seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')) {
            return Err(ConvertError::new("field mask", val));
        }
        paths.push(path.split('.').map(camel_to_snake).collect::<Vec<_>>().join("."));
    }
    Ok(FieldMask { paths })
}

/// `scopeId` -> `scope_id`; names already in snake_case are unchanged
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
