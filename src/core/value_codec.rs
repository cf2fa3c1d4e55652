//! Cell text → typed value
//!
//! `validate` checks a cell is well formed for its declared type and `parse`
//! converts it. Table cells use a small delimiter grammar:
//!
//! - `a:1;b:2` → map `{a = 1, b = 2}` (entries split on `;`, else `,`)
//! - `1,2,3` or `1;2;3` → list `{1, 2, 3}`
//! - `a:1,2` → list `{{a = 1}, 2}`: a colon-free entry forces list shape
//! - anything without `:`, `;` or `,` → empty table

use crate::error::{ValueErrorKind, ValueFormatError};
use crate::schema::{ValueType, BOOL_TRUE_VALUES};
use crate::types::{Table, Value};

/// Check that `text` is well formed for `value_type`
pub fn validate(text: &str, value_type: ValueType) -> Result<(), ValueFormatError> {
    let fail = |kind| ValueFormatError {
        text: text.to_string(),
        value_type,
        kind,
    };

    match value_type {
        ValueType::Int => parse_int(text).map(|_| ()).ok_or(fail(ValueErrorKind::NotInteger)),
        ValueType::Float(_) => parse_float(text)
            .map(|_| ())
            .ok_or(fail(ValueErrorKind::NotFloat)),
        ValueType::Bool => {
            if BOOL_TRUE_VALUES.contains(&text) {
                Ok(())
            } else if BOOL_TRUE_VALUES.iter().any(|t| t.eq_ignore_ascii_case(text)) {
                Err(fail(ValueErrorKind::BoolCase))
            } else {
                Err(fail(ValueErrorKind::BoolUnsupported))
            }
        }
        ValueType::Str | ValueType::Table => Ok(()),
    }
}

/// Convert `text` to a value of `value_type`.
///
/// Bool cells only need to be true-tokens to parse; anything else is `false`.
/// Run [`validate`] first to reject malformed bool text.
pub fn parse(text: &str, value_type: ValueType) -> Result<Value, ValueFormatError> {
    let fail = |kind| ValueFormatError {
        text: text.to_string(),
        value_type,
        kind,
    };

    match value_type {
        ValueType::Int => parse_int(text)
            .map(Value::Int)
            .ok_or(fail(ValueErrorKind::NotInteger)),
        ValueType::Float(digits) => parse_float(text)
            .map(|f| Value::Float(round_to(f, digits)))
            .ok_or(fail(ValueErrorKind::NotFloat)),
        ValueType::Str => Ok(Value::Str(text.to_string())),
        ValueType::Bool => Ok(Value::Bool(BOOL_TRUE_VALUES.contains(&text))),
        ValueType::Table => Ok(Value::Table(parse_table(text))),
    }
}

/// Value used for an empty optional cell
pub fn default_value(value_type: ValueType) -> Value {
    match value_type {
        ValueType::Int => Value::Int(0),
        ValueType::Float(_) => Value::Float(0.0),
        ValueType::Str => Value::Str(String::new()),
        ValueType::Bool => Value::Bool(false),
        ValueType::Table => Value::Table(Table::empty()),
    }
}

/// Parse a table cell with the delimiter grammar
pub fn parse_table(text: &str) -> Table {
    if text.contains(':') {
        let entries: Vec<&str> = if text.contains(';') {
            text.split(';').collect()
        } else if text.contains(',') {
            text.split(',').collect()
        } else {
            vec![text]
        };

        let mut table = Table::empty();
        for entry in entries {
            if entry.is_empty() {
                continue;
            }
            match entry.split_once(':') {
                Some((key, value)) => table.insert(parse_scalar(key), parse_scalar(value)),
                None => table.push(parse_scalar(entry)),
            }
        }
        table
    } else if text.contains(';') {
        Table::List(text.split(';').map(parse_scalar).collect())
    } else if text.contains(',') {
        Table::List(text.split(',').map(parse_scalar).collect())
    } else {
        Table::empty()
    }
}

/// Parse one token inside a table cell
fn parse_scalar(token: &str) -> Value {
    if token.contains(',') {
        return Value::Table(Table::List(token.split(',').map(parse_scalar).collect()));
    }

    let token = token.trim();
    if token.contains('"') {
        return Value::Str(token.trim_matches('"').to_string());
    }
    if let Some(i) = parse_int(token) {
        return Value::Int(i);
    }
    if let Some(f) = parse_float(token) {
        return Value::Float(f);
    }
    Value::Str(token.to_string())
}

fn parse_int(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok()
}

fn parse_float(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Round half away from zero to `digits` decimal places
fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}
