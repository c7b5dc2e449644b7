//! Strict JSON shape checks for upstream payloads.
//!
//! Numbers must be JSON numbers, series entries must have the exact arity,
//! required fields must exist. Nothing is coerced: a string "42" where a
//! number is expected is a validation failure.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::errors::MarketDataError;
use crate::models::PricePoint;

/// One-line description of a payload's structure, for logs.
///
/// Lists top-level keys with their JSON type (and length for arrays),
/// never the values themselves.
pub fn describe_shape(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let fields: Vec<String> = map
                .iter()
                .take(12)
                .map(|(k, v)| format!("{}: {}", k, type_name(v)))
                .collect();
            let more = if map.len() > 12 { ", ..." } else { "" };
            format!("{{{}{}}}", fields.join(", "), more)
        }
        other => type_name(other),
    }
}

fn type_name(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(items) => format!("array[{}]", items.len()),
        Value::Object(map) => format!("object({} keys)", map.len()),
    }
}

pub(crate) fn object<'a>(
    provider: &str,
    value: &'a Value,
    what: &str,
) -> Result<&'a Map<String, Value>, MarketDataError> {
    value
        .as_object()
        .ok_or_else(|| MarketDataError::invalid(provider, format!("{} is not an object", what)))
}

pub(crate) fn array<'a>(
    provider: &str,
    value: &'a Value,
    what: &str,
) -> Result<&'a Vec<Value>, MarketDataError> {
    value
        .as_array()
        .ok_or_else(|| MarketDataError::invalid(provider, format!("{} is not an array", what)))
}

pub(crate) fn field<'a>(
    provider: &str,
    map: &'a Map<String, Value>,
    name: &str,
) -> Result<&'a Value, MarketDataError> {
    match map.get(name) {
        Some(Value::Null) | None => Err(MarketDataError::invalid(
            provider,
            format!("'{}' missing", name),
        )),
        Some(value) => Ok(value),
    }
}

pub(crate) fn decimal(provider: &str, value: &Value, what: &str) -> Result<Decimal, MarketDataError> {
    let number = value
        .as_f64()
        .filter(|_| value.is_number())
        .ok_or_else(|| MarketDataError::invalid(provider, format!("{} is not a number", what)))?;

    if !number.is_finite() {
        return Err(MarketDataError::invalid(
            provider,
            format!("{} is not finite", what),
        ));
    }

    Decimal::try_from(number)
        .map_err(|_| MarketDataError::invalid(provider, format!("{} out of range", what)))
}

pub(crate) fn decimal_field(
    provider: &str,
    map: &Map<String, Value>,
    name: &str,
) -> Result<Decimal, MarketDataError> {
    decimal(provider, field(provider, map, name)?, name)
}

/// Optional numeric field: absent or null is `None`, anything else must be a number.
pub(crate) fn opt_decimal(
    provider: &str,
    map: &Map<String, Value>,
    name: &str,
) -> Result<Option<Decimal>, MarketDataError> {
    match map.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => decimal(provider, value, name).map(Some),
    }
}

pub(crate) fn opt_u64(
    provider: &str,
    map: &Map<String, Value>,
    name: &str,
) -> Result<Option<u64>, MarketDataError> {
    match map.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| MarketDataError::invalid(provider, format!("'{}' is not an integer", name))),
    }
}

pub(crate) fn string_field(
    provider: &str,
    map: &Map<String, Value>,
    name: &str,
) -> Result<String, MarketDataError> {
    field(provider, map, name)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| MarketDataError::invalid(provider, format!("'{}' is not a string", name)))
}

pub(crate) fn opt_string(map: &Map<String, Value>, name: &str) -> Option<String> {
    map.get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

pub(crate) fn timestamp_millis(
    provider: &str,
    value: &Value,
    what: &str,
) -> Result<DateTime<Utc>, MarketDataError> {
    let millis = value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
        .ok_or_else(|| MarketDataError::invalid(provider, format!("{} is not a timestamp", what)))?;

    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| MarketDataError::invalid(provider, format!("{} out of range", what)))
}

/// Parse an array of fixed-arity numeric tuples, e.g. `[[ts, v], ...]`.
pub(crate) fn tuples<'a>(
    provider: &str,
    value: &'a Value,
    name: &str,
    arity: usize,
) -> Result<Vec<&'a [Value]>, MarketDataError> {
    let items = array(provider, value, name)?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item.as_array() {
            Some(inner) if inner.len() == arity => Ok(inner.as_slice()),
            Some(inner) => Err(MarketDataError::invalid(
                provider,
                format!("{}[{}] has {} elements, expected {}", name, i, inner.len(), arity),
            )),
            None => Err(MarketDataError::invalid(
                provider,
                format!("{}[{}] is not an array", name, i),
            )),
        })
        .collect()
}

/// Parse a `[[timestamp_ms, value], ...]` series.
pub(crate) fn series(
    provider: &str,
    value: &Value,
    name: &str,
) -> Result<Vec<PricePoint>, MarketDataError> {
    tuples(provider, value, name, 2)?
        .into_iter()
        .enumerate()
        .map(|(i, pair)| {
            let label = format!("{}[{}]", name, i);
            Ok(PricePoint::new(
                timestamp_millis(provider, &pair[0], &label)?,
                decimal(provider, &pair[1], &label)?,
            ))
        })
        .collect()
}
