//! 필드 값 타입 변환
//!
//! 변환 실패는 `None`으로 표현되며, 실패 처리 정책은 호출자가 결정합니다.
//! 리스트 값은 원소별로 변환하고 하나라도 실패하면 전체가 실패합니다.

use std::net::IpAddr;

use logsift_core::event::Value;
use logsift_core::types::FieldKind;

/// 이 값보다 작은 epoch 값(음수 포함)은 초 단위로 간주합니다.
pub const EPOCH_SECONDS_LIMIT: i64 = 100_000_000_000;

/// 값을 `kind`로 변환합니다.
pub fn coerce(value: &Value, kind: FieldKind) -> Option<Value> {
    if let Value::List(items) = value {
        return items
            .iter()
            .map(|item| coerce(item, kind))
            .collect::<Option<Vec<_>>>()
            .map(Value::List);
    }

    match kind {
        FieldKind::String => Some(Value::Str(value.to_string())),
        FieldKind::Ip => to_ip(value).map(Value::Ip),
        FieldKind::Integer => to_integer(value).map(Value::Int),
        FieldKind::Float => to_float(value).map(Value::Float),
        FieldKind::Boolean => to_bool(value).map(Value::Bool),
        FieldKind::Lowercase => Some(match value {
            Value::Str(s) => Value::Str(s.to_lowercase()),
            other => other.clone(),
        }),
        FieldKind::EpochMillis => to_epoch_millis(value).map(Value::Int),
    }
}

fn to_ip(value: &Value) -> Option<IpAddr> {
    match value {
        Value::Ip(ip) => Some(*ip),
        Value::Str(s) => parse_ip(s),
        _ => None,
    }
}

/// `[::1]` 같은 대괄호와 `%eth0` 같은 zone 접미어를 허용합니다.
pub fn parse_ip(text: &str) -> Option<IpAddr> {
    let mut text = text.trim();
    if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        text = inner;
    }
    if let Some((addr, _zone)) = text.split_once('%') {
        text = addr;
    }
    text.parse().ok()
}

fn to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Int(v) => Some(*v),
        Value::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(*v as i64),
        Value::Bool(v) => Some(i64::from(*v)),
        Value::Str(s) => parse_integer(s),
        _ => None,
    }
}

/// 부호, 10진수, `0x` 16진수를 허용하는 정수 파서
pub fn parse_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
            i64::from_str_radix(hex, 16).ok()?
        }
        Some(_) => return None,
        None if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits.parse::<i64>().ok()?
        }
        None => return None,
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn to_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Float(v) => *v,
        Value::Int(v) => *v as f64,
        Value::Str(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    parsed.is_finite().then_some(parsed)
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(v) => Some(*v),
        Value::Int(0) => Some(false),
        Value::Int(1) => Some(true),
        Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// `EPOCH_SECONDS_LIMIT`보다 작은 값은 x1000하여 밀리초로 맞춥니다.
///
/// 이미 밀리초 범위인 값은 그대로 둡니다. x1000이 `i64`를 넘으면 `None`입니다.
pub fn rescale_epoch_millis(value: i64) -> Option<i64> {
    if value < EPOCH_SECONDS_LIMIT {
        value.checked_mul(1000)
    } else {
        Some(value)
    }
}

fn to_epoch_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Timestamp(ts) => Some(ts.timestamp_millis()),
        Value::Float(v) if v.is_finite() => rescale_epoch_millis(v.trunc() as i64),
        other => to_integer(other).and_then(rescale_epoch_millis),
    }
}
