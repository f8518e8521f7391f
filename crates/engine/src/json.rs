//! JSON 입력 디코딩
//!
//! JSON 입력 테이블은 한 줄을 객체로 디코딩하여 점 구분 키로 평탄화한 뒤
//! `json_target` 접두어 아래에 기록합니다.

use logsift_core::event::{Event, Value};
use serde_json::Value as JsonValue;

use crate::error::MatchError;

/// 한 줄을 디코딩하여 이벤트에 기록합니다.
///
/// 최상위가 객체가 아니거나 JSON이 아니면 [`MatchError::NoMatch`]입니다.
pub fn decode_into(line: &str, target: &str, event: &mut Event) -> Result<usize, MatchError> {
    let root: JsonValue = serde_json::from_str(line).map_err(|_| MatchError::NoMatch)?;
    if !root.is_object() {
        return Err(MatchError::NoMatch);
    }
    let fields = flatten_object(&root, target);
    let count = fields.len();
    event.extend(fields);
    Ok(count)
}

/// 중첩 객체를 `prefix.key` 형태로 평탄화합니다.
///
/// 배열은 리스트 값이 되고 null은 건너뜁니다.
pub fn flatten_object(value: &JsonValue, prefix: &str) -> Vec<(String, Value)> {
    let mut fields = Vec::new();
    let Some(obj) = value.as_object() else {
        return fields;
    };

    for (key, val) in obj {
        let field_name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match val {
            JsonValue::Object(_) => fields.extend(flatten_object(val, &field_name)),
            JsonValue::Null => {}
            other => {
                if let Some(v) = to_value(other) {
                    fields.push((field_name, v));
                }
            }
        }
    }
    fields
}

/// 스칼라/배열 JSON 값을 이벤트 값으로 변환합니다.
///
/// 배열 안의 객체는 JSON 문자열로 보존합니다.
fn to_value(value: &JsonValue) -> Option<Value> {
    match value {
        JsonValue::Null => None,
        JsonValue::Bool(b) => Some(Value::Bool(*b)),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Some(Value::Int(i)),
            None => n.as_f64().map(Value::Float),
        },
        JsonValue::String(s) => Some(Value::Str(s.clone())),
        JsonValue::Array(items) => Some(Value::List(items.iter().filter_map(to_value).collect())),
        JsonValue::Object(_) => Some(Value::Str(value.to_string())),
    }
}
