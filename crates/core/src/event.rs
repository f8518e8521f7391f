//! 이벤트 모델 — 입력 한 줄에서 만들어지는 구조화 레코드
//!
//! [`Event`]는 점으로 구분된 평탄한 필드 이름(`process.args`)을 키로 갖는
//! 맵입니다. JSON으로 직렬화할 때 점을 기준으로 중첩 객체가 됩니다.
//! [`Value`]는 문자열, 정수, 실수, 불리언, IP 주소, 타임스탬프, 리스트 중 하나입니다.
//!
//! 이벤트의 수명은 한 번의 분해 호출이며, 엔진은 이벤트 간 상태를 보관하지 않습니다.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// 원본 라인을 보존하는 필드 이름
pub const FIELD_ORIGINAL: &str = "event.original";
/// 이벤트 시간대 필드 이름 (`tz_offset = "event"`일 때 참조)
pub const FIELD_TIMEZONE: &str = "event.timezone";

/// 이벤트 필드 값
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Ip(IpAddr),
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
}

impl Value {
    /// 문자열 값이면 참조를 반환합니다.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// 정수 값이면 반환합니다.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// 값의 타입 이름 (로그용)
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Bool(_) => "boolean",
            Self::Ip(_) => "ip",
            Self::Timestamp(_) => "timestamp",
            Self::List(_) => "list",
        }
    }

    /// JSON 값으로 변환합니다.
    ///
    /// 유한하지 않은 실수는 `null`이 됩니다.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Str(s) => JsonValue::String(s.clone()),
            Self::Int(v) => JsonValue::from(*v),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::Bool(v) => JsonValue::Bool(*v),
            Self::Ip(ip) => JsonValue::String(ip.to_string()),
            Self::Timestamp(ts) => JsonValue::String(format_timestamp(ts)),
            Self::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Ip(ip) => write!(f, "{ip}"),
            Self::Timestamp(ts) => f.write_str(&format_timestamp(ts)),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<IpAddr> for Value {
    fn from(v: IpAddr) -> Self {
        Self::Ip(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Str(s) => serializer.serialize_str(s),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Ip(ip) => serializer.collect_str(ip),
            Self::Timestamp(ts) => serializer.serialize_str(&format_timestamp(ts)),
            Self::List(items) => items.serialize(serializer),
        }
    }
}

/// 규칙 파일의 상수 값 표현
///
/// 문자열은 문자열로 유지되며 IP/타임스탬프로 추론하지 않습니다.
#[derive(Deserialize)]
#[serde(untagged)]
enum ConstValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ConstValue>),
}

impl From<ConstValue> for Value {
    fn from(raw: ConstValue) -> Self {
        match raw {
            ConstValue::Bool(v) => Self::Bool(v),
            ConstValue::Int(v) => Self::Int(v),
            ConstValue::Float(v) => Self::Float(v),
            ConstValue::Str(v) => Self::Str(v),
            ConstValue::List(items) => Self::List(items.into_iter().map(Value::from).collect()),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ConstValue::deserialize(deserializer).map(Value::from)
    }
}

/// 전송 계층 메타데이터
///
/// 분해 전에 이벤트에 병합되는 필드 목록입니다 (예: `host.name`, `log.file.path`).
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    fields: Vec<(String, Value)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// 필드를 추가한 메타데이터를 반환합니다.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.push((key.into(), value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// 구조화된 이벤트
///
/// 필드 정책:
/// - `set`: 기존 값을 덮어씁니다.
/// - `delete`: 없는 필드 삭제는 no-op입니다.
/// - `append`: 없으면 리스트를 만들고, 스칼라는 리스트로 승격하며, 중복 값은 추가하지 않습니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    fields: BTreeMap<String, Value>,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    /// 메타데이터 필드로 초기화된 이벤트를 생성합니다.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let mut event = Self::new();
        for (key, value) in metadata.iter() {
            event.set(key, value.clone());
        }
        event
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// 문자열 필드만 반환합니다.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// 필드 값을 텍스트로 반환합니다 (타입과 무관).
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.fields.get(key).map(ToString::to_string)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn delete(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// 리스트 필드에 값을 추가합니다.
    ///
    /// 새 값이 추가되었으면 `true`를 반환합니다. 리스트 값을 넘기면 원소별로 추가합니다.
    pub fn append(&mut self, key: &str, value: impl Into<Value>) -> bool {
        let incoming = match value.into() {
            Value::List(items) => items,
            other => vec![other],
        };

        let mut list = match self.fields.remove(key) {
            None => Vec::new(),
            Some(Value::List(items)) => items,
            Some(scalar) => vec![scalar],
        };

        let mut added = false;
        for item in incoming {
            if !list.contains(&item) {
                list.push(item);
                added = true;
            }
        }
        self.fields.insert(key.to_owned(), Value::List(list));
        added
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// 여러 필드를 한 번에 덮어씁니다.
    pub fn extend<I, K>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        for (key, value) in fields {
            self.fields.insert(key.into(), value);
        }
    }

    /// 점 구분 키를 중첩 객체로 펼친 JSON 값을 반환합니다.
    ///
    /// 상위 키가 이미 스칼라로 존재하면 하위 키는 점이 포함된 평탄 키로 남습니다.
    pub fn to_json(&self) -> JsonValue {
        let mut root = Map::new();
        for (key, value) in &self.fields {
            insert_dotted(&mut root, key, value.to_json());
        }
        JsonValue::Object(root)
    }
}

fn insert_dotted(map: &mut Map<String, JsonValue>, key: &str, value: JsonValue) {
    let Some((head, rest)) = key.split_once('.') else {
        map.insert(key.to_owned(), value);
        return;
    };
    if head.is_empty() || rest.is_empty() {
        map.insert(key.to_owned(), value);
        return;
    }

    let slot = map
        .entry(head.to_owned())
        .or_insert_with(|| JsonValue::Object(Map::new()));
    if let JsonValue::Object(child) = slot {
        insert_dotted(child, rest, value);
        return;
    }
    map.insert(key.to_owned(), value);
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}
