//! 필드 변환 파이프라인
//!
//! 규칙이 매칭된 뒤 순서대로 적용되는 [`TransformOp`] 목록입니다.
//! YAML 규칙 파일의 `op` 태그로 구분되며 로드 시 그대로 실행 형태가 됩니다.
//!
//! 적용 중 `fail_on_error`가 지정된 변환이 실패하면 [`MatchError::FieldCoercion`]을
//! 반환하고, 호출자(규칙 노드)가 그 규칙의 변경 사항을 버립니다.

pub mod coerce;
pub mod datetime;
pub mod func;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use logsift_core::event::{Event, Value};
use logsift_core::metrics::{ENGINE_COERCION_ERRORS_TOTAL, LABEL_KIND};
use logsift_core::types::FieldKind;
use metrics::counter;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::config::TzSetting;
use crate::error::MatchError;

pub use coerce::coerce;
pub use datetime::DateFormat;
pub use func::{CallFunc, UrlPart};

/// 변환 적용 시점의 환경
#[derive(Debug, Clone, Copy)]
pub struct TransformContext {
    /// 날짜 해석 기본 시간대
    pub tz: TzSetting,
    /// 연도 없는 날짜의 기준 시각
    pub now: DateTime<Utc>,
}

impl TransformContext {
    pub fn new(tz: TzSetting) -> Self {
        Self { tz, now: Utc::now() }
    }
}

/// 상수 또는 필드 참조
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Field { field: String },
    Literal { literal: Value },
}

impl Operand {
    fn resolve(&self, event: &Event) -> Option<Value> {
        match self {
            Self::Field { field } => event.get(field).cloned(),
            Self::Literal { literal } => Some(literal.clone()),
        }
    }
}

/// `split` 변환의 정규식 구분자
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct SplitPattern(Regex);

impl TryFrom<String> for SplitPattern {
    type Error = regex::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Regex::new(&value).map(Self)
    }
}

impl PartialEq for SplitPattern {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

/// 필드 변환 연산
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformOp {
    /// 상수 설정
    Set { field: String, value: Value },
    /// 필드 복사 (선택적 타입 변환)
    Copy {
        from: String,
        to: String,
        #[serde(default)]
        kind: Option<FieldKind>,
        #[serde(default)]
        ignore_missing: bool,
        #[serde(default)]
        fail_on_error: bool,
    },
    /// 상수와 필드 값을 이어붙인 문자열
    Concat { dest: String, parts: Vec<Operand> },
    /// 날짜 해석
    Date {
        dest: String,
        fields: Vec<String>,
        formats: Vec<DateFormat>,
        #[serde(default)]
        required: bool,
        #[serde(default)]
        tz: Option<TzSetting>,
    },
    /// 제자리 타입 변환
    Coerce {
        field: String,
        kind: FieldKind,
        #[serde(default)]
        fail_on_error: bool,
    },
    /// 필드 값에 따른 분기
    Branch {
        field: String,
        branches: BTreeMap<String, Vec<TransformOp>>,
        #[serde(default)]
        otherwise: Vec<TransformOp>,
    },
    Delete { field: String },
    /// 리스트에 중복 없이 추가
    Append { field: String, value: Operand },
    /// 내장 함수 호출
    Call {
        dest: String,
        func: CallFunc,
        args: Vec<Operand>,
    },
    /// 키 값으로 테이블 조회
    Lookup {
        dest: String,
        key: Operand,
        map: BTreeMap<String, Value>,
        #[serde(default)]
        default: Option<Value>,
    },
    /// 문자열을 리스트로 분리
    Split {
        from: String,
        to: String,
        #[serde(default)]
        separator: Option<String>,
        #[serde(default)]
        pattern: Option<SplitPattern>,
        /// 첫 원소를 따로 저장할 필드
        #[serde(default)]
        head: Option<String>,
    },
    /// URL 구성 요소 추출
    Url {
        dest: String,
        from: String,
        part: UrlPart,
    },
}

/// 변환 목록을 순서대로 적용합니다.
pub fn apply(
    ops: &[TransformOp],
    event: &mut Event,
    ctx: &TransformContext,
) -> Result<(), MatchError> {
    for op in ops {
        apply_one(op, event, ctx)?;
    }
    Ok(())
}

fn apply_one(op: &TransformOp, event: &mut Event, ctx: &TransformContext) -> Result<(), MatchError> {
    match op {
        TransformOp::Set { field, value } => event.set(field.as_str(), value.clone()),

        TransformOp::Copy {
            from,
            to,
            kind,
            ignore_missing,
            fail_on_error,
        } => {
            let Some(value) = event.get(from) else {
                if *ignore_missing {
                    return Ok(());
                }
                if *fail_on_error {
                    return Err(MatchError::FieldCoercion {
                        field: from.clone(),
                        kind: kind.unwrap_or_default().as_str(),
                    });
                }
                debug!(field = from.as_str(), "copy source missing, skipped");
                return Ok(());
            };
            let converted = match kind {
                Some(kind) => coerce_or_fail(value, *kind, from, *fail_on_error)?,
                None => Some(value.clone()),
            };
            if let Some(value) = converted {
                event.set(to.as_str(), value);
            }
        }

        TransformOp::Concat { dest, parts } => {
            if let Some(text) = join_operands(parts, event) {
                event.set(dest.as_str(), text);
            }
        }

        TransformOp::Date {
            dest,
            fields,
            formats,
            required,
            tz,
        } => {
            let input = fields
                .iter()
                .filter_map(|f| event.get_text(f))
                .collect::<Vec<_>>()
                .join(" ");
            let tz = tz.unwrap_or(ctx.tz);
            let view: &Event = event;
            let parsed = formats
                .iter()
                .find_map(|format| format.parse(&input, &tz, view, ctx.now));
            match parsed {
                Some(ts) => event.set(dest.as_str(), ts),
                None if *required => {
                    return Err(MatchError::FieldCoercion {
                        field: dest.clone(),
                        kind: "date",
                    });
                }
                None => debug!(dest = dest.as_str(), input = input.as_str(), "no date format matched"),
            }
        }

        TransformOp::Coerce {
            field,
            kind,
            fail_on_error,
        } => {
            if let Some(value) = event.get(field) {
                if let Some(converted) = coerce_or_fail(value, *kind, field, *fail_on_error)? {
                    event.set(field.as_str(), converted);
                }
            }
        }

        TransformOp::Branch {
            field,
            branches,
            otherwise,
        } => {
            let selected = event
                .get_text(field)
                .and_then(|key| branches.get(&key))
                .unwrap_or(otherwise);
            apply(selected, event, ctx)?;
        }

        TransformOp::Delete { field } => {
            event.delete(field);
        }

        TransformOp::Append { field, value } => {
            if let Some(value) = value.resolve(event) {
                event.append(field, value);
            }
        }

        TransformOp::Call { dest, func, args } => {
            let Some(args) = args
                .iter()
                .map(|a| a.resolve(event).map(|v| v.to_string()))
                .collect::<Option<Vec<_>>>()
            else {
                return Ok(());
            };
            match func.apply(&args) {
                Some(result) => event.set(dest.as_str(), result),
                None => debug!(func = func.name(), dest = dest.as_str(), "call produced no value"),
            }
        }

        TransformOp::Lookup {
            dest,
            key,
            map,
            default,
        } => {
            let Some(key) = key.resolve(event) else {
                return Ok(());
            };
            if let Some(value) = map.get(&key.to_string()).or(default.as_ref()) {
                event.set(dest.as_str(), value.clone());
            }
        }

        TransformOp::Split {
            from,
            to,
            separator,
            pattern,
            head,
        } => {
            let Some(text) = event.get_text(from) else {
                return Ok(());
            };
            let parts: Vec<Value> = split_text(&text, separator.as_deref(), pattern.as_ref())
                .into_iter()
                .map(Value::from)
                .collect();
            if let (Some(head), Some(first)) = (head, parts.first()) {
                event.set(head.as_str(), first.clone());
            }
            event.set(to.as_str(), Value::List(parts));
        }

        TransformOp::Url { dest, from, part } => {
            let Some(value) = event.get_text(from) else {
                return Ok(());
            };
            match part.extract(&value) {
                Some(result) => event.set(dest.as_str(), result),
                None => debug!(from = from.as_str(), value = value.as_str(), "url part not found"),
            }
        }
    }
    Ok(())
}

/// 타입 변환을 시도하고 실패 시 정책을 적용합니다.
///
/// 실패하고 `fail_on_error`가 아니면 `Ok(None)`입니다.
fn coerce_or_fail(
    value: &Value,
    kind: FieldKind,
    field: &str,
    fail_on_error: bool,
) -> Result<Option<Value>, MatchError> {
    if let Some(converted) = coerce(value, kind) {
        return Ok(Some(converted));
    }
    counter!(ENGINE_COERCION_ERRORS_TOTAL, LABEL_KIND => kind.as_str()).increment(1);
    if fail_on_error {
        return Err(MatchError::FieldCoercion {
            field: field.to_owned(),
            kind: kind.as_str(),
        });
    }
    debug!(field, kind = kind.as_str(), "coercion failed, field skipped");
    Ok(None)
}

/// 모든 피연산자가 있으면 이어붙인 문자열을 반환합니다.
fn join_operands(parts: &[Operand], event: &Event) -> Option<String> {
    let mut out = String::new();
    for part in parts {
        out.push_str(&part.resolve(event)?.to_string());
    }
    Some(out)
}

fn split_text(text: &str, separator: Option<&str>, pattern: Option<&SplitPattern>) -> Vec<String> {
    let pieces: Vec<&str> = match (pattern, separator) {
        (Some(SplitPattern(re)), _) => re.split(text).collect(),
        (None, Some(sep)) if !sep.is_empty() => text.split(sep).collect(),
        _ => text.split_whitespace().collect(),
    };
    pieces
        .into_iter()
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TransformContext {
        TransformContext {
            tz: TzSetting::utc(),
            now: Utc::now(),
        }
    }

    fn ops(yaml: &str) -> Vec<TransformOp> {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn run(yaml: &str, event: &mut Event) -> Result<(), MatchError> {
        apply(&ops(yaml), event, &ctx())
    }

    #[test]
    fn set_and_delete() {
        let mut event = Event::new();
        event.set("tmp", "x");
        run(
            r#"
- { op: set, field: event.kind, value: event }
- { op: set, field: event.severity, value: 3 }
- { op: delete, field: tmp }
"#,
            &mut event,
        )
        .unwrap();
        assert_eq!(event.get_str("event.kind"), Some("event"));
        assert_eq!(event.get("event.severity"), Some(&Value::Int(3)));
        assert!(!event.contains("tmp"));
    }

    #[test]
    fn copy_non_ip_without_fail_on_error_is_skipped() {
        let mut event = Event::new();
        event.set("saddr", "not-an-ip");
        run(
            r#"
- { op: copy, from: saddr, to: source.ip, kind: ip }
- { op: set, field: after, value: ran }
"#,
            &mut event,
        )
        .unwrap();
        assert!(!event.contains("source.ip"));
        assert_eq!(event.get_str("after"), Some("ran"));
    }

    #[test]
    fn copy_non_ip_with_fail_on_error_fails() {
        let mut event = Event::new();
        event.set("saddr", "not-an-ip");
        let err = run(
            "- { op: copy, from: saddr, to: source.ip, kind: ip, fail_on_error: true }",
            &mut event,
        )
        .unwrap_err();
        assert_eq!(
            err,
            MatchError::FieldCoercion {
                field: "saddr".to_owned(),
                kind: "ip"
            }
        );
    }

    #[test]
    fn copy_missing_source_policies() {
        let mut event = Event::new();
        run("- { op: copy, from: nope, to: x, ignore_missing: true, fail_on_error: true }", &mut event)
            .unwrap();
        run("- { op: copy, from: nope, to: x }", &mut event).unwrap();
        assert!(!event.contains("x"));
        assert!(run("- { op: copy, from: nope, to: x, fail_on_error: true }", &mut event).is_err());
    }

    #[test]
    fn copy_converts_ip() {
        let mut event = Event::new();
        event.set("saddr", "10.1.2.3");
        run("- { op: copy, from: saddr, to: source.ip, kind: ip }", &mut event).unwrap();
        assert_eq!(
            event.get("source.ip"),
            Some(&Value::Ip("10.1.2.3".parse().unwrap()))
        );
    }

    #[test]
    fn concat_skips_when_field_missing() {
        let mut event = Event::new();
        event.set("user", "bob");
        event.set("domain", "CORP");
        run(
            r#"
- { op: concat, dest: user.id, parts: [ { field: domain }, { literal: "\\" }, { field: user } ] }
- { op: concat, dest: nope, parts: [ { field: missing }, { literal: x } ] }
"#,
            &mut event,
        )
        .unwrap();
        assert_eq!(event.get_str("user.id"), Some("CORP\\bob"));
        assert!(!event.contains("nope"));
    }

    #[test]
    fn date_joins_fields_and_tries_formats() {
        let mut event = Event::new();
        event.set("hdate", "2024-03-01");
        event.set("htime", "10:20:30");
        run(
            r#"
- op: date
  dest: "@timestamp"
  fields: [hdate, htime]
  formats: ["%D/%M/%W %Z", "%W-%M-%D %Z"]
"#,
            &mut event,
        )
        .unwrap();
        assert_eq!(
            event.get("@timestamp").map(ToString::to_string).as_deref(),
            Some("2024-03-01T10:20:30.000Z")
        );
    }

    #[test]
    fn date_failure_is_fatal_only_when_required() {
        let mut event = Event::new();
        event.set("hdate", "garbage");
        run(
            "- { op: date, dest: ts, fields: [hdate], formats: [\"%W-%M-%D\"] }",
            &mut event,
        )
        .unwrap();
        assert!(!event.contains("ts"));
        assert!(
            run(
                "- { op: date, dest: ts, fields: [hdate], formats: [\"%W-%M-%D\"], required: true }",
                &mut event,
            )
            .is_err()
        );
    }

    #[test]
    fn coerce_in_place() {
        let mut event = Event::new();
        event.set("port", "443");
        event.set("bad", "x");
        run(
            r#"
- { op: coerce, field: port, kind: integer }
- { op: coerce, field: bad, kind: integer }
"#,
            &mut event,
        )
        .unwrap();
        assert_eq!(event.get("port"), Some(&Value::Int(443)));
        assert_eq!(event.get_str("bad"), Some("x"));
    }

    #[test]
    fn branch_selects_arm_or_otherwise() {
        let yaml = r#"
- op: branch
  field: kind
  branches:
    login: [ { op: set, field: event.category, value: authentication } ]
  otherwise: [ { op: set, field: event.category, value: other } ]
"#;
        let mut event = Event::new();
        event.set("kind", "login");
        run(yaml, &mut event).unwrap();
        assert_eq!(event.get_str("event.category"), Some("authentication"));

        let mut event = Event::new();
        run(yaml, &mut event).unwrap();
        assert_eq!(event.get_str("event.category"), Some("other"));
    }

    #[test]
    fn append_dedupes() {
        let mut event = Event::new();
        event.set("user", "bob");
        run(
            r#"
- { op: append, field: related.user, value: { field: user } }
- { op: append, field: related.user, value: { literal: bob } }
- { op: append, field: related.user, value: { field: missing } }
"#,
            &mut event,
        )
        .unwrap();
        assert_eq!(
            event.get("related.user"),
            Some(&Value::List(vec!["bob".into()]))
        );
    }

    #[test]
    fn call_and_lookup() {
        let mut event = Event::new();
        event.set("a", "2");
        event.set("code", "4624");
        run(
            r#"
- { op: call, dest: sum, func: calc, args: [ { field: a }, { literal: "*" }, { literal: "21" } ] }
- { op: call, dest: skipped, func: strcat, args: [ { field: missing } ] }
- op: lookup
  dest: event.action
  key: { field: code }
  map: { "4624": logged-in, "4625": logon-failed }
- op: lookup
  dest: event.type
  key: { literal: zzz }
  map: { a: b }
  default: info
"#,
            &mut event,
        )
        .unwrap();
        assert_eq!(event.get_str("sum"), Some("42"));
        assert!(!event.contains("skipped"));
        assert_eq!(event.get_str("event.action"), Some("logged-in"));
        assert_eq!(event.get_str("event.type"), Some("info"));
    }

    #[test]
    fn split_on_whitespace_with_head() {
        let mut event = Event::new();
        event.set("cmd", "svc.exe  -x");
        run(
            "- { op: split, from: cmd, to: process.args, head: process.executable }",
            &mut event,
        )
        .unwrap();
        assert_eq!(event.get_str("process.executable"), Some("svc.exe"));
        assert_eq!(
            event.get("process.args"),
            Some(&Value::List(vec!["svc.exe".into(), "-x".into()]))
        );
    }

    #[test]
    fn split_with_separator_and_pattern() {
        let mut event = Event::new();
        event.set("csv", "a,b,,c");
        event.set("mixed", "a; b ;c");
        run(
            r#"
- { op: split, from: csv, to: csv_list, separator: "," }
- { op: split, from: mixed, to: mixed_list, pattern: "\\s*;\\s*" }
"#,
            &mut event,
        )
        .unwrap();
        assert_eq!(
            event.get("csv_list"),
            Some(&Value::List(vec!["a".into(), "b".into(), "c".into()]))
        );
        assert_eq!(
            event.get("mixed_list"),
            Some(&Value::List(vec!["a".into(), "b".into(), "c".into()]))
        );
    }

    #[test]
    fn bad_split_pattern_is_rejected_at_load() {
        assert!(serde_yaml::from_str::<Vec<TransformOp>>(
            "- { op: split, from: a, to: b, pattern: \"(\" }"
        )
        .is_err());
    }

    #[test]
    fn url_part_extraction() {
        let mut event = Event::new();
        event.set("url", "https://example.com/a/b.php?x=1");
        run(
            r#"
- { op: url, dest: url.domain, from: url, part: domain }
- { op: url, dest: url.extension, from: url, part: ext }
- { op: url, dest: url.query, from: url, part: query }
"#,
            &mut event,
        )
        .unwrap();
        assert_eq!(event.get_str("url.domain"), Some("example.com"));
        assert_eq!(event.get_str("url.extension"), Some(".php"));
        assert_eq!(event.get_str("url.query"), Some("x=1"));
    }

    #[test]
    fn unknown_op_is_rejected() {
        assert!(serde_yaml::from_str::<Vec<TransformOp>>("- { op: explode, field: x }").is_err());
    }
}
