//! 규칙 테이블 YAML 스키마
//!
//! YAML 규칙 파일에서 역직렬화되는 구조체들을 정의합니다.
//! 로드 후 [`compile`](super::compile)이 실행 형태인 [`RuleTable`](super::RuleTable)로 변환합니다.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::TzSetting;
use crate::emit::EmitSpec;
use crate::tagval::TagSeparators;
use crate::transform::TransformOp;

/// 기본 나머지 필드 이름
pub const DEFAULT_REMAINDER_FIELD: &str = "p0";
/// 기본 메시지 필드 이름
pub const DEFAULT_MESSAGE_FIELD: &str = "message";
/// 기본 판별 키 필드
pub const DEFAULT_KEY_FIELD: &str = "messageid";
/// 기본 메시지 본문 필드
pub const DEFAULT_PAYLOAD_FIELD: &str = "payload";

/// 규칙 테이블 -- 하나의 YAML 파일에 대응합니다.
///
/// # YAML 스키마
/// ```yaml
/// name: cyberark
/// input: text
/// strip_priority: true
/// tag_specs:
///   tvm: { pair_separator: ";", kv_separator: "=", open_quote: "\"", close_quote: "\"" }
/// headers:
///   kind: alternation
///   members:
///     - { kind: rule, id: "HEADER#1", pattern: "%{hfld1}: %{messageid} %{payload}" }
/// dispatch:
///   messages:
///     "300": { kind: tagval, id: "MSG300", spec: tvm, keys: { Issuer: username } }
/// finally:
///   - { op: set, field: event.kind, value: event }
/// emit:
///   mappings: { username: { to: [ { field: user.name } ] } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RuleTableDef {
    /// 테이블 이름 (로드된 테이블 사이에서 유일)
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// 입력 형식
    #[serde(default)]
    pub input: InputFormat,
    /// JSON 입력의 키 접두어
    #[serde(default)]
    pub json_target: String,
    /// 엔진 설정을 덮어쓰는 PRI 제거 여부
    #[serde(default)]
    pub strip_priority: Option<bool>,
    /// 엔진 설정을 덮어쓰는 원본 보존 여부
    #[serde(default)]
    pub keep_original: Option<bool>,
    #[serde(default = "default_remainder_field")]
    pub remainder_field: String,
    /// 헤더가 읽는 필드 (PRI 제거 후 줄)
    #[serde(default = "default_message_field")]
    pub message_field: String,
    /// 엔진 설정을 덮어쓰는 시간대
    #[serde(default)]
    pub tz_offset: Option<TzSetting>,
    /// 이름 붙은 태그/값 구분자 집합
    #[serde(default)]
    pub tag_specs: BTreeMap<String, TagSeparators>,
    /// `ref`로 참조하는 공유 노드
    #[serde(default)]
    pub shared: BTreeMap<String, NodeDef>,
    #[serde(default)]
    pub headers: Option<NodeDef>,
    #[serde(default)]
    pub dispatch: Option<DispatchDef>,
    /// 메시지 매칭 후 항상 실행되는 변환
    #[serde(default)]
    pub finally: Vec<TransformOp>,
    #[serde(default)]
    pub emit: EmitSpec,
}

fn default_remainder_field() -> String {
    DEFAULT_REMAINDER_FIELD.to_owned()
}

fn default_message_field() -> String {
    DEFAULT_MESSAGE_FIELD.to_owned()
}

fn default_key_field() -> String {
    DEFAULT_KEY_FIELD.to_owned()
}

fn default_payload_field() -> String {
    DEFAULT_PAYLOAD_FIELD.to_owned()
}

/// 입력 형식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// 텍스트 줄 (헤더 패턴으로 분해)
    #[default]
    Text,
    /// JSON 객체 한 줄
    Json,
}

/// 디스패치 섹션
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchDef {
    /// 판별 키 필드
    #[serde(default = "default_key_field")]
    pub key_field: String,
    /// 메시지 노드의 기본 입력 필드
    #[serde(default = "default_payload_field")]
    pub source_field: String,
    /// 판별 키 -> 메시지 노드
    #[serde(default)]
    pub messages: BTreeMap<String, NodeDef>,
}

/// 규칙 노드 정의 (`kind` 태그로 구분)
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeDef {
    /// 패턴 규칙
    Rule {
        id: String,
        #[serde(default)]
        source: Option<String>,
        pattern: String,
        #[serde(default)]
        on_success: Vec<TransformOp>,
    },
    /// 순서 있는 대안
    Alternation {
        #[serde(default)]
        source: Option<String>,
        members: Vec<NodeDef>,
    },
    /// 순차 매칭 체인
    Chain {
        id: String,
        #[serde(default)]
        source: Option<String>,
        fragments: Vec<NodeDef>,
        #[serde(default)]
        on_success: Vec<TransformOp>,
    },
    /// 태그/값 디코딩
    #[serde(rename = "tagval")]
    TagValue {
        id: String,
        #[serde(default)]
        source: Option<String>,
        /// `tag_specs` 항목 이름
        spec: String,
        /// 원본 키 -> 필드 이름
        keys: BTreeMap<String, String>,
        #[serde(default)]
        on_success: Vec<TransformOp>,
    },
    /// `shared` 노드 참조
    Ref { name: String },
}

impl NodeDef {
    /// 로그와 에러 메시지용 식별자
    pub fn label(&self) -> &str {
        match self {
            Self::Rule { id, .. } | Self::Chain { id, .. } | Self::TagValue { id, .. } => id,
            Self::Alternation { .. } => "(alternation)",
            Self::Ref { name } => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_table_uses_defaults() {
        let def: RuleTableDef = serde_yaml::from_str("name: t").unwrap();
        assert_eq!(def.input, InputFormat::Text);
        assert_eq!(def.remainder_field, "p0");
        assert_eq!(def.message_field, "message");
        assert!(def.headers.is_none());
        assert!(def.strip_priority.is_none());
        assert!(def.emit.is_empty());
    }

    #[test]
    fn node_kinds_deserialize() {
        let yaml = r#"
kind: alternation
members:
  - { kind: rule, id: A, pattern: "a=%{a}" }
  - { kind: ref, name: shared_b }
  - kind: chain
    id: C
    fragments:
      - { kind: rule, id: C1, pattern: "%{x} %{p0}" }
  - { kind: tagval, id: T, spec: tvm, keys: { Issuer: username } }
"#;
        let node: NodeDef = serde_yaml::from_str(yaml).unwrap();
        let NodeDef::Alternation { source, members } = node else {
            panic!("expected alternation");
        };
        assert!(source.is_none());
        assert_eq!(members.len(), 4);
        assert_eq!(members[1].label(), "shared_b");
        assert!(matches!(members[2], NodeDef::Chain { .. }));
        assert!(matches!(members[3], NodeDef::TagValue { .. }));
    }

    #[test]
    fn dispatch_defaults() {
        let def: DispatchDef = serde_yaml::from_str("messages: {}").unwrap();
        assert_eq!(def.key_field, "messageid");
        assert_eq!(def.source_field, "payload");
    }

    #[test]
    fn unknown_node_kind_is_rejected() {
        let result: Result<NodeDef, _> = serde_yaml::from_str("{ kind: regex, id: X }");
        assert!(result.is_err());
    }

    #[test]
    fn tz_and_input_parse() {
        let def: RuleTableDef =
            serde_yaml::from_str("{ name: cs, input: json, json_target: crowdstrike, tz_offset: \"+02:00\" }")
                .unwrap();
        assert_eq!(def.input, InputFormat::Json);
        assert_eq!(def.json_target, "crowdstrike");
        assert!(matches!(def.tz_offset, Some(TzSetting::Fixed(_))));
    }
}
