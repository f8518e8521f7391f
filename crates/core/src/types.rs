//! 도메인 타입 — 엔진과 CLI가 공유하는 공통 타입

use std::fmt;

use serde::{Deserialize, Serialize};

/// 필드 변환 종류
///
/// `copy`, `coerce` 변환과 emit 매핑에서 목적 타입을 지정할 때 사용합니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// 문자열 (변환 없음)
    #[default]
    #[serde(alias = "keyword")]
    String,
    /// IPv4/IPv6 주소
    Ip,
    /// 부호 있는 64비트 정수
    #[serde(alias = "long")]
    Integer,
    /// 64비트 부동소수점
    #[serde(alias = "double")]
    Float,
    /// 불리언
    Boolean,
    /// 소문자 문자열
    Lowercase,
    /// 밀리초 단위 epoch (초 단위 값은 x1000으로 보정)
    EpochMillis,
}

impl FieldKind {
    /// 설정/로그에 쓰이는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Ip => "ip",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Lowercase => "lowercase",
            Self::EpochMillis => "epoch_millis",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 분해 파이프라인 단계
///
/// `HeaderMatch -> Dispatch -> MessageMatch -> Transform -> Emit` 순서로 진행하며,
/// 헤더 매칭에 실패하면 `Unmatched`에서 종료합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    HeaderMatch,
    Dispatch,
    MessageMatch,
    Transform,
    Emit,
    Unmatched,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::HeaderMatch => "header_match",
            Self::Dispatch => "dispatch",
            Self::MessageMatch => "message_match",
            Self::Transform => "transform",
            Self::Emit => "emit",
            Self::Unmatched => "unmatched",
        };
        f.write_str(name)
    }
}

/// 한 줄의 분해 결과 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DissectStatus {
    /// 헤더와 메시지 모두 매칭
    Matched,
    /// 헤더만 매칭 (디스패치 키 없음 또는 메시지 매칭 실패)
    HeaderOnly,
    /// 헤더 매칭 실패
    Unmatched,
}

impl fmt::Display for DissectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matched => write!(f, "matched"),
            Self::HeaderOnly => write!(f, "header_only"),
            Self::Unmatched => write!(f, "unmatched"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_kind_deserializes_snake_case_and_aliases() {
        let kind: FieldKind = serde_json::from_str("\"epoch_millis\"").unwrap();
        assert_eq!(kind, FieldKind::EpochMillis);
        let kind: FieldKind = serde_json::from_str("\"long\"").unwrap();
        assert_eq!(kind, FieldKind::Integer);
        let kind: FieldKind = serde_json::from_str("\"keyword\"").unwrap();
        assert_eq!(kind, FieldKind::String);
    }

    #[test]
    fn field_kind_rejects_unknown_name() {
        assert!(serde_json::from_str::<FieldKind>("\"geo_point\"").is_err());
    }

    #[test]
    fn field_kind_display_matches_serde_name() {
        for kind in [
            FieldKind::String,
            FieldKind::Ip,
            FieldKind::Integer,
            FieldKind::Float,
            FieldKind::Boolean,
            FieldKind::Lowercase,
            FieldKind::EpochMillis,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::HeaderMatch.to_string(), "header_match");
        assert_eq!(Stage::Unmatched.to_string(), "unmatched");
    }

    #[test]
    fn dissect_status_display() {
        assert_eq!(DissectStatus::HeaderOnly.to_string(), "header_only");
    }
}
