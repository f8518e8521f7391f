//! 엔진 에러 타입
//!
//! [`EngineError`]는 규칙 테이블 로드/컴파일과 엔진 설정에서 발생하는 에러입니다.
//! `From<EngineError> for LogsiftError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.
//!
//! [`MatchError`]는 한 줄을 처리하는 동안에만 의미가 있는 복구 가능한 결과로,
//! 다음 대안을 시도하거나 헤더 필드만 남기는 데 쓰입니다.

use logsift_core::error::{ConfigError, LogsiftError, RuleError};

/// 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// 패턴 템플릿 컴파일 실패
    #[error("compile error: '{template}' at offset {offset}: {reason}")]
    Compile {
        /// 원본 템플릿
        template: String,
        /// 실패 위치 (바이트 오프셋)
        offset: usize,
        /// 실패 사유
        reason: String,
    },

    /// 규칙 테이블 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 규칙 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 규칙 유효성 검증 실패
    #[error("rule validation error: rule '{rule_id}': {reason}")]
    RuleValidation {
        /// 문제가 된 규칙 ID
        rule_id: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<EngineError> for LogsiftError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Compile {
                template,
                offset,
                reason,
            } => LogsiftError::Rule(RuleError::Compile {
                template,
                offset,
                reason,
            }),
            EngineError::RuleLoad { path, reason } => {
                LogsiftError::Rule(RuleError::Load { path, reason })
            }
            EngineError::RuleValidation { rule_id, reason } => {
                LogsiftError::Rule(RuleError::Validation { rule_id, reason })
            }
            EngineError::Config { field, reason } => {
                LogsiftError::Config(ConfigError::InvalidValue { field, reason })
            }
            EngineError::Io(e) => LogsiftError::Io(e),
            EngineError::Regex(e) => LogsiftError::Rule(RuleError::Validation {
                rule_id: "(regex)".to_owned(),
                reason: e.to_string(),
            }),
        }
    }
}

/// 한 줄 처리 중의 매칭 결과 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    /// 구조적 불일치 (다음 대안 시도)
    #[error("no match")]
    NoMatch,

    /// 패턴은 매칭되었으나 `fail_on_error` 변환이 실패하여 규칙이 롤백됨
    #[error("field '{field}' could not be converted to {kind}")]
    FieldCoercion {
        /// 변환 대상 필드
        field: String,
        /// 목적 타입 이름
        kind: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_display() {
        let err = EngineError::Compile {
            template: "%{a".to_owned(),
            offset: 0,
            reason: "unterminated placeholder".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("%{a"));
        assert!(msg.contains("offset 0"));
    }

    #[test]
    fn compile_error_converts_to_rule_error() {
        let err = EngineError::Compile {
            template: "%{ }".to_owned(),
            offset: 0,
            reason: "blank placeholder name".to_owned(),
        };
        let top: LogsiftError = err.into();
        assert!(matches!(
            top,
            LogsiftError::Rule(RuleError::Compile { offset: 0, .. })
        ));
    }

    #[test]
    fn config_error_converts_to_invalid_value() {
        let err = EngineError::Config {
            field: "tz_offset".to_owned(),
            reason: "bad offset".to_owned(),
        };
        let top: LogsiftError = err.into();
        assert!(matches!(
            top,
            LogsiftError::Config(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn rule_load_error_display() {
        let err = EngineError::RuleLoad {
            path: "/etc/logsift/rules/cyberark.yml".to_owned(),
            reason: "invalid YAML".to_owned(),
        };
        assert!(err.to_string().contains("cyberark.yml"));
    }

    #[test]
    fn match_error_display() {
        let err = MatchError::FieldCoercion {
            field: "source.ip".to_owned(),
            kind: "ip",
        };
        assert_eq!(
            err.to_string(),
            "field 'source.ip' could not be converted to ip"
        );
        assert_eq!(MatchError::NoMatch.to_string(), "no match");
    }
}
