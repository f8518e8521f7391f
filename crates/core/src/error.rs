//! 에러 타입 — 도메인별 에러 정의

/// logsift 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogsiftError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 규칙 테이블 로딩/컴파일 에러
    #[error("rule error: {0}")]
    Rule(#[from] RuleError),

    /// 라인 분해 에러
    #[error("dissect error: {0}")]
    Dissect(#[from] DissectError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 규칙 테이블 에러
///
/// 로드 시점에 발생하며, 해당 테이블 전체가 거부됩니다.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// 패턴 템플릿 컴파일 실패
    #[error("invalid template '{template}' at offset {offset}: {reason}")]
    Compile {
        template: String,
        offset: usize,
        reason: String,
    },

    /// 규칙 파일 로드 실패
    #[error("failed to load rule table '{path}': {reason}")]
    Load { path: String, reason: String },

    /// 규칙 검증 실패
    #[error("rule '{rule_id}' is invalid: {reason}")]
    Validation { rule_id: String, reason: String },
}

/// 라인 분해 에러
///
/// 한 줄의 처리에만 영향을 주며, 다른 줄로 전파되지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum DissectError {
    /// 입력 라인 크기 초과
    #[error("line too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    /// 등록되지 않은 규칙 테이블
    #[error("unknown rule table: {0}")]
    UnknownTable(String),

    /// 입력 디코딩 실패
    #[error("failed to decode input: {0}")]
    Decode(String),
}
