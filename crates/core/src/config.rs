//! 설정 관리 — logsift.toml 파싱 및 런타임 설정
//!
//! [`LogsiftConfig`]는 엔진과 CLI가 공유하는 최상위 설정 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGSIFT_ENGINE_TZ_OFFSET=+09:00` 형식)
//! 3. 설정 파일 (`logsift.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logsift_core::error::LogsiftError> {
//! use logsift_core::config::LogsiftConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogsiftConfig::load("logsift.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogsiftConfig::parse("[engine]\nworkers = 4")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogsiftError};

/// 라인 최대 크기 상한 (16 MB)
const MAX_LINE_BYTES_LIMIT: usize = 16 * 1024 * 1024;

/// logsift 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogsiftConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 분해 엔진 설정
    #[serde(default)]
    pub engine: EngineSection,
}

impl LogsiftConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogsiftError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogsiftError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogsiftError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogsiftError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogsiftError> {
        toml::from_str(toml_str).map_err(|e| {
            LogsiftError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGSIFT_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        override_string(&mut self.general.log_level, "LOGSIFT_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGSIFT_GENERAL_LOG_FORMAT");

        override_csv(&mut self.engine.rule_paths, "LOGSIFT_ENGINE_RULE_PATHS");
        override_string(&mut self.engine.tz_offset, "LOGSIFT_ENGINE_TZ_OFFSET");
        override_bool(
            &mut self.engine.strip_priority,
            "LOGSIFT_ENGINE_STRIP_PRIORITY",
        );
        override_bool(&mut self.engine.keep_original, "LOGSIFT_ENGINE_KEEP_ORIGINAL");
        override_usize(
            &mut self.engine.max_line_bytes,
            "LOGSIFT_ENGINE_MAX_LINE_BYTES",
        );
        override_usize(&mut self.engine.workers, "LOGSIFT_ENGINE_WORKERS");
        override_usize(&mut self.engine.batch_size, "LOGSIFT_ENGINE_BATCH_SIZE");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogsiftError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if !is_valid_tz_offset(&self.engine.tz_offset) {
            return Err(ConfigError::InvalidValue {
                field: "engine.tz_offset".to_owned(),
                reason: "must be 'local', 'event' or a fixed offset like '+09:00'".to_owned(),
            }
            .into());
        }

        if self.engine.max_line_bytes == 0 || self.engine.max_line_bytes > MAX_LINE_BYTES_LIMIT {
            return Err(ConfigError::InvalidValue {
                field: "engine.max_line_bytes".to_owned(),
                reason: format!("must be between 1 and {MAX_LINE_BYTES_LIMIT}"),
            }
            .into());
        }

        if self.engine.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.batch_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.engine.rule_paths.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "engine.rule_paths".to_owned(),
                reason: "paths must not be empty".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 분해 엔진 설정 (`[engine]` 섹션)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// 규칙 테이블 파일 또는 디렉토리 경로
    pub rule_paths: Vec<String>,
    /// 기본 시간대 (`local`, `event`, `+HH:MM`)
    ///
    /// 테이블에 `tz_offset`이 지정되면 테이블 값이 우선합니다.
    pub tz_offset: String,
    /// 선행 `<PRI>` 제거 여부 (테이블 설정이 없을 때의 기본값)
    pub strip_priority: bool,
    /// 원본 라인을 `event.original`에 보존할지 여부
    pub keep_original: bool,
    /// 라인 최대 바이트 수
    pub max_line_bytes: usize,
    /// 배치 처리 워커 수 (0 = rayon 기본값)
    pub workers: usize,
    /// CLI가 한 번에 처리할 라인 수
    pub batch_size: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            rule_paths: vec!["rules".to_owned()],
            tz_offset: "local".to_owned(),
            strip_priority: true,
            keep_original: false,
            max_line_bytes: 64 * 1024,
            workers: 0,
            batch_size: 1024,
        }
    }
}

/// 시간대 설정 문자열 검증
///
/// `local`, `event`, 또는 `+HH:MM` / `-HH:MM` 형식을 허용합니다.
pub fn is_valid_tz_offset(value: &str) -> bool {
    match value {
        "local" | "event" => true,
        other => parse_fixed_offset_secs(other).is_some(),
    }
}

/// `+HH:MM` / `-HH:MM` 형식을 초 단위 오프셋으로 변환합니다.
pub fn parse_fixed_offset_secs(value: &str) -> Option<i32> {
    let bytes = value.as_bytes();
    if bytes.len() != 6 || bytes[3] != b':' {
        return None;
    }
    let sign = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let hours: i32 = value.get(1..3)?.parse().ok()?;
    let minutes: i32 = value.get(4..6)?.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    Some(sign * (hours * 3600 + minutes * 60))
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
