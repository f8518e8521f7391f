//! 엔진 설정
//!
//! [`EngineConfig`]는 core의 [`EngineSection`](logsift_core::config::EngineSection)을
//! 기반으로 엔진 전용 설정을 제공합니다. 시간대 문자열은 이 단계에서
//! [`TzSetting`]으로 해석됩니다.
//!
//! # 사용 예시
//! ```ignore
//! use logsift_core::config::LogsiftConfig;
//! use logsift_engine::config::EngineConfig;
//!
//! let core_config = LogsiftConfig::default();
//! let config = EngineConfig::from_core(&core_config.engine)?;
//! ```

use std::fmt;

use chrono::{FixedOffset, Local, NaiveDateTime, Offset, TimeZone, Utc};
use logsift_core::config::{EngineSection, parse_fixed_offset_secs};
use logsift_core::event::{Event, FIELD_TIMEZONE};
use serde::Deserialize;

use crate::error::EngineError;

/// 배치를 병렬로 나누기 시작하는 최소 라인 수
const DEFAULT_PARALLEL_THRESHOLD: usize = 64;

/// 최대 워커 수
const MAX_WORKERS: usize = 256;

/// 날짜 해석에 쓰이는 시간대
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum TzSetting {
    /// 호스트 로컬 시간대
    #[default]
    Local,
    /// 이벤트의 `event.timezone` 필드 (없거나 해석 불가면 UTC)
    Event,
    /// 고정 오프셋
    Fixed(FixedOffset),
}

impl TzSetting {
    /// 설정 문자열을 해석합니다 (`local`, `event`, `utc`, `+HH`, `+HHMM`, `+HH:MM`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "local" => Some(Self::Local),
            "event" => Some(Self::Event),
            other => parse_offset_lenient(other).map(Self::Fixed),
        }
    }

    /// UTC 고정 오프셋
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    /// 로컬 시각 `naive`에 적용할 오프셋을 결정합니다.
    pub fn resolve(&self, event: &Event, naive: &NaiveDateTime) -> FixedOffset {
        match self {
            Self::Fixed(offset) => *offset,
            Self::Local => Local
                .offset_from_local_datetime(naive)
                .earliest()
                .map(|o| o.fix())
                .unwrap_or_else(|| Local::now().offset().fix()),
            Self::Event => event
                .get_text(FIELD_TIMEZONE)
                .and_then(|tz| parse_offset_lenient(&tz))
                .unwrap_or_else(|| Utc.fix()),
        }
    }
}

impl TryFrom<String> for TzSetting {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid time zone offset '{value}'"))
    }
}

impl fmt::Display for TzSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Event => f.write_str("event"),
            Self::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

/// 관대한 오프셋 파서
///
/// `Z`, `UTC`, `+HH`, `+HHMM`, `+HH:MM` 형식을 허용합니다.
pub fn parse_offset_lenient(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    if let Some(secs) = parse_fixed_offset_secs(value) {
        return FixedOffset::east_opt(secs);
    }

    let (sign, digits) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (
            digits.get(..2)?.parse::<i32>().ok()?,
            digits.get(2..)?.parse::<i32>().ok()?,
        ),
        _ => return None,
    };
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// 엔진 설정
///
/// core의 `EngineSection`에서 파생되며, 엔진 내부에서 사용하는 추가 설정을 포함합니다.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 규칙 테이블 파일 또는 디렉토리 경로
    pub rule_paths: Vec<String>,
    /// 기본 시간대
    pub tz: TzSetting,
    /// 선행 `<PRI>` 제거 여부 기본값
    pub strip_priority: bool,
    /// 원본 라인 보존 여부
    pub keep_original: bool,
    /// 라인 최대 바이트 수
    pub max_line_bytes: usize,
    /// 배치 워커 수 (0 = rayon 전역 풀)
    pub workers: usize,
    /// CLI 배치 크기
    pub batch_size: usize,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// 이보다 작은 배치는 순차 처리
    pub parallel_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rule_paths: vec!["rules".to_owned()],
            tz: TzSetting::Local,
            strip_priority: true,
            keep_original: false,
            max_line_bytes: 64 * 1024,
            workers: 0,
            batch_size: 1024,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl EngineConfig {
    /// core의 `EngineSection`에서 엔진 설정을 생성합니다.
    pub fn from_core(core: &EngineSection) -> Result<Self, EngineError> {
        let tz = TzSetting::parse(&core.tz_offset).ok_or_else(|| EngineError::Config {
            field: "tz_offset".to_owned(),
            reason: format!("invalid time zone offset '{}'", core.tz_offset),
        })?;
        Ok(Self {
            rule_paths: core.rule_paths.clone(),
            tz,
            strip_priority: core.strip_priority,
            keep_original: core.keep_original,
            max_line_bytes: core.max_line_bytes,
            workers: core.workers,
            batch_size: core.batch_size,
            ..Self::default()
        })
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_line_bytes == 0 {
            return Err(EngineError::Config {
                field: "max_line_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.batch_size == 0 {
            return Err(EngineError::Config {
                field: "batch_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.workers > MAX_WORKERS {
            return Err(EngineError::Config {
                field: "workers".to_owned(),
                reason: format!("must be 0-{MAX_WORKERS}"),
            });
        }

        if self.parallel_threshold == 0 {
            return Err(EngineError::Config {
                field: "parallel_threshold".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }
}

/// 엔진 설정 빌더
#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 규칙 경로를 설정합니다.
    pub fn rule_paths(mut self, paths: Vec<String>) -> Self {
        self.config.rule_paths = paths;
        self
    }

    /// 기본 시간대를 설정합니다.
    pub fn tz(mut self, tz: TzSetting) -> Self {
        self.config.tz = tz;
        self
    }

    /// `<PRI>` 제거 기본값을 설정합니다.
    pub fn strip_priority(mut self, strip: bool) -> Self {
        self.config.strip_priority = strip;
        self
    }

    /// 원본 라인 보존 여부를 설정합니다.
    pub fn keep_original(mut self, keep: bool) -> Self {
        self.config.keep_original = keep;
        self
    }

    /// 라인 최대 바이트 수를 설정합니다.
    pub fn max_line_bytes(mut self, max: usize) -> Self {
        self.config.max_line_bytes = max;
        self
    }

    /// 워커 수를 설정합니다.
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// 배치 크기를 설정합니다.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// 병렬 처리 임계값을 설정합니다.
    pub fn parallel_threshold(mut self, threshold: usize) -> Self {
        self.config.parallel_threshold = threshold;
        self
    }

    /// 설정을 검증하고 `EngineConfig`를 생성합니다.
    pub fn build(self) -> Result<EngineConfig, EngineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn default_config_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_preserves_values() {
        let core = EngineSection {
            tz_offset: "+09:00".to_owned(),
            keep_original: true,
            workers: 4,
            ..Default::default()
        };
        let config = EngineConfig::from_core(&core).unwrap();
        assert_eq!(
            config.tz,
            TzSetting::Fixed(FixedOffset::east_opt(9 * 3600).unwrap())
        );
        assert!(config.keep_original);
        assert_eq!(config.workers, 4);
        // 확장 필드는 기본값
        assert_eq!(config.parallel_threshold, DEFAULT_PARALLEL_THRESHOLD);
    }

    #[test]
    fn from_core_rejects_bad_tz() {
        let core = EngineSection {
            tz_offset: "Asia/Seoul".to_owned(),
            ..Default::default()
        };
        let err = EngineConfig::from_core(&core).unwrap_err();
        assert!(err.to_string().contains("tz_offset"));
    }

    #[test]
    fn builder_creates_valid_config() {
        let config = EngineConfigBuilder::new()
            .tz(TzSetting::Event)
            .workers(2)
            .parallel_threshold(8)
            .build()
            .unwrap();
        assert_eq!(config.tz, TzSetting::Event);
        assert_eq!(config.workers, 2);
        assert_eq!(config.parallel_threshold, 8);
    }

    #[test]
    fn builder_rejects_invalid_config() {
        assert!(EngineConfigBuilder::new().batch_size(0).build().is_err());
        assert!(EngineConfigBuilder::new().workers(10_000).build().is_err());
    }

    #[test]
    fn lenient_offsets() {
        let east = |s| FixedOffset::east_opt(s).unwrap();
        assert_eq!(parse_offset_lenient("+02"), Some(east(7200)));
        assert_eq!(parse_offset_lenient("+0500"), Some(east(5 * 3600)));
        assert_eq!(parse_offset_lenient("-07:30"), Some(east(-(7 * 3600 + 1800))));
        assert_eq!(parse_offset_lenient("Z"), Some(east(0)));
        assert_eq!(parse_offset_lenient("UTC"), Some(east(0)));
        assert_eq!(parse_offset_lenient("+5"), None);
        assert_eq!(parse_offset_lenient("+2500"), None);
        assert_eq!(parse_offset_lenient("EST"), None);
    }

    #[test]
    fn tz_setting_parse_keywords() {
        assert_eq!(TzSetting::parse("local"), Some(TzSetting::Local));
        assert_eq!(TzSetting::parse("event"), Some(TzSetting::Event));
        assert_eq!(TzSetting::parse("utc"), Some(TzSetting::utc()));
        assert_eq!(TzSetting::parse("nowhere"), None);
    }

    #[test]
    fn event_tz_reads_timezone_field() {
        let naive = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut event = Event::new();
        assert_eq!(TzSetting::Event.resolve(&event, &naive), Utc.fix());

        event.set(FIELD_TIMEZONE, "-05:00");
        assert_eq!(
            TzSetting::Event.resolve(&event, &naive),
            FixedOffset::west_opt(5 * 3600).unwrap()
        );

        event.set(FIELD_TIMEZONE, "garbage");
        assert_eq!(TzSetting::Event.resolve(&event, &naive), Utc.fix());
    }

    #[test]
    fn tz_setting_deserializes_from_string() {
        let tz: TzSetting = serde_json::from_str("\"+01:00\"").unwrap();
        assert_eq!(tz, TzSetting::Fixed(FixedOffset::east_opt(3600).unwrap()));
        assert!(serde_json::from_str::<TzSetting>("\"mars\"").is_err());
    }
}
