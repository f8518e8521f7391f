#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`pattern`]: `%{name}` 템플릿 컴파일과 비정규식 매처
//! - [`node`]: 규칙, 대안 그룹, 순차 체인, 태그/값 규칙
//! - [`dispatch`]: 판별 키 -> 메시지 노드 테이블
//! - [`tagval`]: key=value 페이로드 디코더
//! - [`transform`]: 필드 변환 연산, 타입 변환, 날짜 해석, 내장 함수
//! - [`emit`]: 출력 필드 매핑과 임시 필드 정리
//! - [`rule`]: YAML 규칙 테이블 스키마, 컴파일, 로더
//! - [`pipeline`]: 한 줄 분해 파이프라인 (`LineDissector` 구현)
//! - [`engine`]: 테이블별 파이프라인 레지스트리
//! - [`config`]: 엔진 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! line -> [PRI strip] -> HeaderMatch -> Dispatch -> MessageMatch -> finally -> Emit -> Event
//!                           |                           |
//!                     Alternation               Rule / Chain / TagValue
//! ```

pub mod config;
pub mod dispatch;
pub mod emit;
pub mod engine;
pub mod error;
pub mod json;
pub mod node;
pub mod pattern;
pub mod pipeline;
pub mod rule;
pub mod syslog;
pub mod tagval;
pub mod transform;

// --- 주요 타입 re-export ---

// 엔진 / 파이프라인
pub use engine::DissectEngine;
pub use pipeline::{DissectOutcome, DissectPipeline};

// 설정
pub use config::{EngineConfig, EngineConfigBuilder, TzSetting};

// 에러
pub use error::{EngineError, MatchError};

// 패턴
pub use pattern::{Pattern, PatternCache, Segment, match_pattern};

// 규칙
pub use dispatch::DispatchTable;
pub use node::{Alternation, Chain, EvalContext, Matched, Node, Rule, TagValueRule};
pub use rule::{RuleLoader, RuleTable, RuleTableDef};
pub use tagval::{TagSeparators, TagSpec};

// 변환
pub use emit::EmitSpec;
pub use transform::{TransformContext, TransformOp};
