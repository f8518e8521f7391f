#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, DissectError, LogsiftError, RuleError};

// 설정
pub use config::LogsiftConfig;

// 이벤트
pub use event::{Event, Metadata, Value};

// 파이프라인 trait
pub use pipeline::{Emitter, LineDissector};

// 도메인 타입
pub use types::{DissectStatus, FieldKind, Stage};
