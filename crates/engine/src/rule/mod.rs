//! 규칙 테이블 -- YAML DSL, 컴파일, 로딩
//!
//! # 아키텍처
//! - [`types`]: YAML 스키마 ([`RuleTableDef`], [`NodeDef`])
//! - [`compile`]: 참조 해석, 유효성 검증, 노드 트리 생성
//! - [`loader`]: 파일/디렉토리 로딩

pub mod compile;
pub mod loader;
pub mod types;

pub use compile::{RuleTable, compile_table};
pub use loader::RuleLoader;
pub use types::{DispatchDef, InputFormat, NodeDef, RuleTableDef};
