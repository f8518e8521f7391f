//! 디스패치 테이블 — 판별 키로 메시지 규칙을 고릅니다.

use std::collections::HashMap;

use crate::error::EngineError;
use crate::node::Node;

/// 판별 키 -> 메시지 노드
///
/// 조회는 대소문자를 구분하는 정확 일치이며, 키가 없으면 헤더 필드만 남습니다.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    /// 판별 키를 읽는 필드 (헤더가 캡처)
    pub key_field: String,
    /// 메시지 노드의 기본 입력 필드
    pub source_field: String,
    entries: HashMap<String, Node>,
}

impl DispatchTable {
    pub fn new(key_field: impl Into<String>, source_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
            source_field: source_field.into(),
            entries: HashMap::new(),
        }
    }

    /// 항목을 추가합니다. 같은 키가 이미 있으면 에러입니다.
    pub fn insert(&mut self, key: impl Into<String>, node: Node) -> Result<(), EngineError> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(EngineError::RuleValidation {
                rule_id: key,
                reason: "duplicate dispatch key".to_owned(),
            });
        }
        self.entries.insert(key, node);
        Ok(())
    }

    pub fn dispatch(&self, key: &str) -> Option<&Node> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
