//! 규칙 테이블 컴파일
//!
//! [`RuleTableDef`]를 검증하고 실행 형태인 [`RuleTable`]로 변환합니다.
//! 패턴은 [`PatternCache`]로 한 번만 컴파일되고, `shared` 노드는 한 번 만들어진 뒤
//! 모든 참조가 같은 `Arc`를 공유합니다.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use crate::config::TzSetting;
use crate::dispatch::DispatchTable;
use crate::emit::EmitSpec;
use crate::error::EngineError;
use crate::node::{Alternation, Chain, Node, Rule, TagValueRule};
use crate::pattern::PatternCache;
use crate::tagval::{TagSeparators, TagSpec};
use crate::transform::TransformOp;

use super::types::{InputFormat, NodeDef, RuleTableDef};

/// 규칙 ID 최대 길이
const MAX_RULE_ID_LEN: usize = 256;

/// 테이블 이름 형식
static TABLE_NAME_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$"));

/// 컴파일된 규칙 테이블
///
/// 로드 후 불변이며 파이프라인이 `Arc`로 공유합니다.
#[derive(Debug)]
pub struct RuleTable {
    pub name: String,
    pub description: String,
    pub input: InputFormat,
    pub json_target: String,
    pub strip_priority: Option<bool>,
    pub keep_original: Option<bool>,
    pub remainder_field: String,
    pub message_field: String,
    pub tz: Option<TzSetting>,
    pub headers: Option<Node>,
    pub dispatch: Option<DispatchTable>,
    pub finally: Vec<TransformOp>,
    pub emit: EmitSpec,
    /// 컴파일된 고유 패턴 수
    pub pattern_count: usize,
}

/// 테이블 정의를 컴파일합니다.
pub fn compile_table(def: RuleTableDef) -> Result<RuleTable, EngineError> {
    validate_table_name(&def.name)?;
    if def.input == InputFormat::Text && def.headers.is_none() {
        return Err(invalid(&def.name, "text input tables need a headers node"));
    }
    for (name, separators) in &def.tag_specs {
        if separators.pair_separator.is_empty() || separators.kv_separator.is_empty() {
            return Err(invalid(name, "tag spec separators must not be empty"));
        }
    }

    let shared_default = def
        .dispatch
        .as_ref()
        .map_or(def.message_field.as_str(), |d| d.source_field.as_str())
        .to_owned();

    let mut compiler = Compiler {
        shared: &def.shared,
        tag_specs: &def.tag_specs,
        shared_default,
        patterns: PatternCache::new(),
        resolved: HashMap::new(),
        resolving: Vec::new(),
    };

    let headers = def
        .headers
        .as_ref()
        .map(|h| compiler.compile(h, &def.message_field))
        .transpose()?;

    let dispatch = match &def.dispatch {
        Some(d) => {
            if d.key_field.is_empty() {
                return Err(invalid(&def.name, "dispatch key_field must not be empty"));
            }
            let mut table = DispatchTable::new(d.key_field.as_str(), d.source_field.as_str());
            for (key, node_def) in &d.messages {
                let node = compiler.compile(node_def, &d.source_field)?;
                table.insert(key.as_str(), node)?;
            }
            Some(table)
        }
        None => None,
    };

    let pattern_count = compiler.patterns.len();
    debug!(
        table = def.name.as_str(),
        patterns = pattern_count,
        shared = compiler.resolved.len(),
        "compiled rule table"
    );

    Ok(RuleTable {
        name: def.name,
        description: def.description,
        input: def.input,
        json_target: def.json_target,
        strip_priority: def.strip_priority,
        keep_original: def.keep_original,
        remainder_field: def.remainder_field,
        message_field: def.message_field,
        tz: def.tz_offset,
        headers,
        dispatch,
        finally: def.finally,
        emit: def.emit,
        pattern_count,
    })
}

fn validate_table_name(name: &str) -> Result<(), EngineError> {
    let re = TABLE_NAME_RE.as_ref().map_err(|e| EngineError::Regex(e.clone()))?;
    if re.is_match(name) {
        Ok(())
    } else {
        Err(invalid(
            if name.is_empty() { "(empty)" } else { name },
            "table name must be alphanumeric with '_', '.' or '-'",
        ))
    }
}

fn invalid(rule_id: &str, reason: &str) -> EngineError {
    EngineError::RuleValidation {
        rule_id: rule_id.to_owned(),
        reason: reason.to_owned(),
    }
}

struct Compiler<'a> {
    shared: &'a BTreeMap<String, NodeDef>,
    tag_specs: &'a BTreeMap<String, TagSeparators>,
    /// 공유 노드의 기본 입력 필드
    shared_default: String,
    patterns: PatternCache,
    resolved: HashMap<String, Node>,
    /// 해석 중인 참조 (순환 검출)
    resolving: Vec<String>,
}

impl Compiler<'_> {
    fn compile(&mut self, def: &NodeDef, default_source: &str) -> Result<Node, EngineError> {
        match def {
            NodeDef::Rule {
                id,
                source,
                pattern,
                on_success,
            } => {
                validate_id(id)?;
                let pattern = self.patterns.get_or_compile(pattern)?;
                Ok(Node::Rule(Arc::new(Rule {
                    id: id.clone(),
                    source: source.clone().unwrap_or_else(|| default_source.to_owned()),
                    pattern,
                    on_success: on_success.clone(),
                })))
            }

            NodeDef::Alternation { source, members } => {
                let source = source.clone().unwrap_or_else(|| default_source.to_owned());
                if members.is_empty() {
                    return Err(invalid("(alternation)", "alternation has no members"));
                }
                let mut compiled = Vec::with_capacity(members.len());
                for member in members {
                    let node = self.compile(member, &source)?;
                    if node.source() != source {
                        return Err(EngineError::RuleValidation {
                            rule_id: member.label().to_owned(),
                            reason: format!(
                                "alternation member reads '{}' but the group reads '{source}'",
                                node.source()
                            ),
                        });
                    }
                    compiled.push(node);
                }
                Ok(Node::Alternation(Arc::new(Alternation {
                    source,
                    members: compiled,
                })))
            }

            NodeDef::Chain {
                id,
                source,
                fragments,
                on_success,
            } => {
                validate_id(id)?;
                if fragments.is_empty() {
                    return Err(invalid(id, "chain has no fragments"));
                }
                let source = source.clone().unwrap_or_else(|| default_source.to_owned());
                let fragments = fragments
                    .iter()
                    .map(|f| self.compile(f, &source))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Node::Chain(Arc::new(Chain {
                    id: id.clone(),
                    source,
                    fragments,
                    on_success: on_success.clone(),
                })))
            }

            NodeDef::TagValue {
                id,
                source,
                spec,
                keys,
                on_success,
            } => {
                validate_id(id)?;
                let Some(separators) = self.tag_specs.get(spec) else {
                    return Err(EngineError::RuleValidation {
                        rule_id: id.clone(),
                        reason: format!("unknown tag spec '{spec}'"),
                    });
                };
                if keys.is_empty() {
                    return Err(invalid(id, "tagval rule maps no keys"));
                }
                Ok(Node::TagValue(Arc::new(TagValueRule {
                    id: id.clone(),
                    source: source.clone().unwrap_or_else(|| default_source.to_owned()),
                    spec: Arc::new(TagSpec::new(separators, keys.clone())),
                    on_success: on_success.clone(),
                })))
            }

            NodeDef::Ref { name } => self.resolve(name),
        }
    }

    fn resolve(&mut self, name: &str) -> Result<Node, EngineError> {
        if let Some(node) = self.resolved.get(name) {
            return Ok(node.clone());
        }
        if self.resolving.iter().any(|n| n == name) {
            return Err(EngineError::RuleValidation {
                rule_id: name.to_owned(),
                reason: format!("reference cycle: {} -> {name}", self.resolving.join(" -> ")),
            });
        }
        let Some(def) = self.shared.get(name) else {
            return Err(EngineError::RuleValidation {
                rule_id: name.to_owned(),
                reason: "unknown shared node".to_owned(),
            });
        };

        self.resolving.push(name.to_owned());
        let default_source = self.shared_default.clone();
        let result = self.compile(def, &default_source);
        self.resolving.pop();

        let node = result?;
        self.resolved.insert(name.to_owned(), node.clone());
        Ok(node)
    }
}

fn validate_id(id: &str) -> Result<(), EngineError> {
    if id.is_empty() {
        return Err(invalid("(empty)", "rule id must not be empty"));
    }
    if id.len() > MAX_RULE_ID_LEN {
        return Err(invalid(id, "rule id must not exceed 256 characters"));
    }
    Ok(())
}
