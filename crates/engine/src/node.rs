//! 규칙 노드와 조합기
//!
//! 디스패치 테이블 항목과 헤더 매처는 모두 [`Node`]입니다.
//!
//! - [`Rule`]: 패턴 하나로 캡처 후 `on_success` 변환 적용
//! - [`Alternation`]: 선언 순서대로 시도하여 처음 구조적으로 매칭된 멤버를 채택
//! - [`Chain`]: 나머지(remainder) 필드를 다음 조각의 입력으로 넘기며 모든 조각이 매칭되어야 성공
//! - [`TagValueRule`]: key=value 페이로드 디코딩
//!
//! 모든 노드는 복사본에 기록한 뒤 성공했을 때만 이벤트에 반영하므로,
//! 실패한 노드는 이벤트를 변경하지 않습니다.

use std::sync::Arc;

use logsift_core::event::Event;
use tracing::debug;

use crate::error::MatchError;
use crate::pattern::{Pattern, match_pattern};
use crate::tagval::TagSpec;
use crate::transform::{self, TransformContext, TransformOp};

/// 노드 평가 환경
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub transform: &'a TransformContext,
    /// 체인 조각 사이에서 나머지 입력을 전달하는 필드
    pub remainder_field: &'a str,
}

/// 매칭에 성공한 규칙
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matched {
    pub rule_id: String,
}

/// 패턴 규칙
#[derive(Debug)]
pub struct Rule {
    pub id: String,
    pub source: String,
    pub pattern: Arc<Pattern>,
    pub on_success: Vec<TransformOp>,
}

/// 순서 있는 대안 그룹
#[derive(Debug)]
pub struct Alternation {
    pub source: String,
    pub members: Vec<Node>,
}

/// 순차 매칭 체인
#[derive(Debug)]
pub struct Chain {
    pub id: String,
    pub source: String,
    pub fragments: Vec<Node>,
    /// 마지막 조각 이후 한 번 적용
    pub on_success: Vec<TransformOp>,
}

/// 태그/값 디코딩 규칙
#[derive(Debug)]
pub struct TagValueRule {
    pub id: String,
    pub source: String,
    pub spec: Arc<TagSpec>,
    pub on_success: Vec<TransformOp>,
}

/// 규칙 트리 노드
///
/// 공유 노드는 여러 디스패치 항목이 같은 `Arc`를 참조합니다.
#[derive(Debug, Clone)]
pub enum Node {
    Rule(Arc<Rule>),
    Alternation(Arc<Alternation>),
    Chain(Arc<Chain>),
    TagValue(Arc<TagValueRule>),
}

impl Node {
    /// 노드가 읽는 입력 필드
    pub fn source(&self) -> &str {
        match self {
            Self::Rule(rule) => &rule.source,
            Self::Alternation(group) => &group.source,
            Self::Chain(chain) => &chain.source,
            Self::TagValue(rule) => &rule.source,
        }
    }

    /// 노드 종류 이름 (로그용)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rule(_) => "rule",
            Self::Alternation(_) => "alternation",
            Self::Chain(_) => "chain",
            Self::TagValue(_) => "tagval",
        }
    }

    /// 이벤트의 `source()` 필드를 입력으로 노드를 평가합니다.
    pub fn evaluate_event(
        &self,
        event: &mut Event,
        ctx: &EvalContext<'_>,
    ) -> Result<Matched, MatchError> {
        let Some(input) = event.get_text(self.source()) else {
            debug!(source = self.source(), "node source field missing");
            return Err(MatchError::NoMatch);
        };
        self.evaluate(&input, event, ctx)
    }

    /// `input`에 대해 노드를 평가합니다.
    ///
    /// 실패하면 `event`는 변경되지 않습니다.
    pub fn evaluate(
        &self,
        input: &str,
        event: &mut Event,
        ctx: &EvalContext<'_>,
    ) -> Result<Matched, MatchError> {
        match self {
            Self::Rule(rule) => rule.evaluate(input, event, ctx),
            Self::Alternation(group) => group.evaluate(input, event, ctx),
            Self::Chain(chain) => chain.evaluate(input, event, ctx),
            Self::TagValue(rule) => rule.evaluate(input, event, ctx),
        }
    }
}

/// 추출한 필드를 복사본에 기록하고 변환을 적용한 뒤 성공하면 반영합니다.
fn commit_fields(
    id: &str,
    fields: Vec<(String, String)>,
    on_success: &[TransformOp],
    event: &mut Event,
    ctx: &EvalContext<'_>,
) -> Result<Matched, MatchError> {
    let mut staged = event.clone();
    for (name, value) in fields {
        if value.is_empty() {
            continue;
        }
        staged.set(name, value);
    }
    if let Err(e) = transform::apply(on_success, &mut staged, ctx.transform) {
        debug!(rule = id, error = %e, "rule rolled back");
        return Err(e);
    }
    *event = staged;
    Ok(Matched {
        rule_id: id.to_owned(),
    })
}

impl Rule {
    pub fn evaluate(
        &self,
        input: &str,
        event: &mut Event,
        ctx: &EvalContext<'_>,
    ) -> Result<Matched, MatchError> {
        let Some(captures) = match_pattern(&self.pattern, input) else {
            debug!(rule = self.id.as_str(), "pattern did not match");
            return Err(MatchError::NoMatch);
        };
        commit_fields(&self.id, captures, &self.on_success, event, ctx)
    }
}

impl Alternation {
    /// 멤버를 선언 순서대로 시도합니다.
    ///
    /// 구조적으로 매칭된 멤버가 변환 단계에서 롤백되면 이후 멤버는 시도하지 않고
    /// 그 에러를 반환합니다.
    pub fn evaluate(
        &self,
        input: &str,
        event: &mut Event,
        ctx: &EvalContext<'_>,
    ) -> Result<Matched, MatchError> {
        for (index, member) in self.members.iter().enumerate() {
            match member.evaluate(input, event, ctx) {
                Ok(matched) => {
                    debug!(index, rule = matched.rule_id.as_str(), "alternation member matched");
                    return Ok(matched);
                }
                Err(MatchError::NoMatch) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(MatchError::NoMatch)
    }
}

impl Chain {
    /// 조각을 순서대로 매칭합니다.
    ///
    /// 마지막이 아닌 조각은 나머지 필드를 남겨야 하며, 그 값은 다음 조각의 입력이 되고
    /// 이벤트에서는 제거됩니다. 조각 하나라도 실패하면 체인 전체가 반영되지 않습니다.
    pub fn evaluate(
        &self,
        input: &str,
        event: &mut Event,
        ctx: &EvalContext<'_>,
    ) -> Result<Matched, MatchError> {
        let mut staged = event.clone();
        let mut remainder = input.to_owned();
        let last = self.fragments.len().saturating_sub(1);

        for (index, fragment) in self.fragments.iter().enumerate() {
            staged.delete(ctx.remainder_field);
            if let Err(e) = fragment.evaluate(&remainder, &mut staged, ctx) {
                debug!(chain = self.id.as_str(), fragment = index, "chain fragment failed");
                return Err(e);
            }
            if index == last {
                break;
            }
            match staged.delete(ctx.remainder_field) {
                Some(next) => remainder = next.to_string(),
                None => {
                    debug!(
                        chain = self.id.as_str(),
                        fragment = index,
                        field = ctx.remainder_field,
                        "chain fragment left no remainder"
                    );
                    return Err(MatchError::NoMatch);
                }
            }
        }

        transform::apply(&self.on_success, &mut staged, ctx.transform)?;
        *event = staged;
        Ok(Matched {
            rule_id: self.id.clone(),
        })
    }
}

impl TagValueRule {
    pub fn evaluate(
        &self,
        input: &str,
        event: &mut Event,
        ctx: &EvalContext<'_>,
    ) -> Result<Matched, MatchError> {
        let Some(fields) = self.spec.decode(input) else {
            debug!(rule = self.id.as_str(), "no known tag/value keys");
            return Err(MatchError::NoMatch);
        };
        commit_fields(&self.id, fields, &self.on_success, event, ctx)
    }
}
