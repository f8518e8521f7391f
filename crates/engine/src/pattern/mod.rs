//! 패턴 템플릿 컴파일
//!
//! 템플릿은 리터럴 텍스트와 `%{name}` 자리표시자로 이루어집니다.
//!
//! - `%{name}`: 다음 리터럴 직전까지(또는 입력 끝까지)를 `name` 필드로 캡처
//! - `%{name->}`: 캡처 뒤의 구분 리터럴이 반복되면 모두 건너뜀
//! - `%{}`: 캡처하되 필드로 기록하지 않음
//! - `{`가 뒤따르지 않는 `%`는 리터럴
//!
//! 캡처 두 개가 리터럴 없이 붙어 있으면 경계가 모호하므로 컴파일 에러입니다.
//! 템플릿은 로드 시 한 번만 컴파일되며, [`PatternCache`]가 같은 템플릿을 공유합니다.

mod matcher;

pub use matcher::match_pattern;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::EngineError;

/// 건너뛰기 플래그 접미어
const SKIP_SUFFIX: &str = "->";

/// 컴파일된 템플릿 조각
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// 정확히 일치해야 하는 텍스트
    Literal(String),
    /// 필드 캡처
    Capture {
        /// 필드 이름 (`None`이면 버림)
        name: Option<String>,
        /// 뒤따르는 구분 리터럴의 반복을 건너뛸지 여부
        skip_ws: bool,
    },
}

/// 컴파일된 패턴
///
/// 불변이며 여러 규칙과 스레드에서 `Arc`로 공유됩니다.
#[derive(Debug, Clone)]
pub struct Pattern {
    template: String,
    segments: Vec<Segment>,
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for Pattern {}

impl Pattern {
    /// 템플릿 문자열을 컴파일합니다.
    pub fn compile(template: &str) -> Result<Self, EngineError> {
        let fail = |offset: usize, reason: &str| EngineError::Compile {
            template: template.to_owned(),
            offset,
            reason: reason.to_owned(),
        };

        let mut segments: Vec<Segment> = Vec::new();
        let mut literal = String::new();
        let mut pos = 0;

        while pos < template.len() {
            let rest = &template[pos..];
            if !rest.starts_with("%{") {
                let Some(ch) = rest.chars().next() else {
                    break;
                };
                literal.push(ch);
                pos += ch.len_utf8();
                continue;
            }

            let body_start = pos + 2;
            let Some(close) = template[body_start..].find('}') else {
                return Err(fail(pos, "unterminated placeholder"));
            };
            let body = &template[body_start..body_start + close];
            if body.contains('{') {
                return Err(fail(pos, "'{' inside placeholder"));
            }

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            } else if matches!(segments.last(), Some(Segment::Capture { .. })) {
                return Err(fail(pos, "adjacent placeholders need a literal between them"));
            }

            let (name, skip_ws) = match body.strip_suffix(SKIP_SUFFIX) {
                Some(name) => (name, true),
                None => (body, false),
            };
            let name = if name.is_empty() {
                None
            } else if name.trim().is_empty() {
                return Err(fail(pos, "blank placeholder name"));
            } else if name.chars().any(char::is_whitespace) {
                return Err(fail(pos, "placeholder name contains whitespace"));
            } else {
                Some(name.to_owned())
            };

            segments.push(Segment::Capture { name, skip_ws });
            pos = body_start + close + 1;
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        if segments.is_empty() {
            return Err(fail(0, "empty template"));
        }

        Ok(Self {
            template: template.to_owned(),
            segments,
        })
    }

    /// 원본 템플릿 문자열
    pub fn source(&self) -> &str {
        &self.template
    }

    /// 세그먼트로부터 템플릿을 다시 만듭니다.
    ///
    /// 결과를 다시 컴파일하면 같은 세그먼트가 나옵니다.
    pub fn template(&self) -> String {
        let mut out = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Capture { name, skip_ws } => {
                    out.push_str("%{");
                    if let Some(name) = name {
                        out.push_str(name);
                    }
                    if *skip_ws {
                        out.push_str(SKIP_SUFFIX);
                    }
                    out.push('}');
                }
            }
        }
        out
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// 기록되는 캡처 필드 이름 목록
    pub fn capture_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Capture {
                name: Some(name), ..
            } => Some(name.as_str()),
            _ => None,
        })
    }
}

/// 컴파일된 패턴 캐시
///
/// 규칙 로딩 시 같은 템플릿을 한 번만 컴파일하여 공유합니다.
#[derive(Debug, Default)]
pub struct PatternCache {
    patterns: HashMap<String, Arc<Pattern>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 캐시된 패턴을 반환하거나 새로 컴파일합니다.
    pub fn get_or_compile(&mut self, template: &str) -> Result<Arc<Pattern>, EngineError> {
        if let Some(pattern) = self.patterns.get(template) {
            return Ok(Arc::clone(pattern));
        }
        let pattern = Arc::new(Pattern::compile(template)?);
        self.patterns
            .insert(template.to_owned(), Arc::clone(&pattern));
        Ok(pattern)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
