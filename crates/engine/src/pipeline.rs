//! 분해 파이프라인 -- 한 줄을 하나의 이벤트로 만드는 전체 흐름을 관리합니다.
//!
//! [`DissectPipeline`]은 core의 [`LineDissector`] trait을 구현하며,
//! 규칙 테이블 하나에 대응합니다. 컴파일된 규칙은 읽기 전용이므로 잠금 없이
//! 여러 스레드에서 공유됩니다.
//!
//! # 처리 단계
//! ```text
//! [PRI 제거] -> HeaderMatch -> Dispatch -> MessageMatch -> Transform(finally) -> Emit
//!                    |
//!                    +-> Unmatched
//! ```
//!
//! 메시지 매칭 실패나 디스패치 키 누락은 에러가 아니며, 헤더 필드만 가진
//! 이벤트로 계속 진행합니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use logsift_core::error::{DissectError, LogsiftError};
use logsift_core::event::{Event, FIELD_ORIGINAL, Metadata};
use logsift_core::metrics::{
    ENGINE_BATCH_DURATION_SECONDS, ENGINE_DISPATCH_MISSES_TOTAL, ENGINE_LINES_TOTAL,
    ENGINE_MESSAGE_FAILURES_TOTAL, ENGINE_UNMATCHED_TOTAL, LABEL_STATUS, LABEL_TABLE,
};
use logsift_core::pipeline::{Emitter, LineDissector};
use logsift_core::types::{DissectStatus, Stage};
use metrics::{counter, histogram};
use rayon::ThreadPool;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::{EngineConfig, TzSetting};
use crate::dispatch::DispatchTable;
use crate::error::MatchError;
use crate::json;
use crate::node::EvalContext;
use crate::rule::{InputFormat, RuleTable};
use crate::syslog::strip_priority;
use crate::transform::{self, TransformContext};

/// 한 줄의 분해 결과
#[derive(Debug, Clone, PartialEq)]
pub struct DissectOutcome {
    pub event: Event,
    pub status: DissectStatus,
    /// 마지막으로 도달한 단계 (`Emit` 또는 `Unmatched`)
    pub stage: Stage,
    /// 매칭된 헤더 규칙 ID
    pub header_rule: Option<String>,
    /// 매칭된 메시지 규칙 ID
    pub message_rule: Option<String>,
}

/// 규칙 테이블 하나에 대한 분해 파이프라인
pub struct DissectPipeline {
    table: Arc<RuleTable>,
    tz: TzSetting,
    strip_priority: bool,
    keep_original: bool,
    max_line_bytes: usize,
    parallel_threshold: usize,
    /// 배치 전용 풀 (`None`이면 rayon 전역 풀)
    pool: Option<Arc<ThreadPool>>,
    /// 처리된 줄 카운터
    processed_count: AtomicU64,
    /// 헤더 매칭 실패 카운터
    unmatched_count: AtomicU64,
}

impl std::fmt::Debug for DissectPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DissectPipeline")
            .field("table", &self.table.name)
            .field("tz", &self.tz)
            .field("strip_priority", &self.strip_priority)
            .field("keep_original", &self.keep_original)
            .field("processed_count", &self.processed_count())
            .finish()
    }
}

impl DissectPipeline {
    /// 테이블 설정이 엔진 설정보다 우선합니다.
    pub fn new(table: Arc<RuleTable>, config: &EngineConfig) -> Self {
        Self {
            tz: table.tz.unwrap_or(config.tz),
            strip_priority: table.strip_priority.unwrap_or(config.strip_priority),
            keep_original: table.keep_original.unwrap_or(config.keep_original),
            max_line_bytes: config.max_line_bytes,
            parallel_threshold: config.parallel_threshold,
            pool: None,
            processed_count: AtomicU64::new(0),
            unmatched_count: AtomicU64::new(0),
            table,
        }
    }

    /// 배치 처리에 사용할 스레드 풀을 지정합니다.
    pub fn with_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    /// 처리된 줄 수를 반환합니다.
    pub fn processed_count(&self) -> u64 {
        self.processed_count.load(Ordering::Relaxed)
    }

    /// 헤더 매칭에 실패한 줄 수를 반환합니다.
    pub fn unmatched_count(&self) -> u64 {
        self.unmatched_count.load(Ordering::Relaxed)
    }

    /// 현재 시각 기준으로 한 줄을 분해합니다.
    pub fn dissect(&self, line: &str, metadata: &Metadata) -> Result<DissectOutcome, DissectError> {
        self.dissect_at(line, metadata, Utc::now())
    }

    /// `now`를 연도 없는 날짜의 기준 시각으로 사용하여 한 줄을 분해합니다.
    ///
    /// # Errors
    /// 줄이 `max_line_bytes`를 넘으면 [`DissectError::TooLarge`]를 반환합니다.
    /// 매칭 실패는 에러가 아니며 결과의 `status`로 표현됩니다.
    pub fn dissect_at(
        &self,
        line: &str,
        metadata: &Metadata,
        now: DateTime<Utc>,
    ) -> Result<DissectOutcome, DissectError> {
        if line.len() > self.max_line_bytes {
            return Err(DissectError::TooLarge {
                size: line.len(),
                max: self.max_line_bytes,
            });
        }

        let table = &*self.table;
        let tctx = TransformContext { tz: self.tz, now };
        let ctx = EvalContext {
            transform: &tctx,
            remainder_field: &table.remainder_field,
        };

        let mut event = Event::from_metadata(metadata);
        if self.keep_original {
            event.set(FIELD_ORIGINAL, line);
        }

        let body = match strip_priority(line) {
            Some((pri, rest)) if self.strip_priority => {
                pri.record(&mut event);
                rest
            }
            _ => line,
        };

        // HeaderMatch
        let header_rule = match self.match_header(body, &mut event, &ctx) {
            Ok(rule) => rule,
            Err(e) => {
                debug!(table = table.name.as_str(), error = %e, "no header dialect matched");
                return Ok(self.finish(DissectOutcome {
                    event,
                    status: DissectStatus::Unmatched,
                    stage: Stage::Unmatched,
                    header_rule: None,
                    message_rule: None,
                }));
            }
        };

        // Dispatch -> MessageMatch
        let (status, message_rule) = match &table.dispatch {
            Some(dispatch) => self.match_message(dispatch, &mut event, &ctx),
            None => (DissectStatus::Matched, None),
        };

        // Transform
        if !table.finally.is_empty() {
            let mut staged = event.clone();
            match transform::apply(&table.finally, &mut staged, &tctx) {
                Ok(()) => event = staged,
                Err(e) => debug!(table = table.name.as_str(), error = %e, "finalizer rolled back"),
            }
        }

        // Emit
        table.emit.apply(&mut event);
        event.delete(&table.remainder_field);
        if table.input == InputFormat::Text {
            event.delete(&table.message_field);
        }
        if let Some(dispatch) = &table.dispatch {
            if status == DissectStatus::Matched {
                event.delete(&dispatch.source_field);
            }
        }

        Ok(self.finish(DissectOutcome {
            event,
            status,
            stage: Stage::Emit,
            header_rule,
            message_rule,
        }))
    }

    /// 헤더 단계: 텍스트는 메시지 필드에, JSON은 평탄화한 키로 기록한 뒤 헤더 노드를 평가합니다.
    fn match_header(
        &self,
        body: &str,
        event: &mut Event,
        ctx: &EvalContext<'_>,
    ) -> Result<Option<String>, MatchError> {
        let table = &*self.table;
        match table.input {
            InputFormat::Text => event.set(table.message_field.as_str(), body),
            InputFormat::Json => {
                let count = json::decode_into(body, &table.json_target, event)?;
                debug!(table = table.name.as_str(), fields = count, "decoded json line");
            }
        }
        match &table.headers {
            Some(headers) => headers
                .evaluate_event(event, ctx)
                .map(|m| Some(m.rule_id)),
            None => Ok(None),
        }
    }

    fn match_message(
        &self,
        dispatch: &DispatchTable,
        event: &mut Event,
        ctx: &EvalContext<'_>,
    ) -> (DissectStatus, Option<String>) {
        let table = self.table.name.as_str();
        let key = event.get_text(&dispatch.key_field);
        let Some(node) = key.as_deref().and_then(|k| dispatch.dispatch(k)) else {
            counter!(ENGINE_DISPATCH_MISSES_TOTAL, LABEL_TABLE => table.to_owned()).increment(1);
            debug!(table, key = key.as_deref(), "no dispatch entry, header fields only");
            return (DissectStatus::HeaderOnly, None);
        };

        match node.evaluate_event(event, ctx) {
            Ok(matched) => (DissectStatus::Matched, Some(matched.rule_id)),
            Err(e) => {
                counter!(ENGINE_MESSAGE_FAILURES_TOTAL, LABEL_TABLE => table.to_owned())
                    .increment(1);
                debug!(
                    table,
                    key = key.as_deref(),
                    node = node.kind(),
                    error = %e,
                    "message match failed, header fields only"
                );
                (DissectStatus::HeaderOnly, None)
            }
        }
    }

    fn finish(&self, outcome: DissectOutcome) -> DissectOutcome {
        self.processed_count.fetch_add(1, Ordering::Relaxed);
        if outcome.status == DissectStatus::Unmatched {
            self.unmatched_count.fetch_add(1, Ordering::Relaxed);
            counter!(ENGINE_UNMATCHED_TOTAL, LABEL_TABLE => self.table.name.clone()).increment(1);
        }
        counter!(
            ENGINE_LINES_TOTAL,
            LABEL_TABLE => self.table.name.clone(),
            LABEL_STATUS => outcome.status.to_string()
        )
        .increment(1);
        outcome
    }

    /// 여러 줄을 분해합니다. 결과 순서는 입력 순서와 같습니다.
    ///
    /// `parallel_threshold` 이상이면 스레드 풀로 나누어 처리합니다.
    /// 크기 초과 줄은 경고 로그를 남기고 결과에서 제외됩니다.
    pub fn dissect_batch<L>(&self, lines: &[L], metadata: &Metadata) -> Vec<DissectOutcome>
    where
        L: AsRef<str> + Sync,
    {
        if lines.is_empty() {
            return Vec::new();
        }
        let started = Instant::now();
        let now = Utc::now();

        let run = |line: &L| match self.dissect_at(line.as_ref(), metadata, now) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(table = self.table.name.as_str(), error = %e, "line skipped");
                None
            }
        };

        let outcomes: Vec<DissectOutcome> = if lines.len() < self.parallel_threshold {
            lines.iter().filter_map(run).collect()
        } else {
            match &self.pool {
                Some(pool) => pool.install(|| lines.par_iter().filter_map(run).collect()),
                None => lines.par_iter().filter_map(run).collect(),
            }
        };

        histogram!(ENGINE_BATCH_DURATION_SECONDS, LABEL_TABLE => self.table.name.clone())
            .record(started.elapsed().as_secs_f64());
        outcomes
    }
}

impl LineDissector for DissectPipeline {
    fn name(&self) -> &str {
        &self.table.name
    }

    fn dissect_line(
        &self,
        line: &str,
        metadata: &Metadata,
        emitter: &mut dyn Emitter,
    ) -> Result<DissectStatus, LogsiftError> {
        let outcome = self.dissect(line, metadata)?;
        emitter.emit(outcome.event);
        Ok(outcome.status)
    }
}
