//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 엔진은 이 상수를 사용하여 `metrics::counter!()`, `metrics::histogram!()`
//! 매크로를 호출합니다. exporter는 포함하지 않으며, 호스트 프로그램이 recorder를
//! 설치하지 않으면 기록은 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logsift_engine_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(logsift_core::metrics::ENGINE_LINES_TOTAL, "table" => "cyberark").increment(1);
//! ```

use metrics::{describe_counter, describe_histogram};

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 규칙 테이블 레이블 키
pub const LABEL_TABLE: &str = "table";

/// 결과 레이블 키 (matched, header_only, unmatched)
pub const LABEL_STATUS: &str = "status";

/// 변환 종류 레이블 키 (ip, integer, ...)
pub const LABEL_KIND: &str = "kind";

// ─── Engine 메트릭 ─────────────────────────────────────────────────

/// 처리된 전체 라인 수 (counter, labels: table, status)
pub const ENGINE_LINES_TOTAL: &str = "logsift_engine_lines_total";

/// 헤더 매칭에 실패한 라인 수 (counter, label: table)
pub const ENGINE_UNMATCHED_TOTAL: &str = "logsift_engine_unmatched_total";

/// 메시지 매칭에 실패해 헤더 필드만 남은 라인 수 (counter, label: table)
pub const ENGINE_MESSAGE_FAILURES_TOTAL: &str = "logsift_engine_message_failures_total";

/// 디스패치 키가 테이블에 없던 라인 수 (counter, label: table)
pub const ENGINE_DISPATCH_MISSES_TOTAL: &str = "logsift_engine_dispatch_misses_total";

/// 필드 타입 변환 실패 수 (counter, label: kind)
pub const ENGINE_COERCION_ERRORS_TOTAL: &str = "logsift_engine_coercion_errors_total";

/// 로드된 규칙 테이블 수 (counter)
pub const ENGINE_RULE_TABLES_LOADED_TOTAL: &str = "logsift_engine_rule_tables_loaded_total";

/// 배치 분해 소요 시간 (histogram, 초)
pub const ENGINE_BATCH_DURATION_SECONDS: &str = "logsift_engine_batch_duration_seconds";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 배치 처리 지연 시간 히스토그램 버킷 (초)
///
/// 100us ~ 10s 범위, 로그 단위 분포
pub const BATCH_DURATION_BUCKETS: [f64; 10] = [
    0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 10.0,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명을 등록합니다.
///
/// recorder 설치 직후 한 번 호출합니다.
pub fn describe_metrics() {
    describe_counter!(
        ENGINE_LINES_TOTAL,
        "Total number of input lines dissected, by table and status"
    );
    describe_counter!(
        ENGINE_UNMATCHED_TOTAL,
        "Total number of lines no header dialect matched"
    );
    describe_counter!(
        ENGINE_MESSAGE_FAILURES_TOTAL,
        "Total number of lines that degraded to header-only fields after a message match failure"
    );
    describe_counter!(
        ENGINE_DISPATCH_MISSES_TOTAL,
        "Total number of lines whose discriminant had no dispatch entry"
    );
    describe_counter!(
        ENGINE_COERCION_ERRORS_TOTAL,
        "Total number of field coercion failures"
    );
    describe_counter!(
        ENGINE_RULE_TABLES_LOADED_TOTAL,
        "Total number of rule tables compiled and loaded"
    );
    describe_histogram!(
        ENGINE_BATCH_DURATION_SECONDS,
        "Time to dissect a single batch of lines in seconds"
    );
}
