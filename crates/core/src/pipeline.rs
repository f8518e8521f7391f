//! 파이프라인 trait — 엔진 확장 포인트 정의

use crate::error::LogsiftError;
use crate::event::{Event, Metadata};
use crate::types::DissectStatus;

/// 분해된 이벤트를 받는 출력 지점
///
/// 분해 호출에 명시적으로 전달되며, 전역 싱크는 없습니다.
/// `Vec<Event>`와 `FnMut(Event)` 클로저가 이 trait을 구현합니다.
pub trait Emitter {
    fn emit(&mut self, event: Event);
}

impl Emitter for Vec<Event> {
    fn emit(&mut self, event: Event) {
        self.push(event);
    }
}

impl<F> Emitter for F
where
    F: FnMut(Event),
{
    fn emit(&mut self, event: Event) {
        self(event)
    }
}

/// 한 줄을 이벤트로 분해하는 trait
///
/// 새로운 분해 엔진을 연결하려면 이 trait을 구현합니다.
/// 구현체는 읽기 전용으로 여러 스레드에서 공유됩니다.
pub trait LineDissector: Send + Sync {
    /// 분해기 이름 (규칙 테이블 이름)
    fn name(&self) -> &str;

    /// 한 줄을 분해하여 `emitter`로 이벤트를 내보냅니다.
    ///
    /// 매칭 실패는 에러가 아니며 반환 상태로 표현됩니다.
    fn dissect_line(
        &self,
        line: &str,
        metadata: &Metadata,
        emitter: &mut dyn Emitter,
    ) -> Result<DissectStatus, LogsiftError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit_two(emitter: &mut dyn Emitter) {
        let mut a = Event::new();
        a.set("n", 1i64);
        let mut b = Event::new();
        b.set("n", 2i64);
        emitter.emit(a);
        emitter.emit(b);
    }

    #[test]
    fn vec_emitter_collects_events() {
        let mut out: Vec<Event> = Vec::new();
        emit_two(&mut out);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn closure_emitter_receives_events() {
        let mut seen = 0;
        let mut counter = |_event: Event| seen += 1;
        emit_two(&mut counter);
        assert_eq!(seen, 2);
    }
}
