#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use logsift_engine::{Pattern, match_pattern};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    template: String,
    input: String,
}

fuzz_target!(|input: FuzzInput| {
    let Ok(pattern) = Pattern::compile(&input.template) else {
        return;
    };
    // 매칭은 패닉 없이 Some/None을 반환해야 하며, 캡처 이름은 패턴의 것이어야 함
    if let Some(captures) = match_pattern(&pattern, &input.input) {
        let names: Vec<&str> = pattern.capture_names().collect();
        for (name, _) in &captures {
            assert!(names.contains(&name.as_str()));
        }
    }
});
