#![no_main]

use libfuzzer_sys::fuzz_target;
use logsift_engine::Pattern;

fuzz_target!(|data: &[u8]| {
    let Ok(template) = std::str::from_utf8(data) else {
        return;
    };
    // 컴파일된 패턴의 템플릿을 다시 컴파일하면 같은 패턴이어야 함
    if let Ok(pattern) = Pattern::compile(template) {
        let again = Pattern::compile(&pattern.template()).expect("template() must recompile");
        assert_eq!(pattern.segments(), again.segments());
    }
});
