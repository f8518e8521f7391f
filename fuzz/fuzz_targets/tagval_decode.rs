#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use logsift_engine::{TagSeparators, TagSpec};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    pair_separator: String,
    kv_separator: String,
    quoted: bool,
    keys: Vec<(String, String)>,
    input: String,
}

fuzz_target!(|input: FuzzInput| {
    if input.pair_separator.is_empty() || input.kv_separator.is_empty() {
        return;
    }
    let (open_quote, close_quote) = if input.quoted {
        ("\"".to_owned(), "\"".to_owned())
    } else {
        (String::new(), String::new())
    };
    let separators = TagSeparators {
        pair_separator: input.pair_separator,
        kv_separator: input.kv_separator,
        open_quote,
        close_quote,
    };
    let key_map: BTreeMap<String, String> = input.keys.into_iter().take(16).collect();
    if key_map.is_empty() {
        return;
    }
    let spec = TagSpec::new(&separators, key_map.clone());

    // 디코드 결과의 필드는 모두 key_map의 정규화 이름이어야 함
    if let Some(fields) = spec.decode(&input.input) {
        for (field, _) in &fields {
            assert!(key_map.values().any(|v| v == field));
        }
    }
});
