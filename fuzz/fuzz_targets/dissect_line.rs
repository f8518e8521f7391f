#![no_main]

use std::sync::{Arc, LazyLock};

use libfuzzer_sys::fuzz_target;
use logsift_core::event::Metadata;
use logsift_engine::{DissectPipeline, EngineConfig, RuleLoader};

const TABLE: &str = r#"
name: fuzz
tag_specs:
  tvm: { pair_separator: ";", kv_separator: "=", open_quote: "\"", close_quote: "\"" }
headers:
  kind: alternation
  members:
    - { kind: rule, id: H1, pattern: "%{hostname} %{messageid}: %{payload}" }
    - { kind: rule, id: H2, pattern: "%{messageid}|%{payload}" }
dispatch:
  messages:
    "A":
      kind: chain
      id: CHAIN
      fragments:
        - { kind: rule, id: F1, pattern: "%{action} %{p0}" }
        - { kind: rule, id: F2, pattern: "from %{saddr} port %{sport}" }
      on_success:
        - { op: coerce, field: sport, kind: int }
    "B": { kind: tagval, id: TV, spec: tvm, keys: { usr: username, src: saddr } }
finally:
  - { op: copy, from: saddr, to: source.ip, ignore_missing: true }
emit:
  mappings:
    username: { kind: string, to: [ { field: user.name } ] }
"#;

static PIPELINE: LazyLock<Option<DissectPipeline>> = LazyLock::new(|| {
    let table = RuleLoader::parse_yaml(TABLE, "fuzz.yml").ok()?;
    Some(DissectPipeline::new(Arc::new(table), &EngineConfig::default()))
});

fuzz_target!(|data: &[u8]| {
    let (Some(pipeline), Ok(line)) = (PIPELINE.as_ref(), std::str::from_utf8(data)) else {
        return;
    };
    let _ = pipeline.dissect(line, &Metadata::new());
});
