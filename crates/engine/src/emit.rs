//! emit 단계 필드 매핑
//!
//! 캡처된 이름을 출력 필드로 옮기고 임시 필드를 지웁니다.
//! 매핑 이름 자체는 규칙 데이터이며 엔진은 적용만 합니다.

use std::collections::BTreeMap;

use logsift_core::event::{Event, Value};
use logsift_core::metrics::{ENGINE_COERCION_ERRORS_TOTAL, LABEL_KIND};
use logsift_core::types::FieldKind;
use metrics::counter;
use serde::Deserialize;
use tracing::debug;

use crate::transform::coerce;

/// `outcome` setter가 허용하는 값
const VALID_OUTCOMES: [&str; 3] = ["failure", "success", "unknown"];
const UNKNOWN_OUTCOME: &str = "unknown";

/// 규칙 테이블의 `emit` 섹션
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EmitSpec {
    /// 캡처 이름 -> 출력 매핑
    #[serde(default)]
    pub mappings: BTreeMap<String, FieldMapping>,
    /// emit 직전에 지울 필드
    #[serde(default)]
    pub drop: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldMapping {
    /// 변환 종류 (없으면 값 그대로)
    #[serde(default)]
    pub kind: Option<FieldKind>,
    pub to: Vec<MappingTarget>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MappingTarget {
    pub field: String,
    #[serde(default)]
    pub setter: Setter,
    /// `prio` setter 우선순위 (작을수록 우선)
    #[serde(default)]
    pub prio: u32,
}

/// 출력 필드에 값을 쓰는 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Setter {
    /// 덮어쓰기
    #[default]
    Set,
    /// 중복 없이 리스트에 추가
    Append,
    /// 우선순위가 가장 낮은 값만 유지
    Prio,
    /// `failure`/`success`/`unknown`으로 정규화, `unknown`은 다른 값으로 대체 가능
    Outcome,
}

struct Slot {
    value: Value,
    prio: u32,
}

impl MappingTarget {
    fn store(&self, result: &mut BTreeMap<String, Slot>, value: &Value) {
        match self.setter {
            Setter::Set => {
                result.insert(
                    self.field.clone(),
                    Slot {
                        value: value.clone(),
                        prio: 0,
                    },
                );
            }
            Setter::Append => {
                let slot = result.entry(self.field.clone()).or_insert_with(|| Slot {
                    value: Value::List(Vec::new()),
                    prio: 0,
                });
                // 앞선 `set`이 남긴 스칼라는 리스트의 첫 원소가 됩니다.
                if !matches!(slot.value, Value::List(_)) {
                    let scalar = std::mem::replace(&mut slot.value, Value::List(Vec::new()));
                    slot.value = Value::List(vec![scalar]);
                }
                if let Value::List(items) = &mut slot.value {
                    let incoming = match value {
                        Value::List(values) => values.as_slice(),
                        scalar => std::slice::from_ref(scalar),
                    };
                    for item in incoming {
                        if !items.contains(item) {
                            items.push(item.clone());
                        }
                    }
                }
            }
            Setter::Prio => match result.get_mut(&self.field) {
                Some(slot) if self.prio < slot.prio => {
                    slot.value = value.clone();
                    slot.prio = self.prio;
                }
                Some(_) => {}
                None => {
                    result.insert(
                        self.field.clone(),
                        Slot {
                            value: value.clone(),
                            prio: self.prio,
                        },
                    );
                }
            },
            Setter::Outcome => {
                let lowered = value.to_string().to_lowercase();
                let outcome = if VALID_OUTCOMES.contains(&lowered.as_str()) {
                    lowered
                } else {
                    UNKNOWN_OUTCOME.to_owned()
                };
                let replace = match result.get(&self.field) {
                    None => true,
                    Some(slot) => slot.value.as_str() == Some(UNKNOWN_OUTCOME),
                };
                if replace {
                    result.insert(
                        self.field.clone(),
                        Slot {
                            value: Value::Str(outcome),
                            prio: 0,
                        },
                    );
                }
            }
        }
    }
}

impl EmitSpec {
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty() && self.drop.is_empty()
    }

    /// 매핑을 적용하고 임시 필드를 지웁니다.
    ///
    /// 매핑된 원본 필드는 제거됩니다. 변환에 실패한 원본은 그대로 남습니다.
    /// 기록된 출력 필드 수를 반환합니다.
    pub fn apply(&self, event: &mut Event) -> usize {
        let mut result: BTreeMap<String, Slot> = BTreeMap::new();
        let mut consumed = Vec::new();

        for (source, mapping) in &self.mappings {
            let Some(value) = event.get(source) else {
                continue;
            };
            let value = match mapping.kind {
                Some(kind) => match coerce(value, kind) {
                    Some(v) => v,
                    None => {
                        counter!(ENGINE_COERCION_ERRORS_TOTAL, LABEL_KIND => kind.as_str())
                            .increment(1);
                        debug!(field = source.as_str(), kind = kind.as_str(), "emit mapping conversion failed");
                        continue;
                    }
                },
                None => value.clone(),
            };
            for target in &mapping.to {
                target.store(&mut result, &value);
            }
            consumed.push(source.as_str());
        }

        for source in consumed {
            event.delete(source);
        }
        for field in &self.drop {
            event.delete(field);
        }

        let written = result.len();
        event.extend(result.into_iter().map(|(field, slot)| (field, slot.value)));
        written
    }
}
