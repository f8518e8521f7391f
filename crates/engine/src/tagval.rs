//! 태그/값 페이로드 디코더
//!
//! `Version=1.0;Message=Success;Issuer=bob;` 같은 key=value 나열을
//! [`TagSpec`]의 구분자와 키 매핑으로 해석합니다.

use std::collections::BTreeMap;

use serde::Deserialize;

/// 구분자 설정 (규칙 테이블의 `tag_specs` 항목)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagSeparators {
    pub pair_separator: String,
    pub kv_separator: String,
    #[serde(default)]
    pub open_quote: String,
    #[serde(default)]
    pub close_quote: String,
}

/// 구분자와 키 매핑을 합친 디코더 명세
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpec {
    pub pair_separator: String,
    pub kv_separator: String,
    pub open_quote: String,
    pub close_quote: String,
    /// 원본 키 -> 정규화 필드 이름
    pub key_map: BTreeMap<String, String>,
}

impl TagSpec {
    pub fn new(separators: &TagSeparators, key_map: BTreeMap<String, String>) -> Self {
        Self {
            pair_separator: separators.pair_separator.clone(),
            kv_separator: separators.kv_separator.clone(),
            open_quote: separators.open_quote.clone(),
            close_quote: separators.close_quote.clone(),
            key_map,
        }
    }

    /// 페이로드를 `(정규화 필드, 값)` 목록으로 디코딩합니다.
    ///
    /// 따옴표로 감싼 값 안의 쌍 구분자는 구분자로 취급하지 않습니다.
    /// 키 매핑에 있는 키가 하나도 없으면 `None`을 반환합니다.
    pub fn decode(&self, input: &str) -> Option<Vec<(String, String)>> {
        if self.pair_separator.is_empty() || self.kv_separator.is_empty() {
            return None;
        }
        let mut fields = Vec::new();
        let mut rest = input;
        while !rest.is_empty() {
            let (pair, next) = self.next_pair(rest);
            rest = next;
            let Some((raw_key, value)) = pair else {
                continue;
            };
            if let Some(field) = self.key_map.get(raw_key) {
                fields.push((field.clone(), value.to_owned()));
            }
        }
        if fields.is_empty() { None } else { Some(fields) }
    }

    /// 다음 key=value 쌍과 남은 입력을 반환합니다.
    fn next_pair<'a>(&self, rest: &'a str) -> (Option<(&'a str, &'a str)>, &'a str) {
        let pair_end = rest.find(self.pair_separator.as_str());
        let after_pair = |end: usize| &rest[end + self.pair_separator.len()..];

        let kv_at = match (rest.find(self.kv_separator.as_str()), pair_end) {
            (Some(kv), Some(end)) if kv > end => return (None, after_pair(end)),
            (Some(kv), _) => kv,
            (None, Some(end)) => return (None, after_pair(end)),
            (None, None) => return (None, ""),
        };

        let key = rest[..kv_at].trim_start();
        let after_kv = &rest[kv_at + self.kv_separator.len()..];
        let value_start = after_kv.trim_start();

        if let Some((value, next)) = self.quoted_value(value_start) {
            return (Some((key, value)), next);
        }
        match value_start.find(self.pair_separator.as_str()) {
            Some(end) => (
                Some((key, &value_start[..end])),
                &value_start[end + self.pair_separator.len()..],
            ),
            None => (Some((key, value_start)), ""),
        }
    }

    /// 따옴표로 감싼 값이면 내부 값과 남은 입력을 반환합니다.
    ///
    /// 닫는 따옴표 뒤에 쌍 구분자나 입력 끝이 와야 합니다.
    fn quoted_value<'a>(&self, value: &'a str) -> Option<(&'a str, &'a str)> {
        if self.open_quote.is_empty() || self.close_quote.is_empty() {
            return None;
        }
        let inner = value.strip_prefix(self.open_quote.as_str())?;
        for (idx, _) in inner.match_indices(self.close_quote.as_str()) {
            let tail = &inner[idx + self.close_quote.len()..];
            if tail.is_empty() {
                return Some((&inner[..idx], ""));
            }
            if let Some(next) = tail.strip_prefix(self.pair_separator.as_str()) {
                return Some((&inner[..idx], next));
            }
        }
        None
    }

    /// 정규화 필드 값으로 페이로드를 다시 만듭니다.
    ///
    /// 키 매핑 순서대로 나열하며 값에 구분자가 들어 있으면 따옴표로 감쌉니다.
    pub fn encode(&self, fields: &BTreeMap<String, String>) -> String {
        let mut out = String::new();
        for (raw_key, field) in &self.key_map {
            let Some(value) = fields.get(field) else {
                continue;
            };
            out.push_str(raw_key);
            out.push_str(&self.kv_separator);
            let needs_quote = !self.open_quote.is_empty()
                && (value.contains(self.pair_separator.as_str())
                    || value.starts_with(self.open_quote.as_str()));
            if needs_quote {
                out.push_str(&self.open_quote);
                out.push_str(value);
                out.push_str(&self.close_quote);
            } else {
                out.push_str(value);
            }
            out.push_str(&self.pair_separator);
        }
        out
    }
}
