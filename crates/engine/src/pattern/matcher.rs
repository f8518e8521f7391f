//! 패턴 매칭
//!
//! 커서를 앞으로만 옮기는 단일 패스 매칭입니다. 백트래킹은 하지 않으므로
//! 캡처는 다음 리터럴이 처음 나타나는 위치에서 끝납니다.

use super::{Pattern, Segment};

/// 입력을 패턴에 매칭하여 `(필드, 값)` 목록을 반환합니다.
///
/// 리터럴이 커서 위치에서 일치하지 않으면 `None`입니다.
/// 캡처 값은 오른쪽 공백을 제거하며 빈 문자열일 수 있습니다.
/// 이름 없는 캡처(`%{}`)는 결과에 포함되지 않습니다.
pub fn match_pattern(pattern: &Pattern, input: &str) -> Option<Vec<(String, String)>> {
    let segments = pattern.segments();
    let mut captures = Vec::with_capacity(segments.len() / 2 + 1);
    let mut pos = 0;
    let mut skip_repeats = false;

    for (idx, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Literal(lit) => {
                if !input[pos..].starts_with(lit.as_str()) {
                    return None;
                }
                pos += lit.len();
                if skip_repeats {
                    pos = skip_repeated(input, pos, lit);
                    skip_repeats = false;
                }
            }
            Segment::Capture { name, skip_ws } => {
                let rest = &input[pos..];
                let len = match segments.get(idx + 1) {
                    Some(Segment::Literal(next)) => rest.find(next.as_str())?,
                    Some(Segment::Capture { .. }) => return None,
                    None => rest.len(),
                };
                if let Some(name) = name {
                    captures.push((name.clone(), rest[..len].trim_end().to_owned()));
                }
                pos += len;
                skip_repeats = *skip_ws;
            }
        }
    }

    Some(captures)
}

/// 구분 리터럴이 반복되는 구간을 건너뜁니다.
///
/// 공백으로만 이루어진 리터럴이면 모든 공백 문자를 건너뜁니다.
fn skip_repeated(input: &str, mut pos: usize, lit: &str) -> usize {
    if lit.trim().is_empty() {
        let rest = &input[pos..];
        return pos + (rest.len() - rest.trim_start().len());
    }
    while input[pos..].starts_with(lit) {
        pos += lit.len();
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(template: &str, input: &str) -> Option<Vec<(String, String)>> {
        let pattern = Pattern::compile(template).unwrap();
        match_pattern(&pattern, input)
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn captures_until_next_literal() {
        assert_eq!(
            run("%{a} %{b}", "x y z"),
            Some(pairs(&[("a", "x"), ("b", "y z")]))
        );
    }

    #[test]
    fn leading_literal_must_match() {
        assert_eq!(run("<%{pri}>%{rest}", "13>oops"), None);
        assert_eq!(
            run("<%{pri}>%{rest}", "<13>hello"),
            Some(pairs(&[("pri", "13"), ("rest", "hello")]))
        );
    }

    #[test]
    fn missing_delimiter_fails() {
        assert_eq!(run("%{a},%{b}", "no comma here"), None);
    }

    #[test]
    fn trailing_literal_must_match() {
        assert_eq!(run("%{a}]", "value]"), Some(pairs(&[("a", "value")])));
        assert_eq!(run("%{a}]", "value"), None);
    }

    #[test]
    fn skip_flag_consumes_repeated_whitespace() {
        assert_eq!(
            run("%{month->} %{day} %{time}", "Jan    5 10:00:00"),
            Some(pairs(&[("month", "Jan"), ("day", "5"), ("time", "10:00:00")]))
        );
    }

    #[test]
    fn skip_flag_consumes_repeated_delimiter() {
        assert_eq!(
            run("%{a->}|%{b}", "x|||y"),
            Some(pairs(&[("a", "x"), ("b", "y")]))
        );
    }

    #[test]
    fn without_skip_flag_padding_goes_to_next_capture() {
        assert_eq!(
            run("%{a} %{b}", "x   y"),
            Some(pairs(&[("a", "x"), ("b", "  y")]))
        );
    }

    #[test]
    fn empty_capture_is_allowed() {
        assert_eq!(
            run("%{a}|%{b}|%{c}", "1||3"),
            Some(pairs(&[("a", "1"), ("b", ""), ("c", "3")]))
        );
    }

    #[test]
    fn values_are_right_trimmed() {
        assert_eq!(run("%{a};", "abc  ;"), Some(pairs(&[("a", "abc")])));
    }

    #[test]
    fn discard_capture_is_not_reported() {
        assert_eq!(
            run("%{} %{user}", "ignored bob"),
            Some(pairs(&[("user", "bob")]))
        );
    }

    #[test]
    fn literal_only_pattern() {
        assert_eq!(run("ping", "ping"), Some(vec![]));
        assert_eq!(run("ping", "pong"), None);
    }

    #[test]
    fn multibyte_input() {
        assert_eq!(
            run("%{user}@%{host}", "사용자@서버"),
            Some(pairs(&[("user", "사용자"), ("host", "서버")]))
        );
    }
}
