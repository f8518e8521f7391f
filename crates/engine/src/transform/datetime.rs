//! 날짜 형식 미니 언어
//!
//! 형식 문자열은 `%X` 지정자와 리터럴 텍스트로 이루어집니다.
//!
//! | 지정자 | 의미 |
//! |---|---|
//! | `%B` | 월 이름 (`Jan`, 긴 이름이면 나머지도 소비) |
//! | `%R` | 긴 월 이름 (`January`) |
//! | `%M` / `%G` | 월 (2자리 / 가변 폭) |
//! | `%D` / `%F` | 일 (2자리 / 가변 폭) |
//! | `%H` / `%I` / `%N` | 시 0-24 (2자리 / 가변 폭) |
//! | `%T` / `%U` | 분 (2자리 / 가변 폭) |
//! | `%S` / `%O` | 초 0-60 (2자리 / 가변 폭) |
//! | `%Y` / `%W` | 연도 (2자리 / 4자리) |
//! | `%Z` | `H:M:S` |
//! | `%X` | unix 초 |
//! | `%P` / `%Q` | `AM`/`PM`, `A.M.`/`P.M.` |
//! | `%%` | `%` 리터럴 |
//!
//! 숫자와 월 이름 앞의 공백은 건너뜁니다. 입력이 모두 소비되면 남은 지정자는
//! 무시하며, 형식이 끝난 뒤 남은 입력도 무시합니다.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use logsift_core::event::Event;
use serde::Deserialize;

use crate::config::TzSetting;

/// 2자리 연도가 이 값보다 작으면 20xx, 아니면 19xx
const TWO_DIGIT_YEAR_EPOCH: i32 = 70;

/// 연도 없는 날짜가 이만큼 미래면 전년도로 간주
const MAX_FUTURE_DELTA_SECS: i64 = 2 * 24 * 60 * 60;

/// 연속한 두 윤년 사이의 최대 간격(예: 1896 -> 1904)
const MAX_LEAP_YEAR_GAP: i32 = 8;

/// 월 약어와 긴 이름에서 추가로 건너뛸 글자 수
const MONTHS: [(&str, usize); 12] = [
    ("jan", 4),
    ("feb", 5),
    ("mar", 2),
    ("apr", 2),
    ("may", 0),
    ("jun", 1),
    ("jul", 1),
    ("aug", 3),
    ("sep", 6),
    ("oct", 4),
    ("nov", 5),
    ("dec", 4),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Year2,
    Year4,
    Unix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    Literal(String),
    MonthName { long: bool },
    Fixed { field: Field, width: usize, min: i64, max: i64 },
    Variable { field: Field, min: i64, max: i64 },
    Hms,
    AmPm,
}

/// 컴파일된 날짜 형식
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct DateFormat {
    source: String,
    items: Vec<Item>,
}

impl FromStr for DateFormat {
    type Err = String;

    fn from_str(format: &str) -> Result<Self, Self::Err> {
        let mut items = Vec::new();
        let mut literal = String::new();
        let mut chars = format.chars();

        while let Some(ch) = chars.next() {
            if ch != '%' {
                literal.push(ch);
                continue;
            }
            let Some(spec) = chars.next() else {
                return Err(format!("dangling '%' in date format '{format}'"));
            };
            if spec == '%' {
                literal.push('%');
                continue;
            }
            let item = match spec {
                'B' => Item::MonthName { long: false },
                'R' => Item::MonthName { long: true },
                'M' => fixed(Field::Month, 2, 1, 12),
                'G' => variable(Field::Month, 1, 12),
                'D' => fixed(Field::Day, 2, 1, 31),
                'F' => variable(Field::Day, 1, 31),
                'H' => fixed(Field::Hour, 2, 0, 24),
                'I' | 'N' => variable(Field::Hour, 0, 24),
                'T' => fixed(Field::Minute, 2, 0, 59),
                'U' => variable(Field::Minute, 0, 59),
                'S' => fixed(Field::Second, 2, 0, 60),
                'O' => variable(Field::Second, 0, 60),
                'Y' => fixed(Field::Year2, 2, 0, 99),
                'W' => fixed(Field::Year4, 4, 1000, 9999),
                'Z' => Item::Hms,
                'X' => variable(Field::Unix, 0, 0x0100_0000_0000),
                'P' | 'Q' => Item::AmPm,
                other => {
                    return Err(format!(
                        "unknown specifier '%{other}' in date format '{format}'"
                    ));
                }
            };
            if !literal.is_empty() {
                items.push(Item::Literal(std::mem::take(&mut literal)));
            }
            items.push(item);
        }
        if !literal.is_empty() {
            items.push(Item::Literal(literal));
        }
        if items.is_empty() {
            return Err("empty date format".to_owned());
        }

        Ok(Self {
            source: format.to_owned(),
            items,
        })
    }
}

fn fixed(field: Field, width: usize, min: i64, max: i64) -> Item {
    Item::Fixed {
        field,
        width,
        min,
        max,
    }
}

fn variable(field: Field, min: i64, max: i64) -> Item {
    Item::Variable { field, min, max }
}

impl TryFrom<String> for DateFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// 파싱 중 모은 날짜 구성 요소
#[derive(Debug, Default)]
struct Parts {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
    hour: u32,
    minute: u32,
    second: u32,
    unix: Option<i64>,
}

impl Parts {
    fn set(&mut self, field: Field, value: i64) {
        // 범위는 호출 전에 검사됨
        let small = value as u32;
        match field {
            Field::Month => self.month = Some(small),
            Field::Day => self.day = Some(small),
            Field::Hour => self.hour = small,
            Field::Minute => self.minute = small,
            Field::Second => self.second = small,
            Field::Year2 => {
                let v = value as i32;
                self.year = Some(if v < TWO_DIGIT_YEAR_EPOCH {
                    2000 + v
                } else {
                    1900 + v
                });
            }
            Field::Year4 => self.year = Some(value as i32),
            Field::Unix => self.unix = Some(value),
        }
    }
}

impl DateFormat {
    /// 입력을 해석하여 UTC 시각을 반환합니다.
    ///
    /// `tz`가 `event`이면 `event.timezone`을 참조합니다.
    /// 연도가 없으면 `now` 기준으로 올해(또는 전년도)를 사용합니다.
    pub fn parse(
        &self,
        input: &str,
        tz: &TzSetting,
        event: &Event,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let mut parts = Parts::default();
        let mut pos = 0;
        for item in &self.items {
            if pos >= input.len() {
                break;
            }
            pos = parse_item(item, input, pos, &mut parts)?;
        }
        build(&parts, tz, event, now)
    }
}

fn parse_item(item: &Item, input: &str, pos: usize, parts: &mut Parts) -> Option<usize> {
    match item {
        Item::Literal(lit) => match_literal(input, pos, lit),
        Item::MonthName { long } => parse_month_name(input, pos, *long, parts),
        Item::Fixed {
            field,
            width,
            min,
            max,
        } => {
            let start = skip_spaces(input, pos);
            let digits = input.get(start..start + width)?;
            if !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let value: i64 = digits.parse().ok()?;
            if !(*min..=*max).contains(&value) {
                return None;
            }
            parts.set(*field, value);
            Some(start + width)
        }
        Item::Variable { field, min, max } => {
            parse_variable(input, pos, *field, *min, *max, parts)
        }
        Item::Hms => {
            let mut pos = pos;
            for (i, (field, max)) in [(Field::Hour, 24), (Field::Minute, 59), (Field::Second, 60)]
                .into_iter()
                .enumerate()
            {
                if i > 0 {
                    if pos >= input.len() {
                        break;
                    }
                    pos = match_literal(input, pos, ":")?;
                }
                if pos >= input.len() {
                    break;
                }
                pos = parse_variable(input, pos, field, 0, max, parts)?;
            }
            Some(pos)
        }
        Item::AmPm => parse_am_pm(input, pos, parts),
    }
}

fn parse_variable(
    input: &str,
    pos: usize,
    field: Field,
    min: i64,
    max: i64,
    parts: &mut Parts,
) -> Option<usize> {
    let start = skip_spaces(input, pos);
    let end = skip_digits(input, start);
    let value: i64 = input[start..end].parse().ok()?;
    if !(min..=max).contains(&value) {
        return None;
    }
    parts.set(field, value);
    Some(end)
}

fn skip_spaces(input: &str, pos: usize) -> usize {
    let rest = &input[pos..];
    pos + (rest.len() - rest.trim_start_matches(' ').len())
}

fn skip_digits(input: &str, pos: usize) -> usize {
    let rest = &input[pos..];
    pos + (rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len())
}

/// 정확히 일치하거나, 양쪽의 선행 공백을 제거한 뒤 일치하면 통과
fn match_literal(input: &str, pos: usize, lit: &str) -> Option<usize> {
    if input[pos..].starts_with(lit) {
        return Some(pos + lit.len());
    }
    let trimmed = lit.trim_start_matches(' ');
    let start = skip_spaces(input, pos);
    input[start..]
        .starts_with(trimmed)
        .then_some(start + trimmed.len())
}

fn parse_month_name(input: &str, pos: usize, long: bool, parts: &mut Parts) -> Option<usize> {
    let start = skip_spaces(input, pos);
    let abbrev = input.get(start..start + 3)?.to_ascii_lowercase();
    let (index, extra) = MONTHS
        .iter()
        .enumerate()
        .find(|(_, (name, _))| *name == abbrev)
        .map(|(i, (_, extra))| (i, *extra))?;
    parts.month = Some(index as u32 + 1);

    let mut end = start + 3;
    let tail = input[end..]
        .bytes()
        .take(extra)
        .take_while(u8::is_ascii_alphabetic)
        .count();
    // %B는 긴 이름이 완전히 있을 때만 나머지를 소비
    if long || tail == extra {
        end += tail;
    }
    Some(end)
}

fn parse_am_pm(input: &str, pos: usize, parts: &mut Parts) -> Option<usize> {
    let start = skip_spaces(input, pos);
    let head = input.get(start..start + 2)?.to_ascii_uppercase();
    let (is_pm, dotted) = match head.as_str() {
        "AM" => (false, false),
        "A." => (false, true),
        "PM" => (true, false),
        "P." => (true, true),
        _ => return None,
    };
    let mut end = start + 2;
    if dotted {
        let tail = input.get(end..end + 2)?;
        if !tail.eq_ignore_ascii_case("M.") {
            return None;
        }
        end += 2;
    }
    if is_pm {
        if parts.hour < 12 {
            parts.hour += 12;
        }
    } else if parts.hour == 12 {
        parts.hour = 0;
    }
    Some(end)
}

fn build(
    parts: &Parts,
    tz: &TzSetting,
    event: &Event,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if let Some(unix) = parts.unix {
        return DateTime::from_timestamp(unix, 0);
    }
    let month = parts.month?;
    let day = parts.day?;

    match parts.year {
        Some(year) => at(year, month, day, parts, tz, event),
        // 2월 29일은 가장 가까운 지난 윤년까지 거슬러 올라갑니다.
        None => (0..=MAX_LEAP_YEAR_GAP).find_map(|back| {
            at(now.year() - back, month, day, parts, tz, event)
                .filter(|ts| (*ts - now).num_seconds() <= MAX_FUTURE_DELTA_SECS)
        }),
    }
}

/// 자정 기준으로 시/분/초를 더하므로 24시와 60초도 다음 단위로 넘어갑니다.
fn at(
    year: i32,
    month: u32,
    day: u32,
    parts: &Parts,
    tz: &TzSetting,
    event: &Event,
) -> Option<DateTime<Utc>> {
    let midnight: NaiveDateTime = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)?;
    let local = midnight
        + TimeDelta::hours(i64::from(parts.hour))
        + TimeDelta::minutes(i64::from(parts.minute))
        + TimeDelta::seconds(i64::from(parts.second));
    let offset = tz.resolve(event, &local);
    let utc = local - TimeDelta::seconds(i64::from(offset.local_minus_utc()));
    Some(DateTime::from_naive_utc_and_offset(utc, Utc))
}
