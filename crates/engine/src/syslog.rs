//! syslog `<PRI>` 접두어 제거
//!
//! `<34>Oct 11 22:14:15 ...`처럼 줄 앞의 PRI를 떼어내고
//! facility/severity 코드를 이벤트 필드로 기록합니다.

use logsift_core::event::Event;

/// 유효한 PRI 최대값 (facility 23, severity 7)
const MAX_SYSLOG_PRI: u16 = 191;

/// PRI 자릿수 상한
const MAX_PRI_DIGITS: usize = 3;

pub const FIELD_PRIORITY: &str = "log.syslog.priority";
pub const FIELD_FACILITY: &str = "log.syslog.facility.code";
pub const FIELD_SEVERITY: &str = "log.syslog.severity.code";

/// 디코딩된 PRI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority {
    pub value: u16,
    pub facility: u8,
    pub severity: u8,
}

impl Priority {
    fn decode(value: u16) -> Self {
        Self {
            value,
            facility: (value >> 3) as u8,
            severity: (value & 7) as u8,
        }
    }

    /// 이벤트에 `log.syslog.*` 필드를 기록합니다.
    pub fn record(&self, event: &mut Event) {
        event.set(FIELD_PRIORITY, i64::from(self.value));
        event.set(FIELD_FACILITY, i64::from(self.facility));
        event.set(FIELD_SEVERITY, i64::from(self.severity));
    }
}

/// 줄 앞의 `<PRI>`를 해석합니다.
///
/// 유효한 PRI가 없으면 `None`을 반환하며, 호출자는 줄을 그대로 사용합니다.
pub fn strip_priority(line: &str) -> Option<(Priority, &str)> {
    let rest = line.strip_prefix('<')?;
    let end = rest.find('>')?;
    let digits = &rest[..end];
    if digits.is_empty()
        || digits.len() > MAX_PRI_DIGITS
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let value: u16 = digits.parse().ok()?;
    if value > MAX_SYSLOG_PRI {
        return None;
    }
    Some((Priority::decode(value), &rest[end + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_facility_and_severity() {
        // facility=4 (auth), severity=2 (critical): 4*8+2 = 34
        let (pri, rest) = strip_priority("<34>Oct 11 22:14:15 host su: fail").unwrap();
        assert_eq!(pri.facility, 4);
        assert_eq!(pri.severity, 2);
        assert_eq!(rest, "Oct 11 22:14:15 host su: fail");
    }

    #[test]
    fn boundary_values() {
        assert_eq!(strip_priority("<0>x").unwrap().0.value, 0);
        let (pri, _) = strip_priority("<191>x").unwrap();
        assert_eq!((pri.facility, pri.severity), (23, 7));
        assert!(strip_priority("<192>x").is_none());
    }

    #[test]
    fn rejects_malformed_prefixes() {
        assert!(strip_priority("no pri").is_none());
        assert!(strip_priority("<>x").is_none());
        assert!(strip_priority("<12a>x").is_none());
        assert!(strip_priority("<0012>x").is_none());
        assert!(strip_priority("<12").is_none());
        assert!(strip_priority("<-1>x").is_none());
    }

    #[test]
    fn records_fields() {
        let (pri, _) = strip_priority("<165>msg").unwrap();
        let mut event = Event::new();
        pri.record(&mut event);
        assert_eq!(event.get(FIELD_PRIORITY).and_then(|v| v.as_i64()), Some(165));
        assert_eq!(event.get(FIELD_FACILITY).and_then(|v| v.as_i64()), Some(20));
        assert_eq!(event.get(FIELD_SEVERITY).and_then(|v| v.as_i64()), Some(5));
    }
}
