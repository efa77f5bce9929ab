use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// 偏移量之外附带的时区缩写，如 `+0000 UTC`、`MST`
static ZONE_ABBREV_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s(?:UTC|GMT|[A-Z]{1,3}[SD]T)\b").expect("valid regex"));

static YEAR_MONTH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{1,2}$").expect("valid regex"));

/// 带时区的格式
const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%d %H:%M %z",
    "%Y/%m/%d %H:%M:%S %z",
    "%a %b %d %H:%M:%S %z %Y",
];

/// 无时区的日期时间格式，按 UTC 处理
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%B %d, %Y %H:%M:%S",
    "%B %d, %Y %H:%M",
    "%B %d, %Y %I:%M%p",
    "%B %d, %Y %I:%M %p",
    "%B %d, %Y %I:%M:%S%p",
    "%B %d, %Y %I:%M:%S %p",
    "%a %b %d %H:%M:%S %Y",
    "%d %B %Y, %H:%M",
    "%d %B %Y, %H:%M:%S",
    "%d %B %Y %H:%M",
    "%d %B %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// 解析时间字符串
///
/// 依次尝试：纯数字（10 位秒、13 位毫秒、8 位 yyyymmdd）、RFC 3339、
/// RFC 2822、带时区格式、日期时间格式、纯日期格式、年月。无时区信息的输入按 UTC 处理。
///
/// 匹配前合并连续空白并去掉时区缩写；没有数字偏移时缩写一律按 UTC 处理。
pub fn parse_date(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty date".to_string());
    }

    if s.chars().all(|c| c.is_ascii_digit()) {
        return parse_numeric_date(s);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let normalized = normalize_date(s);
    let s = normalized.as_str();

    for fmt in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return Ok(Utc.from_utc_datetime(&dt));
            }
        }
    }

    if YEAR_MONTH_RE.is_match(s) {
        if let Some(dt) = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }

    Err("unrecognized date format".to_string())
}

fn normalize_date(s: &str) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    ZONE_ABBREV_RE.replace_all(&collapsed, "").into_owned()
}

fn parse_numeric_date(s: &str) -> Result<DateTime<Utc>, String> {
    match s.len() {
        8 => NaiveDate::parse_from_str(s, "%Y%m%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| Utc.from_utc_datetime(&dt))
            .ok_or_else(|| "invalid yyyymmdd date".to_string()),
        10 => s
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .ok_or_else(|| "invalid unix timestamp".to_string()),
        13 => s
            .parse::<i64>()
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .ok_or_else(|| "invalid unix timestamp".to_string()),
        _ => Err("unrecognized numeric date".to_string()),
    }
}

/// 实际用于编译的模式：非正则时转义
pub fn effective_pattern(query: &str, is_regex: bool) -> Cow<'_, str> {
    if is_regex {
        Cow::Borrowed(query)
    } else {
        Cow::Owned(regex::escape(query))
    }
}

/// 预编译检查
pub fn compile_pattern(query: &str, is_regex: bool) -> Result<Regex, regex::Error> {
    Regex::new(&effective_pattern(query, is_regex))
}
