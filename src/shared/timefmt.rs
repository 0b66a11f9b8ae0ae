use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDateTime, Offset, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Only this many leading bytes of a line are examined for a timestamp.
const PREFIX_LEN: usize = 50;

static DEFAULT_FORMATS: Lazy<Vec<TimeFormat>> = Lazy::new(default_formats);

/// How the matched substring is turned into an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseKind {
    /// Format carries no zone; interpreted at the extractor's fixed offset.
    Naive,
    /// Format carries no year (syslog); the construction-time year is used.
    NaiveNoYear,
    /// Format carries its own numeric offset (`%z`).
    Zoned,
    /// RFC 2822 style (`Tue, 01 Jul 2025 10:52:37 GMT`).
    Rfc2822,
}

struct TimeFormat {
    format: &'static str,
    pattern: Regex,
    kind: ParseKind,
}

/// Extracts a UNIX epoch second from the first bytes of a log line.
///
/// Carries an ordered list of `(strftime format, regex)` pairs; the first
/// pair whose regex hits the prefix wins. Zone-less formats are resolved
/// against a fixed UTC offset captured at construction, so extraction never
/// consults process-global timezone state.
pub struct TimeExtractor {
    formats: &'static [TimeFormat],
    offset: FixedOffset,
    year: i32,
}

impl TimeExtractor {
    /// Production extractor: host-local offset and current year.
    pub fn new() -> Self {
        Self::with_offset(Local::now().offset().fix())
    }

    /// Extractor pinned to an explicit offset. The year for year-less
    /// formats is the current year at that offset.
    pub fn with_offset(offset: FixedOffset) -> Self {
        let year = Utc::now().with_timezone(&offset).year();
        Self::with_offset_and_year(offset, year)
    }

    pub fn with_offset_and_year(offset: FixedOffset, year: i32) -> Self {
        Self {
            formats: &DEFAULT_FORMATS,
            offset,
            year,
        }
    }

    /// Epoch seconds of the first recognized timestamp in `line`, or 0.
    pub fn extract(&self, line: &str) -> i64 {
        let prefix = clamp_to_char_boundary(line, PREFIX_LEN);
        for tf in self.formats {
            let Some(m) = tf.pattern.find(prefix) else {
                continue;
            };
            let matched = m.as_str();
            let parsed = match tf.kind {
                ParseKind::Naive => self.parse_naive(matched, tf.format),
                ParseKind::NaiveNoYear => {
                    let with_year = format!("{} {}", self.year, matched);
                    self.parse_naive(&with_year, "%Y %b %d %H:%M:%S")
                }
                ParseKind::Zoned => DateTime::parse_from_str(matched, tf.format)
                    .ok()
                    .map(|dt| dt.timestamp()),
                ParseKind::Rfc2822 => DateTime::parse_from_rfc2822(matched)
                    .ok()
                    .map(|dt| dt.timestamp()),
            };
            // The first matching pattern decides; a parse failure on its
            // substring means "no timestamp", not "try the next format".
            return parsed.unwrap_or(0);
        }
        0
    }

    fn parse_naive(&self, s: &str, format: &str) -> Option<i64> {
        let ndt = NaiveDateTime::parse_from_str(s, format).ok()?;
        self.offset
            .from_local_datetime(&ndt)
            .single()
            .map(|dt| dt.timestamp())
    }
}

impl Default for TimeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_to_char_boundary(line: &str, max: usize) -> &str {
    if line.len() <= max {
        return line;
    }
    let mut end = max;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}

fn default_formats() -> Vec<TimeFormat> {
    // Order is significant: earlier patterns shadow later ones.
    vec![
        TimeFormat {
            format: "%Y-%m-%d %H:%M:%S",
            pattern: Regex::new(r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}").unwrap(),
            kind: ParseKind::Naive,
        },
        TimeFormat {
            format: "%Y/%m/%d %H:%M:%S",
            pattern: Regex::new(r"\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2}").unwrap(),
            kind: ParseKind::Naive,
        },
        TimeFormat {
            format: "%d/%b/%Y:%H:%M:%S",
            pattern: Regex::new(r"\d{2}/[A-Za-z]{3}/\d{4}:\d{2}:\d{2}:\d{2}").unwrap(),
            kind: ParseKind::Naive,
        },
        TimeFormat {
            format: "%b %d %H:%M:%S",
            pattern: Regex::new(r"[A-Za-z]{3} \d{2} \d{2}:\d{2}:\d{2}").unwrap(),
            kind: ParseKind::NaiveNoYear,
        },
        TimeFormat {
            format: "%Y-%m-%dT%H:%M:%S",
            pattern: Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}").unwrap(),
            kind: ParseKind::Naive,
        },
        TimeFormat {
            format: "%Y-%m-%dT%H:%M:%S%z",
            pattern: Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}[+\-]\d{4}").unwrap(),
            kind: ParseKind::Zoned,
        },
        TimeFormat {
            format: "%a, %d %b %Y %H:%M:%S %Z",
            pattern: Regex::new(r"[A-Za-z]{3}, \d{2} [A-Za-z]{3} \d{4} \d{2}:\d{2}:\d{2} [A-Za-z]{3}")
                .unwrap(),
            kind: ParseKind::Rfc2822,
        },
    ]
}
