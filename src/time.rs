use chrono::format::{DelayedFormat, StrftimeItems};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serializer;
use std::fmt;

/// Output format for whole-second timestamps
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Output format when there is a sub-second part, always in microseconds
pub const ISO_FORMAT_MICROS: &str = "%Y-%m-%dT%H:%M:%S%.6f";

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Half-open [start, end) time range in local wall-clock time
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeRange(pub NaiveDateTime, pub NaiveDateTime);

impl TimeRange {
    /// Construct a new Time Range
    /// Range is half-open on [start, end)
    /// # Examples
    /// ```
    /// use treffpunkt_libs::time::{parse_timestamp, TimeRange};
    ///
    /// let start = parse_timestamp("2025-09-22T09:00:00").unwrap();
    /// let end = parse_timestamp("2025-09-22T10:00:00").unwrap();
    /// let test = TimeRange::new(start, end);
    ///
    /// assert_eq!(test.0, start);
    /// assert_eq!(test.1, end);
    /// ```
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> TimeRange {
        TimeRange(start, end)
    }

    pub fn start(self) -> NaiveDateTime {
        self.0
    }

    pub fn end(self) -> NaiveDateTime {
        self.1
    }

    /// Two ranges overlap iff `max(starts) < min(ends)`.
    /// Ranges that only touch at a boundary do not overlap.
    ///
    /// # Examples
    /// ```
    /// use treffpunkt_libs::time::{parse_timestamp, TimeRange};
    ///
    /// let range = |s, e| TimeRange::new(parse_timestamp(s).unwrap(), parse_timestamp(e).unwrap());
    ///
    /// let a = range("2025-09-22T09:00", "2025-09-22T10:00");
    /// let b = range("2025-09-22T09:30", "2025-09-22T11:00");
    /// let c = range("2025-09-22T10:00", "2025-09-22T11:00");
    ///
    /// assert!(a.overlaps(&b));
    /// assert!(!a.overlaps(&c));
    /// ```
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.0.max(other.0) < self.1.min(other.1)
    }

    /// Steps through `self` at `step` granularity, yielding every
    /// `duration`-long window that fits entirely inside the range.
    ///
    /// # Example
    /// ```
    /// use chrono::Duration;
    /// use treffpunkt_libs::time::{parse_timestamp, TimeRange};
    ///
    /// let window = TimeRange::new(
    ///     parse_timestamp("2025-09-22T09:00").unwrap(),
    ///     parse_timestamp("2025-09-22T10:30").unwrap(),
    /// );
    ///
    /// let starts = window
    ///     .windows(Duration::minutes(60), Duration::minutes(15))
    ///     .map(|w| w.start().format("%H:%M").to_string())
    ///     .collect::<Vec<_>>();
    ///
    /// assert_eq!(starts, vec!["09:00", "09:15", "09:30"]);
    /// ```
    pub fn windows(self, duration: Duration, step: Duration) -> Windows {
        Windows {
            next: Some(self.0),
            end: self.1,
            duration,
            step,
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            iso(&self.0),
            iso(&self.1)
        )
    }
}

/// Iterator returned by [`TimeRange::windows`]
#[derive(Debug, Clone)]
pub struct Windows {
    next: Option<NaiveDateTime>,
    end: NaiveDateTime,
    duration: Duration,
    step: Duration,
}

impl Iterator for Windows {
    type Item = TimeRange;

    fn next(&mut self) -> Option<TimeRange> {
        let start = self.next?;
        match start.checked_add_signed(self.duration) {
            Some(end) if end <= self.end => {
                self.next = start.checked_add_signed(self.step);
                Some(TimeRange(start, end))
            }
            _ => {
                self.next = None;
                None
            }
        }
    }
}

pub trait Available {
    fn is_available(self, slot: &TimeRange) -> bool;
}

impl<'a, T> Available for T
where
    T: Iterator<Item = &'a TimeRange>,
{
    /// Self is blocked times that cannot be scheduled.
    /// The slot is available iff it overlaps none of them.
    ///
    /// # Examples
    ///
    /// ```
    /// use treffpunkt_libs::time::{parse_timestamp, Available, TimeRange};
    ///
    /// let range = |s, e| TimeRange::new(parse_timestamp(s).unwrap(), parse_timestamp(e).unwrap());
    ///
    /// let blocked_times = vec![range("2025-09-22T09:00", "2025-09-22T09:30")];
    ///
    /// assert!(!blocked_times.iter().is_available(&range("2025-09-22T09:15", "2025-09-22T10:15")));
    /// assert!(blocked_times.iter().is_available(&range("2025-09-22T09:30", "2025-09-22T10:30")));
    /// assert!(Vec::<TimeRange>::new().iter().is_available(&range("2025-09-22T09:00", "2025-09-22T10:00")));
    /// ```
    fn is_available(mut self, slot: &TimeRange) -> bool {
        self.all(|blocked| !blocked.overlaps(slot))
    }
}

/// Parses an ISO-8601 timestamp into local wall-clock time.
///
/// Offsets are accepted but discarded: the wall clock is kept as written.
/// A bare date resolves to midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Some(time.naive_local());
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

fn iso(time: &NaiveDateTime) -> DelayedFormat<StrftimeItems<'static>> {
    if time.nanosecond() / 1_000 == 0 {
        time.format(ISO_FORMAT)
    } else {
        time.format(ISO_FORMAT_MICROS)
    }
}

/// Formats `time` as ISO-8601. Sub-second precision is written as six
/// digits, and omitted entirely when below a microsecond.
///
/// # Examples
/// ```
/// use treffpunkt_libs::time::{format_timestamp, parse_timestamp};
///
/// let whole = parse_timestamp("2025-09-22T09:00:00").unwrap();
/// let half = parse_timestamp("2025-09-22T09:00:00.5").unwrap();
///
/// assert_eq!(format_timestamp(&whole), "2025-09-22T09:00:00");
/// assert_eq!(format_timestamp(&half), "2025-09-22T09:00:00.500000");
/// ```
pub fn format_timestamp(time: &NaiveDateTime) -> String {
    iso(time).to_string()
}

pub(crate) fn serialize_timestamp<S>(time: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&iso(time))
}

/// Today 09:00 through seven days later 17:00
///
/// # Examples
/// ```
/// use treffpunkt_libs::time::{default_search_window, format_timestamp, parse_timestamp};
///
/// let now = parse_timestamp("2025-09-22T13:37:00").unwrap();
/// let window = default_search_window(now);
///
/// assert_eq!(format_timestamp(&window.start()), "2025-09-22T09:00:00");
/// assert_eq!(format_timestamp(&window.end()), "2025-09-29T17:00:00");
/// ```
pub fn default_search_window(now: NaiveDateTime) -> TimeRange {
    let midnight = now.date().and_time(NaiveTime::MIN);

    TimeRange(
        midnight + Duration::hours(9),
        midnight + Duration::days(7) + Duration::hours(17),
    )
}
