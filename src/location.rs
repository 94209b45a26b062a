use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

pub const MAX_SUGGESTIONS: usize = 3;

/// Suggested whenever no attendee has a matching location record
pub const FALLBACK_LOCATIONS: [&str; MAX_SUGGESTIONS] = ["Library", "Student Center", "Main Campus"];

const WEEKDAYS: [(&str, Weekday); 7] = [
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

/// Full weekday name, ignoring case. Abbreviations are not weekday names.
fn weekday_from_name(name: &str) -> Option<Weekday> {
    let name = name.trim();
    WEEKDAYS
        .iter()
        .find(|(full, _)| full.eq_ignore_ascii_case(name))
        .map(|&(_, day)| day)
}

/// A person is assumed to still be near a recurring event for this many
/// hours after it ends.
const NEARBY_HOURS: u32 = 2;

/// A recurring event as supplied by the caller:
/// `{location, day: "monday", end_time: "HH:MM"}`
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LocationRecord {
    pub location: String,
    pub day: String,
    pub end_time: String,
}

impl LocationRecord {
    pub fn new(location: &str, day: &str, end_time: &str) -> LocationRecord {
        LocationRecord {
            location: location.to_string(),
            day: day.to_string(),
            end_time: end_time.to_string(),
        }
    }

    /// Resolves the weekday name and the hour of `end_time`.
    /// Only the hour is kept; minutes never take part in matching.
    ///
    /// # Examples
    /// ```
    /// use chrono::Weekday;
    /// use treffpunkt_libs::location::LocationRecord;
    ///
    /// let hint = LocationRecord::new("Library", "tuesday", "14:50").to_hint().unwrap();
    /// assert_eq!(hint.day, Weekday::Tue);
    /// assert_eq!(hint.end_hour, 14);
    ///
    /// assert!(LocationRecord::new("Library", "someday", "14:50").to_hint().is_none());
    /// assert!(LocationRecord::new("Library", "tue", "14:50").to_hint().is_none());
    /// assert!(LocationRecord::new("Library", "tuesday", "noon").to_hint().is_none());
    /// ```
    pub fn to_hint(&self) -> Option<LocationHint> {
        let day = weekday_from_name(&self.day);
        let end_hour = self
            .end_time
            .split(':')
            .next()
            .and_then(|hour| hour.trim().parse::<u32>().ok());

        match (day, end_hour) {
            (Some(day), Some(end_hour)) => Some(LocationHint {
                location: self.location.clone(),
                day,
                end_hour,
            }),
            _ => {
                debug!(
                    "Ignoring location record {:?}: day {:?}, end_time {:?}",
                    self.location, self.day, self.end_time
                );
                None
            }
        }
    }
}

/// A parsed [`LocationRecord`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationHint {
    pub location: String,
    pub day: Weekday,
    pub end_hour: u32,
}

impl LocationHint {
    /// Same weekday, and the event ended within the hours leading up to `at`
    /// (same hour inclusive).
    pub fn is_near(&self, at: &NaiveDateTime) -> bool {
        let hour = at.hour();
        self.day == at.weekday() && self.end_hour <= hour && hour <= self.end_hour + NEARBY_HOURS
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationScore {
    pub score: usize,
    pub suggestions: Vec<String>,
}

impl LocationScore {
    pub fn fallback() -> LocationScore {
        LocationScore {
            score: 0,
            suggestions: FALLBACK_LOCATIONS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// Scores how convenient `at` is for the owners of `hints` and proposes
/// where to meet, from a single pass over the matching hints.
///
/// The score is the frequency of the most common nearby location. Suggestions
/// are the most frequent distinct locations, ties kept in first-seen order.
///
/// # Examples
/// ```
/// use treffpunkt_libs::location::{score_and_suggest, LocationRecord};
/// use treffpunkt_libs::time::parse_timestamp;
///
/// let hints = vec![
///     LocationRecord::new("Science Hall", "monday", "10:00"),
///     LocationRecord::new("Gym", "monday", "11:15"),
///     LocationRecord::new("Gym", "monday", "09:45"),
/// ]
/// .iter()
/// .filter_map(LocationRecord::to_hint)
/// .collect::<Vec<_>>();
///
/// // 2025-09-22 is a Monday
/// let at = parse_timestamp("2025-09-22T11:30").unwrap();
/// let result = score_and_suggest(hints.iter(), &at);
///
/// assert_eq!(result.score, 2);
/// assert_eq!(result.suggestions, vec!["Gym", "Science Hall"]);
/// ```
pub fn score_and_suggest<'a, I>(hints: I, at: &NaiveDateTime) -> LocationScore
where
    I: IntoIterator<Item = &'a LocationHint>,
{
    let mut counts: Vec<(&str, usize)> = Vec::new();

    for hint in hints.into_iter().filter(|hint| hint.is_near(at)) {
        match counts.iter_mut().find(|(location, _)| *location == hint.location) {
            Some((_, count)) => *count += 1,
            None => counts.push((hint.location.as_str(), 1)),
        }
    }

    if counts.is_empty() {
        return LocationScore::fallback();
    }

    // `sorted_by` is stable, so equal counts stay in first-seen order
    let ranked = counts
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1))
        .collect_vec();

    LocationScore {
        score: ranked.first().map_or(0, |(_, count)| *count),
        suggestions: ranked
            .into_iter()
            .take(MAX_SUGGESTIONS)
            .map(|(location, _)| location.to_string())
            .collect(),
    }
}
