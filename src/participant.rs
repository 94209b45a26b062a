use crate::location::LocationHint;
use crate::time::{Available, TimeRange};
use chrono::{Datelike, Weekday};
use log::debug;

/// The weekdays a participant is willing to meet on
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DayPreferences(u8);

impl DayPreferences {
    pub const ALL: DayPreferences = DayPreferences(0b111_1111);
    pub const NONE: DayPreferences = DayPreferences(0);

    /// Builds a preference set from weekday indices (0 = Monday ... 6 = Sunday).
    /// Indices outside that range never match a weekday.
    ///
    /// # Examples
    /// ```
    /// use chrono::Weekday;
    /// use treffpunkt_libs::participant::DayPreferences;
    ///
    /// let weekdays = DayPreferences::from_indices([1, 2, 3, 4, 9]);
    ///
    /// assert!(!weekdays.contains(Weekday::Mon));
    /// assert!(weekdays.contains(Weekday::Tue));
    /// assert!(weekdays.contains(Weekday::Fri));
    /// assert!(!weekdays.contains(Weekday::Sun));
    /// ```
    pub fn from_indices<I>(indices: I) -> DayPreferences
    where
        I: IntoIterator<Item = u8>,
    {
        DayPreferences(indices.into_iter().fold(0, |mask, index| {
            if index < 7 {
                mask | (1 << index)
            } else {
                debug!("Ignoring day preference index {}", index);
                mask
            }
        }))
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }
}

impl Default for DayPreferences {
    fn default() -> DayPreferences {
        DayPreferences::ALL
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Participant {
    pub id: String,
    pub busy_times: Vec<TimeRange>,
    pub day_preferences: DayPreferences,
    pub locations: Vec<LocationHint>,
}

impl Participant {
    /// Constructs a new Participant with the specified busy_times.
    /// This indicates times when this participant *cannot* meet.
    /// Every weekday is allowed and no location history is known.
    pub fn new(id: &str, busy_times: Vec<TimeRange>) -> Participant {
        Participant {
            id: id.to_string(),
            busy_times,
            day_preferences: DayPreferences::default(),
            locations: vec![],
        }
    }

    pub fn with_day_preferences(mut self, day_preferences: DayPreferences) -> Participant {
        self.day_preferences = day_preferences;
        self
    }

    pub fn with_locations(mut self, locations: Vec<LocationHint>) -> Participant {
        self.locations = locations;
        self
    }

    /// No busy time overlaps `slot`
    pub fn is_free(&self, slot: &TimeRange) -> bool {
        self.busy_times.iter().is_available(slot)
    }

    /// The weekday `slot` starts on is one this participant meets on
    pub fn prefers_day(&self, slot: &TimeRange) -> bool {
        self.day_preferences.contains(slot.start().weekday())
    }
}
