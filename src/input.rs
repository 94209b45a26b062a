use crate::location::{LocationHint, LocationRecord};
use crate::participant::{DayPreferences, Participant};
use crate::schedule::{CandidateSlot, Schedule, ScheduleError, DEFAULT_DURATION_MINUTES};
use crate::time::{default_search_window, parse_timestamp, TimeRange};
use chrono::{Duration, Local, NaiveDateTime};
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct BusyInterval {
    pub start: String,
    pub end: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct SearchRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// The find-time payload as assembled by the caller
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct FindTimeRequest {
    pub users: Vec<String>,
    pub schedules: BTreeMap<String, Vec<BusyInterval>>,
    pub day_preferences: BTreeMap<String, Vec<i64>>,
    pub user_locations: BTreeMap<String, Vec<LocationRecord>>,
    pub meeting_duration_minutes: u32,
    pub search_range: Option<SearchRange>,
}

impl Default for FindTimeRequest {
    fn default() -> Self {
        FindTimeRequest {
            users: vec![],
            schedules: BTreeMap::new(),
            day_preferences: BTreeMap::new(),
            user_locations: BTreeMap::new(),
            meeting_duration_minutes: DEFAULT_DURATION_MINUTES,
            search_range: None,
        }
    }
}

fn parse_field(field: impl FnOnce() -> String, value: &str) -> Result<NaiveDateTime, ScheduleError> {
    parse_timestamp(value).ok_or_else(|| ScheduleError::MalformedTimestamp {
        field: field(),
        value: value.to_string(),
    })
}

impl FindTimeRequest {
    /// Resolves defaults and parses every timestamp up front, producing a
    /// [`Schedule`] ready to search. The request itself is left untouched.
    ///
    /// # Errors
    /// Any unparseable `start`/`end` (including schedules of ids that are not
    /// in `users`) fails the whole conversion.
    pub fn to_schedule(&self, now: NaiveDateTime) -> Result<Schedule, ScheduleError> {
        if self.meeting_duration_minutes == 0 {
            return Err(ScheduleError::InvalidDuration { minutes: 0 });
        }

        let window = self.search_window(now)?;
        let mut busy_times = self.busy_times()?;

        let participants = self
            .users
            .iter()
            .unique()
            .map(|id| {
                Participant::new(id, busy_times.remove(id.as_str()).unwrap_or_default())
                    .with_day_preferences(self.day_preferences_for(id))
                    .with_locations(self.locations_for(id))
            })
            .collect_vec();

        if participants.len() < self.users.len() {
            debug!(
                "Collapsed {} duplicate user ids",
                self.users.len() - participants.len()
            );
        }

        Ok(Schedule::new(participants)
            .with_duration(Duration::minutes(self.meeting_duration_minutes.into()))
            .with_window(window))
    }

    fn search_window(&self, now: NaiveDateTime) -> Result<TimeRange, ScheduleError> {
        let default = default_search_window(now);
        let range = self.search_range.clone().unwrap_or_default();

        let start = match &range.start {
            Some(value) => parse_field(|| "search_range.start".to_string(), value)?,
            None => default.start(),
        };
        let end = match &range.end {
            Some(value) => parse_field(|| "search_range.end".to_string(), value)?,
            None => default.end(),
        };

        Ok(TimeRange::new(start, end))
    }

    fn busy_times(&self) -> Result<HashMap<&str, Vec<TimeRange>>, ScheduleError> {
        let mut busy_times = HashMap::with_capacity(self.schedules.len());

        for (id, intervals) in &self.schedules {
            let times = intervals
                .iter()
                .enumerate()
                .map(|(i, interval)| {
                    let start =
                        parse_field(|| format!("schedules[{}][{}].start", id, i), &interval.start)?;
                    let end =
                        parse_field(|| format!("schedules[{}][{}].end", id, i), &interval.end)?;
                    Ok(TimeRange::new(start, end))
                })
                .collect::<Result<Vec<_>, ScheduleError>>()?;

            busy_times.insert(id.as_str(), times);
        }

        Ok(busy_times)
    }

    fn day_preferences_for(&self, id: &str) -> DayPreferences {
        self.day_preferences
            .get(id)
            .map(|indices| {
                DayPreferences::from_indices(
                    indices.iter().map(|&i| u8::try_from(i).unwrap_or(u8::MAX)),
                )
            })
            .unwrap_or_default()
    }

    fn locations_for(&self, id: &str) -> Vec<LocationHint> {
        self.user_locations
            .get(id)
            .map(|records| records.iter().filter_map(LocationRecord::to_hint).collect())
            .unwrap_or_default()
    }
}

/// Finds the best meeting slots for `request`, using the local clock to
/// resolve a missing search range.
pub fn find_time(request: &FindTimeRequest) -> Result<Vec<CandidateSlot>, ScheduleError> {
    find_time_at(request, Local::now().naive_local())
}

pub fn find_time_at(
    request: &FindTimeRequest,
    now: NaiveDateTime,
) -> Result<Vec<CandidateSlot>, ScheduleError> {
    request.to_schedule(now)?.find_optimal_slots_at(now)
}

/// JSON in, JSON out: the shape an HTTP handler serves directly.
pub fn find_time_json(payload: &str, now: NaiveDateTime) -> Result<String, ScheduleError> {
    let request: FindTimeRequest = serde_json::from_str(payload)?;
    let slots = find_time_at(&request, now)?;

    Ok(serde_json::to_string(&slots)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn now() -> NaiveDateTime {
        parse_timestamp("2025-09-22T08:00:00").unwrap()
    }

    #[test]
    fn defaults_resolve() {
        let request: FindTimeRequest = serde_json::from_str(r#"{"users": ["a"]}"#).unwrap();
        assert_eq!(request.meeting_duration_minutes, 60);

        let schedule = request.to_schedule(now()).unwrap();
        assert_eq!(schedule.duration, Duration::minutes(60));
        assert_eq!(schedule.window, Some(default_search_window(now())));
        assert_eq!(schedule.participants.len(), 1);
        assert_eq!(schedule.participants[0].day_preferences, DayPreferences::ALL);
        assert!(schedule.participants[0].busy_times.is_empty());
        assert!(schedule.participants[0].locations.is_empty());
    }

    #[test]
    fn partial_search_range_keeps_other_default() {
        let request: FindTimeRequest = serde_json::from_str(
            r#"{"users": ["a"], "search_range": {"end": "2025-09-23T12:00:00"}}"#,
        )
        .unwrap();

        let window = request.to_schedule(now()).unwrap().window.unwrap();
        assert_eq!(window.start(), parse_timestamp("2025-09-22T09:00").unwrap());
        assert_eq!(window.end(), parse_timestamp("2025-09-23T12:00").unwrap());
    }

    #[test]
    fn malformed_timestamp_fails_whole_request() {
        let request: FindTimeRequest = serde_json::from_str(
            r#"{
                "users": ["a"],
                "schedules": {
                    "a": [{"start": "2025-09-22T09:00:00", "end": "2025-09-22T10:00:00"}],
                    "stranger": [{"start": "yesterday", "end": "2025-09-22T10:00:00"}]
                }
            }"#,
        )
        .unwrap();

        match request.to_schedule(now()) {
            Err(ScheduleError::MalformedTimestamp { field, value }) => {
                assert_eq!(field, "schedules[stranger][0].start");
                assert_eq!(value, "yesterday");
            }
            other => panic!("Expected a MalformedTimestamp error, got {:?}", other),
        }
    }

    #[test]
    fn malformed_search_range_fails() {
        let request = FindTimeRequest {
            users: vec!["a".to_string()],
            search_range: Some(SearchRange {
                start: Some("22/09/2025".to_string()),
                end: None,
            }),
            ..FindTimeRequest::default()
        };

        assert!(matches!(
            find_time_at(&request, now()),
            Err(ScheduleError::MalformedTimestamp { .. })
        ));
    }

    #[test]
    fn zero_duration_is_rejected() {
        let request = FindTimeRequest {
            users: vec!["a".to_string()],
            meeting_duration_minutes: 0,
            ..FindTimeRequest::default()
        };

        assert!(matches!(
            request.to_schedule(now()),
            Err(ScheduleError::InvalidDuration { minutes: 0 })
        ));
    }

    #[test]
    fn duplicate_users_collapse() {
        let request = FindTimeRequest {
            users: vec!["a".to_string(), "b".to_string(), "a".to_string()],
            ..FindTimeRequest::default()
        };

        let ids = request
            .to_schedule(now())
            .unwrap()
            .participants
            .into_iter()
            .map(|p| p.id)
            .collect_vec();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn preferences_and_locations_convert() {
        let request: FindTimeRequest = serde_json::from_str(
            r#"{
                "users": ["a", "b"],
                "day_preferences": {"a": [0, 6, -1, 12], "b": []},
                "user_locations": {"a": [
                    {"location": "Lab", "day": "monday", "end_time": "10:00"},
                    {"location": "Nowhere", "day": "blursday", "end_time": "10:00"}
                ]}
            }"#,
        )
        .unwrap();

        let schedule = request.to_schedule(now()).unwrap();
        let a = &schedule.participants[0];
        let b = &schedule.participants[1];

        assert_eq!(a.day_preferences, DayPreferences::from_indices([0, 6]));
        assert_eq!(b.day_preferences, DayPreferences::NONE);
        assert_eq!(
            a.locations,
            vec![LocationHint {
                location: "Lab".to_string(),
                day: Weekday::Mon,
                end_hour: 10,
            }]
        );
    }

    #[test]
    fn request_is_not_mutated() {
        let request: FindTimeRequest = serde_json::from_str(
            r#"{"users": ["a"], "schedules": {"a": [{"start": "2025-09-22T09:00:00", "end": "2025-09-22T10:00:00"}]}}"#,
        )
        .unwrap();
        let before = request.clone();

        find_time_at(&request, now()).unwrap();

        assert_eq!(request, before);
    }

    #[test]
    fn json_round_trip() {
        let payload = r#"{
            "users": ["a", "b"],
            "schedules": {"a": [{"start": "2025-09-22T09:00:00", "end": "2025-09-22T10:00:00"}]},
            "meeting_duration_minutes": 60,
            "search_range": {"start": "2025-09-22T09:00:00", "end": "2025-09-22T11:00:00"}
        }"#;

        let response: serde_json::Value =
            serde_json::from_str(&find_time_json(payload, now()).unwrap()).unwrap();

        assert_eq!(
            response[0],
            serde_json::json!({
                "start": "2025-09-22T10:00:00",
                "end": "2025-09-22T11:00:00",
                "attendees": ["a", "b"],
                "attendee_count": 2,
                "day_preference_score": 2,
                "location_score": 0,
                "suggested_locations": ["Library", "Student Center", "Main Campus"]
            })
        );
        assert_eq!(response.as_array().unwrap().len(), 5);
    }

    #[test]
    fn fractional_seconds_serialize_as_micros() {
        let payload = r#"{
            "users": ["a"],
            "meeting_duration_minutes": 30,
            "search_range": {"start": "2025-09-22T09:00:00.5", "end": "2025-09-22T09:45:00"}
        }"#;

        let response: serde_json::Value =
            serde_json::from_str(&find_time_json(payload, now()).unwrap()).unwrap();

        assert_eq!(response[0]["start"], "2025-09-22T09:00:00.500000");
        assert_eq!(response[0]["end"], "2025-09-22T09:30:00.500000");
        assert_eq!(response.as_array().unwrap().len(), 1);
    }

    #[test]
    fn invalid_json_is_a_payload_error() {
        assert!(matches!(
            find_time_json("{\"users\": 3}", now()),
            Err(ScheduleError::InvalidPayload(_))
        ));
    }
}
