use crate::location::{score_and_suggest, LocationScore};
use crate::participant::Participant;
use crate::time::{default_search_window, serialize_timestamp, TimeRange};
use chrono::{Duration, Local, NaiveDateTime};
use log::{info, trace};
use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Scan granularity of the search window
pub const STEP_MINUTES: i64 = 15;
pub const MAX_RESULTS: usize = 5;
pub const DEFAULT_DURATION_MINUTES: u32 = 60;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Malformed timestamp at {field}: {value:?}")]
    MalformedTimestamp { field: String, value: String },
    /// Stricter than the malformed-timestamp contract: a zero-length meeting
    /// overlaps no busy time, so it is refused instead of scanned.
    #[error("Meeting duration must be at least one minute, got {minutes}")]
    InvalidDuration { minutes: i64 },
    #[error("Invalid request payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// A meeting time evaluated during the scan, annotated with who can attend
/// and how convenient it is.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CandidateSlot {
    #[serde(serialize_with = "serialize_timestamp")]
    pub start: NaiveDateTime,
    #[serde(serialize_with = "serialize_timestamp")]
    pub end: NaiveDateTime,
    pub attendees: Vec<String>,
    pub attendee_count: usize,
    pub day_preference_score: usize,
    pub location_score: usize,
    pub suggested_locations: Vec<String>,
}

impl CandidateSlot {
    pub fn time(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }

    /// Ranking order: more attendees, then better location, then more
    /// day-preference matches come first. Remaining ties go to the earlier start.
    pub fn rank(&self, other: &CandidateSlot) -> Ordering {
        other
            .attendee_count
            .cmp(&self.attendee_count)
            .then_with(|| other.location_score.cmp(&self.location_score))
            .then_with(|| other.day_preference_score.cmp(&self.day_preference_score))
            .then_with(|| self.start.cmp(&other.start))
    }
}

#[derive(Debug, Clone)]
pub struct Schedule {
    pub participants: Vec<Participant>,
    pub duration: Duration,
    pub window: Option<TimeRange>,
}

impl Schedule {
    /// Constucts a new Schedule for a one hour meeting over the default
    /// search window
    pub fn new(participants: Vec<Participant>) -> Schedule {
        Schedule {
            participants,
            duration: Duration::minutes(DEFAULT_DURATION_MINUTES.into()),
            window: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Schedule {
        self.duration = duration;
        self
    }

    pub fn with_window(mut self, window: TimeRange) -> Schedule {
        self.window = Some(window);
        self
    }

    /// Finds the best meeting slots, resolving a missing search window
    /// against the local clock.
    pub fn find_optimal_slots(&self) -> Result<Vec<CandidateSlot>, ScheduleError> {
        self.find_optimal_slots_at(Local::now().naive_local())
    }

    /// Scans the search window in 15 minute steps and returns at most
    /// `MAX_RESULTS` candidates, best first. `now` is only used to resolve
    /// the default search window.
    ///
    /// A window shorter than the meeting is not an error; it simply has no
    /// candidates.
    ///
    /// # Errors
    /// `ScheduleError::InvalidDuration` when the meeting duration is not positive.
    ///
    /// # Example
    /// ```
    /// use chrono::Duration;
    /// use treffpunkt_libs::{
    ///     participant::Participant,
    ///     schedule::Schedule,
    ///     time::{parse_timestamp, TimeRange},
    /// };
    ///
    /// let at = |s| parse_timestamp(s).unwrap();
    ///
    /// let participants = vec![
    ///     Participant::new("ada", vec![TimeRange::new(at("2025-09-22T09:00"), at("2025-09-22T10:00"))]),
    ///     Participant::new("grace", vec![]),
    /// ];
    ///
    /// let slots = Schedule::new(participants)
    ///     .with_duration(Duration::minutes(30))
    ///     .with_window(TimeRange::new(at("2025-09-22T09:00"), at("2025-09-22T12:00")))
    ///     .find_optimal_slots()
    ///     .unwrap();
    ///
    /// assert_eq!(slots.len(), 5);
    /// assert_eq!(slots[0].start, at("2025-09-22T10:00"));
    /// assert_eq!(slots[0].attendees, vec!["ada", "grace"]);
    /// ```
    pub fn find_optimal_slots_at(
        &self,
        now: NaiveDateTime,
    ) -> Result<Vec<CandidateSlot>, ScheduleError> {
        if self.duration <= Duration::zero() {
            return Err(ScheduleError::InvalidDuration {
                minutes: self.duration.num_minutes(),
            });
        }

        let window = self.window.unwrap_or_else(|| default_search_window(now));
        let slots = window.windows(self.duration, Duration::minutes(STEP_MINUTES));

        #[cfg(feature = "rayon")]
        let mut candidates = slots
            .collect::<Vec<_>>()
            .into_par_iter()
            .filter_map(|slot| self.evaluate(slot))
            .collect::<Vec<_>>();

        #[cfg(not(feature = "rayon"))]
        let mut candidates = slots
            .filter_map(|slot| self.evaluate(slot))
            .collect::<Vec<_>>();

        info!(
            "Found {} candidate slots for {} participants in {}",
            candidates.len(),
            self.participants.len(),
            window
        );

        // Starts are unique, so the ranking is a total order
        #[cfg(feature = "rayon")]
        candidates.par_sort_unstable_by(CandidateSlot::rank);
        #[cfg(not(feature = "rayon"))]
        candidates.sort_unstable_by(CandidateSlot::rank);

        candidates.truncate(MAX_RESULTS);

        Ok(candidates)
    }

    fn evaluate(&self, slot: TimeRange) -> Option<CandidateSlot> {
        let mut day_preference_score = 0;
        let mut available = Vec::with_capacity(self.participants.len());

        for participant in &self.participants {
            let prefers_day = participant.prefers_day(&slot);

            // Counts weekday matches even for participants who are busy
            if prefers_day {
                day_preference_score += 1;
            }

            if prefers_day && participant.is_free(&slot) {
                available.push(participant);
            }
        }

        if available.is_empty() {
            trace!("{} has no attendees", slot);
            return None;
        }

        let LocationScore { score, suggestions } = score_and_suggest(
            available.iter().flat_map(|p| p.locations.iter()),
            &slot.start(),
        );

        trace!(
            "{}: {} attendees, location {}, day preference {}",
            slot,
            available.len(),
            score,
            day_preference_score
        );

        Some(CandidateSlot {
            start: slot.start(),
            end: slot.end(),
            attendee_count: available.len(),
            attendees: available.iter().map(|p| p.id.clone()).collect(),
            day_preference_score,
            location_score: score,
            suggested_locations: suggestions,
        })
    }
}
