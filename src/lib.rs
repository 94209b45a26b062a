pub mod input;
pub mod location;
pub mod participant;
pub mod schedule;
pub mod time;

pub use input::{find_time, find_time_at, find_time_json, FindTimeRequest};
pub use location::{LocationHint, LocationRecord};
pub use participant::{DayPreferences, Participant};
pub use schedule::{CandidateSlot, Schedule, ScheduleError};
pub use time::TimeRange;
