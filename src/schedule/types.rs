use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::slot_utils::{Interval, TimeOfDay};

/// Start of the working day used when none is configured
pub const WORK_START: TimeOfDay = TimeOfDay::from_hm(8, 0);
/// End of the working day used when none is configured
pub const WORK_END: TimeOfDay = TimeOfDay::from_hm(18, 15);
/// Shortest slot, in minutes, worth listing as "free soon"
pub const MIN_SOON_DURATION: u32 = 45;

/// Last representable minute, used for events running past midnight
const END_OF_DAY: TimeOfDay = TimeOfDay::from_hm(23, 59);

/// One entry of the upstream timetable feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(rename = "className", default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<ClassName>,
    pub start: String,
    pub end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Feed fields this crate does not interpret, kept so the cache round-trips
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `className` is either a single string or a list of strings in the feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassName {
    One(String),
    Many(Vec<String>),
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parses the "YYYY-MM-DDTHH:MM" prefix of a feed timestamp
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.get(..16)?, "%Y-%m-%dT%H:%M").ok()
}

fn time_of(timestamp: &NaiveDateTime) -> TimeOfDay {
    TimeOfDay::from_hm(timestamp.hour(), timestamp.minute())
}

impl Event {
    /// Title followed by the class names, the text room codes are searched in
    pub fn search_text(&self) -> String {
        let mut text = self.title.clone();
        match &self.class_name {
            Some(ClassName::One(name)) => {
                text.push(' ');
                text.push_str(name);
            }
            Some(ClassName::Many(names)) => {
                text.push(' ');
                text.push_str(&names.join(" "));
            }
            None => {}
        }
        text
    }

    /// Calendar date the event starts on
    pub fn date(&self) -> Option<NaiveDate> {
        parse_timestamp(&self.start).map(|start| start.date())
    }

    /// Date and time range occupied by the event, `None` for malformed timestamps
    pub fn busy_interval(&self) -> Option<(NaiveDate, Interval)> {
        let start = parse_timestamp(&self.start)?;
        let end = parse_timestamp(&self.end)?;
        let end_time = if end.date() > start.date() {
            END_OF_DAY
        } else {
            time_of(&end)
        };
        Some((start.date(), Interval::new(time_of(&start), end_time)))
    }

    pub fn is_well_formed(&self) -> bool {
        self.busy_interval().is_some()
    }
}

/// Room identifier extracted from event text, e.g. `AP152.02.101a`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCode {
    pub full_code: String,
    pub building: String,
    pub floor: String,
    pub room_num: String,
}

/// Floors of a building and the rooms seen on each, both sorted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    pub building: String,
    pub floors: BTreeMap<String, BTreeSet<String>>,
}

impl Directory {
    pub fn empty(building: &str) -> Self {
        Directory {
            building: building.to_string(),
            floors: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.floors.is_empty()
    }

    /// Every (floor, room) pair in floor then room order
    pub fn rooms(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.floors.iter().flat_map(|(floor, rooms)| {
            rooms
                .iter()
                .map(move |room| (floor.as_str(), room.as_str()))
        })
    }

    /// Builds the `<building>.<floor>.<room>` code for a room
    pub fn full_code(&self, floor: &str, room: &str) -> String {
        format!("{}.{}.{}", self.building, floor, room)
    }
}

/// Exact-match floor and room filters; empty strings mean "all"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomFilter {
    pub floor: Option<String>,
    pub room: Option<String>,
}

impl RoomFilter {
    pub fn new(floor: Option<String>, room: Option<String>) -> Self {
        RoomFilter {
            floor: floor.filter(|f| !f.is_empty()),
            room: room.filter(|r| !r.is_empty()),
        }
    }

    pub fn matches(&self, floor: &str, room: &str) -> bool {
        self.floor.as_deref().map_or(true, |f| f == floor)
            && self.room.as_deref().map_or(true, |r| r == room)
    }
}

/// A contiguous free interval of one room on one date
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub room_code: String,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub duration_minutes: u32,
}

impl Slot {
    pub fn new(room_code: &str, interval: Interval) -> Self {
        Slot {
            room_code: room_code.to_string(),
            start: interval.start,
            end: interval.end,
            duration_minutes: interval.duration_minutes(),
        }
    }
}

/// Daily range in which availability is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingWindow {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub min_soon_duration: u32,
}

impl Default for WorkingWindow {
    fn default() -> Self {
        WorkingWindow {
            start: WORK_START,
            end: WORK_END,
            min_soon_duration: MIN_SOON_DURATION,
        }
    }
}
