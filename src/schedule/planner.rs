use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use tracing::debug;

use super::room_code::RoomCodeExtractor;
use super::slot_utils::{free_intervals, Interval, TimeOfDay};
use super::types::{Directory, Event, RoomFilter, Slot, WorkingWindow};

/// Free-now and free-soon listings for one query time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub free_now: Vec<Slot>,
    pub free_soon: Vec<Slot>,
}

/// Free slots of every directory room passing `filter` on `date`.
///
/// Slots come out room by room in directory order; within a room they are
/// chronological. Rooms without events that day are free for the whole window.
pub fn plan_day(
    directory: &Directory,
    events: &[Event],
    date: NaiveDate,
    filter: &RoomFilter,
    window: &WorkingWindow,
) -> Vec<Slot> {
    if directory.is_empty() {
        return Vec::new();
    }
    let Some(extractor) = RoomCodeExtractor::new(&directory.building) else {
        return Vec::new();
    };

    // Busy intervals of the day keyed by full room code
    let mut busy_by_room: HashMap<String, Vec<Interval>> = HashMap::new();
    for event in events {
        let Some((event_date, interval)) = event.busy_interval() else {
            continue;
        };
        if event_date != date {
            continue;
        }
        if let Some(code) = extractor.extract(event) {
            busy_by_room.entry(code.full_code).or_default().push(interval);
        }
    }

    let mut slots = Vec::new();
    for (floor, room) in directory.rooms() {
        if !filter.matches(floor, room) {
            continue;
        }
        let code = directory.full_code(floor, room);
        let mut busy = busy_by_room.remove(&code).unwrap_or_default();
        busy.sort_by_key(|interval| interval.start);
        slots.extend(
            free_intervals(&busy, window.start, window.end)
                .into_iter()
                .map(|interval| Slot::new(&code, interval)),
        );
    }

    debug!(%date, slots = slots.len(), "planned free slots");
    slots
}

/// Slots open at `at`, trimmed to start at `at`, longest first.
///
/// Ranked by the minutes left after `at`, not by the slot's full length, so
/// a room free all afternoon outranks one free since morning that closes soon.
pub fn free_now(slots: &[Slot], at: TimeOfDay) -> Vec<Slot> {
    let mut now: Vec<Slot> = slots
        .iter()
        .filter(|slot| slot.start <= at && at < slot.end)
        .map(|slot| Slot::new(&slot.room_code, Interval::new(at, slot.end)))
        .filter(|slot| slot.duration_minutes > 0)
        .collect();
    // stable, so equal durations keep directory order
    now.sort_by(|a, b| b.duration_minutes.cmp(&a.duration_minutes));
    now
}

/// Slots opening after `at` that last at least `min_duration` minutes,
/// soonest first and longest first among those opening together
pub fn free_soon(slots: &[Slot], at: TimeOfDay, min_duration: u32) -> Vec<Slot> {
    let mut soon: Vec<Slot> = slots
        .iter()
        .filter(|slot| slot.start > at && slot.duration_minutes >= min_duration)
        .cloned()
        .collect();
    soon.sort_by(|a, b| {
        at.minutes_until(a.start)
            .cmp(&at.minutes_until(b.start))
            .then(b.duration_minutes.cmp(&a.duration_minutes))
    });
    soon
}

/// Plans the day and derives both listings for `at`
pub fn availability(
    directory: &Directory,
    events: &[Event],
    date: NaiveDate,
    at: TimeOfDay,
    filter: &RoomFilter,
    window: &WorkingWindow,
) -> Availability {
    let slots = plan_day(directory, events, date, filter, window);
    Availability {
        free_now: free_now(&slots, at),
        free_soon: free_soon(&slots, at, window.min_soon_duration),
    }
}

/// Fills in a missing query date and time.
///
/// The date defaults to today; the time to the current time when the date
/// is today and to the start of the working day otherwise.
pub fn query_moment(
    now: NaiveDateTime,
    date: Option<NaiveDate>,
    time: Option<TimeOfDay>,
    window: &WorkingWindow,
) -> (NaiveDate, TimeOfDay) {
    let today = now.date();
    let date = date.unwrap_or(today);
    let time = time.unwrap_or_else(|| {
        if date == today {
            TimeOfDay::from_hm(now.hour(), now.minute())
        } else {
            window.start
        }
    });
    (date, time)
}

/// Events held in room `full_code` on `date`, by start time
pub fn room_events<'a>(
    events: &'a [Event],
    building: &str,
    full_code: &str,
    date: NaiveDate,
) -> Vec<&'a Event> {
    let Some(extractor) = RoomCodeExtractor::new(building) else {
        return Vec::new();
    };
    let mut matching: Vec<&Event> = events
        .iter()
        .filter(|event| event.date() == Some(date))
        .filter(|event| {
            extractor
                .extract(event)
                .is_some_and(|code| code.full_code == full_code)
        })
        .collect();
    matching.sort_by(|a, b| a.start.cmp(&b.start));
    matching
}

/// One room's events for a day, as shown on the schedule page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSchedule<'a> {
    pub room_code: String,
    /// Colour of the room's first event in feed order
    pub color: Option<&'a str>,
    pub events: Vec<&'a Event>,
}

/// Groups the day's events by room code, rooms sorted by code
pub fn schedule_by_room<'a>(
    events: &'a [Event],
    building: &str,
    date: NaiveDate,
    filter: &RoomFilter,
) -> Vec<RoomSchedule<'a>> {
    let Some(extractor) = RoomCodeExtractor::new(building) else {
        return Vec::new();
    };

    let mut by_room: BTreeMap<String, Vec<&Event>> = BTreeMap::new();
    for event in events {
        if event.date() != Some(date) {
            continue;
        }
        let Some(code) = extractor.extract(event) else {
            continue;
        };
        if !filter.matches(&code.floor, &code.room_num) {
            continue;
        }
        by_room.entry(code.full_code).or_default().push(event);
    }

    by_room
        .into_iter()
        .map(|(room_code, mut room_events)| {
            let color = room_events.first().and_then(|e| e.color.as_deref());
            room_events.sort_by(|a, b| a.start.cmp(&b.start));
            RoomSchedule {
                room_code,
                color,
                events: room_events,
            }
        })
        .collect()
}
