pub mod types;
pub mod slot_utils;
pub mod room_code;
pub mod directory;
pub mod planner;
pub mod pagination;

pub use types::{ClassName, Directory, Event, RoomCode, RoomFilter, Slot, WorkingWindow};
pub use slot_utils::{free_intervals, Interval, TimeOfDay};
pub use room_code::{extract, RoomCodeExtractor};
pub use directory::build_directory;
pub use planner::{
    availability, free_now, free_soon, plan_day, query_moment, room_events, schedule_by_room,
    Availability, RoomSchedule,
};
pub use pagination::{Cursor, Page};
