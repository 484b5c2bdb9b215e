use chrono::NaiveDate;

use crate::schedule::pagination::Cursor;
use crate::schedule::{Slot, TimeOfDay, WorkingWindow};

/// Formats a duration like "1h 30m", "45m" or "2h"
pub fn format_duration(minutes: u32) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    match (hours, mins) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    }
}

/// One line per slot: room, interval, length
pub fn format_slot(slot: &Slot) -> String {
    format!(
        "{:<16} {}–{}  {}",
        slot.room_code,
        slot.start,
        slot.end,
        format_duration(slot.duration_minutes)
    )
}

/// Prints the first page of a slot list under a heading
fn print_section(title: &str, slots: &[Slot], limit: usize, empty_note: &str) {
    println!("\n=== {} ===", title);
    if slots.is_empty() {
        println!("  {}", empty_note);
        return;
    }

    let mut cursor = Cursor::default();
    for slot in cursor.reveal(slots, limit) {
        println!("  {}", format_slot(slot));
    }
    if cursor.has_more(slots) {
        println!("  … {} more", slots.len() - cursor.revealed);
    }
}

/// Prints the free-now and free-soon lists for a query
pub fn print_free_rooms(
    building: &str,
    date: NaiveDate,
    at: TimeOfDay,
    free_now: &[Slot],
    free_soon: &[Slot],
    window: &WorkingWindow,
    limit: usize,
) {
    println!("Free rooms in {} on {}", building, date);

    let outside_hours = format!(
        "Only from {} to {} rooms are listed.",
        window.start, window.end
    );
    print_section(&format!("Free now (at {})", at), free_now, limit, &outside_hours);
    print_section(
        &format!("Free soon (after {})", at),
        free_soon,
        limit,
        "No rooms become free for long enough later today.",
    );
}
