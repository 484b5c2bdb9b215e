use regex::Regex;

use super::types::{Event, RoomCode};

/// Finds `<building>.<floor>.<room>` codes of one building in event text.
///
/// The floor is 1-3 alphanumerics; the room is 3 alphanumerics with an
/// optional trailing letter. The building code is matched literally.
/// Word boundaries are ASCII only, so umlauts next to a code do not hide it.
#[derive(Debug, Clone)]
pub struct RoomCodeExtractor {
    pattern: Regex,
}

impl RoomCodeExtractor {
    /// Returns `None` for an empty building code
    pub fn new(building: &str) -> Option<Self> {
        if building.is_empty() {
            return None;
        }
        let pattern = Regex::new(&format!(
            r"(?-u:\b)({})\.([A-Za-z0-9]{{1,3}})\.([A-Za-z0-9]{{3}}[A-Za-z]?)(?-u:\b)",
            regex::escape(building)
        ))
        .ok()?;
        Some(RoomCodeExtractor { pattern })
    }

    /// First room code in the event's title and class names
    pub fn extract(&self, event: &Event) -> Option<RoomCode> {
        self.extract_text(&event.search_text())
    }

    pub fn extract_text(&self, text: &str) -> Option<RoomCode> {
        let caps = self.pattern.captures(text)?;
        Some(RoomCode {
            full_code: caps[0].to_string(),
            building: caps[1].to_string(),
            floor: caps[2].to_string(),
            room_num: caps[3].to_string(),
        })
    }
}

/// One-off extraction; prefer [`RoomCodeExtractor`] when scanning many events
pub fn extract(event: &Event, building: &str) -> Option<RoomCode> {
    RoomCodeExtractor::new(building)?.extract(event)
}
