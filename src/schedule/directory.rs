use tracing::debug;

use super::room_code::RoomCodeExtractor;
use super::types::{Directory, Event};

/// Folds events into the floor -> room directory of `building`.
///
/// Events without a room code of this building, or with unreadable
/// timestamps, are skipped. The result does not depend on event order.
pub fn build_directory(events: &[Event], building: &str) -> Directory {
    let mut directory = Directory::empty(building);
    let Some(extractor) = RoomCodeExtractor::new(building) else {
        return directory;
    };

    let mut skipped = 0usize;
    for event in events {
        if !event.is_well_formed() {
            skipped += 1;
            continue;
        }
        match extractor.extract(event) {
            Some(code) if code.building == building => {
                directory
                    .floors
                    .entry(code.floor)
                    .or_default()
                    .insert(code.room_num);
            }
            _ => skipped += 1,
        }
    }

    debug!(
        building,
        floors = directory.floors.len(),
        skipped,
        "built room directory"
    );
    directory
}
