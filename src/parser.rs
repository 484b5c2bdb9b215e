use std::path::Path;

use serde_json::Value;
use tracing::warn;

use crate::error::CacheError;
use crate::schedule::Event;

/// Decodes a feed body: a JSON array whose entries are events.
///
/// Entries that are not valid events (missing `start`/`end`, wrong types)
/// are dropped one by one, the rest is kept.
pub fn parse_feed(body: &[u8]) -> Result<Vec<Event>, serde_json::Error> {
    let raw: Vec<Value> = serde_json::from_slice(body)?;
    Ok(parse_events(raw))
}

/// Keeps the entries that decode as events
pub fn parse_events(raw: Vec<Value>) -> Vec<Event> {
    let total = raw.len();
    let events: Vec<Event> = raw
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect();

    let dropped = total - events.len();
    if dropped > 0 {
        warn!(dropped, total, "dropped malformed feed entries");
    }
    events
}

/// Loads events from a cached feed file
pub fn load_events<P: AsRef<Path>>(path: P) -> Result<Vec<Event>, CacheError> {
    let body = std::fs::read(path)?;
    Ok(parse_feed(&body)?)
}
