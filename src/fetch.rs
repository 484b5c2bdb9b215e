use std::time::Duration;

use tracing::info;

use crate::error::FetchError;
use crate::parser::parse_feed;
use crate::schedule::Event;

/// Public timetable search of FH JOANNEUM, `{building}` is substituted
pub const DEFAULT_UPSTREAM_URL: &str =
    "https://almaty.fh-joanneum.at/stundenplan/json.php?submit=Suche&q={building}";

/// HTTP client for the upstream timetable feed
#[derive(Debug, Clone)]
pub struct TimetableClient {
    client: reqwest::Client,
    url_template: String,
}

impl TimetableClient {
    pub fn new(url_template: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("freespace/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url_template: url_template.to_string(),
        })
    }

    pub fn url_for(&self, building: &str) -> String {
        self.url_template.replace("{building}", building)
    }

    /// Downloads and decodes the events of one building
    pub async fn fetch(&self, building: &str) -> Result<Vec<Event>, FetchError> {
        let url = self.url_for(building);
        info!(building, %url, "fetching timetable");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let events = parse_feed(&body)?;
        info!(building, events = events.len(), "fetched timetable");
        Ok(events)
    }
}
