use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::fetch::DEFAULT_UPSTREAM_URL;
use crate::schedule::pagination::DEFAULT_PAGE_SIZE;
use crate::schedule::types::{MIN_SOON_DURATION, WORK_END, WORK_START};
use crate::schedule::{TimeOfDay, WorkingWindow};

#[derive(Debug, Parser)]
#[command(name = "freespace", version, about = "Free room finder for FH JOANNEUM timetables")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the schedule and free-room API
    Web(ServeArgs),
    /// Print free rooms from a cached timetable file
    Free(FreeArgs),
}

/// Working-day limits, fixed for the lifetime of the process
#[derive(Debug, Clone, Args)]
pub struct WindowArgs {
    #[arg(long, env = "WORK_START", default_value_t = WORK_START)]
    pub work_start: TimeOfDay,

    #[arg(long, env = "WORK_END", default_value_t = WORK_END)]
    pub work_end: TimeOfDay,

    /// Minutes a room must stay free to be listed as "free soon"
    #[arg(long, env = "MIN_SOON_DURATION", default_value_t = MIN_SOON_DURATION)]
    pub min_soon_duration: u32,
}

impl WindowArgs {
    pub fn window(&self) -> Result<WorkingWindow, String> {
        if self.work_start >= self.work_end {
            return Err(format!(
                "working day must start before it ends ({} >= {})",
                self.work_start, self.work_end
            ));
        }
        Ok(WorkingWindow {
            start: self.work_start,
            end: self.work_end,
            min_soon_duration: self.min_soon_duration,
        })
    }
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    #[arg(long, env = "PORT", default_value_t = 3100)]
    pub port: u16,

    /// Building shown until a visitor picks another one
    #[arg(long, env = "BUILDING", default_value = "AP152")]
    pub building: String,

    #[arg(long, env = "CAMPUS", default_value = "FH JOANNEUM Graz")]
    pub campus: String,

    /// Directory with index.html, onboarding.html and assets
    #[arg(long, env = "PUBLIC_DIR", default_value = "public")]
    pub public_dir: PathBuf,

    /// Where data_<building>.json cache files live
    #[arg(long, env = "DATA_DIR", default_value = "public")]
    pub data_dir: PathBuf,

    /// Feed URL, `{building}` is replaced by the building code
    #[arg(long, env = "UPSTREAM_URL", default_value = DEFAULT_UPSTREAM_URL)]
    pub upstream_url: String,

    /// Minutes between background refreshes of the active building, 0 disables
    #[arg(long, env = "REFRESH_MINUTES", default_value_t = 60)]
    pub refresh_minutes: u64,

    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 30)]
    pub fetch_timeout_secs: u64,

    /// Secret for signing session cookies, at least 32 bytes
    #[arg(long, env = "SESSION_KEY", hide_env_values = true)]
    pub session_key: Option<String>,

    #[arg(long, env = "PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    #[command(flatten)]
    pub window: WindowArgs,
}

impl ServeArgs {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_minutes > 0).then(|| Duration::from_secs(self.refresh_minutes * 60))
    }
}

#[derive(Debug, Clone, Args)]
pub struct FreeArgs {
    /// Cached feed, e.g. public/data_AP152.json
    #[arg(long)]
    pub file: PathBuf,

    #[arg(long, default_value = "AP152")]
    pub building: String,

    /// Defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Defaults to now for today, otherwise the start of the working day
    #[arg(long)]
    pub time: Option<TimeOfDay>,

    #[arg(long)]
    pub floor: Option<String>,

    #[arg(long)]
    pub room: Option<String>,

    /// Entries shown per list
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub limit: usize,

    #[command(flatten)]
    pub window: WindowArgs,
}
