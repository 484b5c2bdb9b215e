use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{CacheError, FetchError, RefreshError};
use crate::fetch::TimetableClient;
use crate::parser::parse_feed;
use crate::schedule::{build_directory, Directory, Event};

const DATA_FILE_PREFIX: &str = "data_";
const MAX_BUILDING_CODE_LEN: usize = 32;
/// Snapshots kept in memory; evicted ones reload from their cache file
pub const MAX_LOADED_BUILDINGS: usize = 16;

/// Building codes end up in file names and regexes, so keep them plain
pub fn is_valid_building_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_BUILDING_CODE_LEN
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Events of one building together with the directory derived from them.
///
/// Never mutated; a refresh builds a new snapshot and swaps it in.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub building: String,
    pub events: Vec<Event>,
    pub directory: Directory,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(building: &str, events: Vec<Event>, fetched_at: DateTime<Utc>) -> Self {
        let directory = build_directory(&events, building);
        Snapshot {
            building: building.to_string(),
            events,
            directory,
            fetched_at,
        }
    }
}

/// Latest snapshot per building, mirrored to `data_<building>.json` files
#[derive(Debug)]
pub struct SnapshotStore {
    data_dir: PathBuf,
    snapshots: RwLock<HashMap<String, Arc<Snapshot>>>,
    refresh_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        SnapshotStore {
            data_dir: data_dir.as_ref().to_path_buf(),
            snapshots: RwLock::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn data_file(&self, building: &str) -> Result<PathBuf, CacheError> {
        if !is_valid_building_code(building) {
            return Err(CacheError::InvalidBuilding(building.to_string()));
        }
        Ok(self
            .data_dir
            .join(format!("{DATA_FILE_PREFIX}{building}.json")))
    }

    pub fn get(&self, building: &str) -> Option<Arc<Snapshot>> {
        self.snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(building)
            .cloned()
    }

    /// Buildings with a snapshot in memory, sorted
    pub fn buildings(&self) -> Vec<String> {
        let mut buildings: Vec<String> = self
            .snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        buildings.sort();
        buildings
    }

    /// Replaces the building's snapshot in one step.
    ///
    /// Past [`MAX_LOADED_BUILDINGS`] the least recently fetched other
    /// building is dropped from memory.
    pub fn insert(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        let mut snapshots = self
            .snapshots
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        snapshots.insert(snapshot.building.clone(), Arc::clone(&snapshot));

        while snapshots.len() > MAX_LOADED_BUILDINGS {
            let oldest = snapshots
                .values()
                .filter(|s| s.building != snapshot.building)
                .min_by_key(|s| s.fetched_at)
                .map(|s| s.building.clone());
            let Some(oldest) = oldest else {
                break;
            };
            snapshots.remove(&oldest);
            debug!(building = %oldest, "evicted timetable from memory");
        }
        snapshot
    }

    /// In-memory snapshot, else the one persisted by an earlier refresh
    pub async fn get_or_load(&self, building: &str) -> Result<Option<Arc<Snapshot>>, CacheError> {
        match self.get(building) {
            Some(snapshot) => Ok(Some(snapshot)),
            None => self.load_cached(building).await,
        }
    }

    /// Restores the snapshot persisted by an earlier run, if any
    pub async fn load_cached(&self, building: &str) -> Result<Option<Arc<Snapshot>>, CacheError> {
        let path = self.data_file(building)?;
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let events = parse_feed(&body)?;
        let fetched_at = tokio::fs::metadata(&path)
            .await?
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        info!(building, events = events.len(), path = %path.display(), "loaded cached timetable");
        Ok(Some(self.insert(Snapshot::new(building, events, fetched_at))))
    }

    async fn persist(&self, path: &Path, snapshot: &Snapshot) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        let body = serde_json::to_vec_pretty(&snapshot.events)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, path).await?;
        info!(building = %snapshot.building, path = %path.display(), "saved timetable");
        Ok(())
    }

    fn refresh_lock(&self, building: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .refresh_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(building.to_string()).or_default())
    }

    // Drops the building's lock once no other refresh holds or waits on it
    fn release_refresh_lock(&self, building: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self
            .refresh_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let idle = locks
            .get(building)
            .map_or(false, |held| Arc::ptr_eq(held, &lock) && Arc::strong_count(&lock) == 2);
        if idle {
            locks.remove(building);
        }
    }

    /// Fetches with `fetch`, persists and swaps in the new snapshot.
    ///
    /// Refreshes of one building run one at a time. A failed fetch keeps the
    /// previous snapshot and cache file; a failed write still serves the
    /// fetched data from memory.
    pub async fn refresh_with<F, Fut>(
        &self,
        building: &str,
        fetch: F,
    ) -> Result<Arc<Snapshot>, RefreshError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Vec<Event>, FetchError>>,
    {
        let path = self.data_file(building)?;
        let lock = self.refresh_lock(building);
        let guard = lock.lock().await;
        let result = self.refresh_locked(building, &path, fetch).await;
        drop(guard);
        self.release_refresh_lock(building, lock);
        result
    }

    async fn refresh_locked<F, Fut>(
        &self,
        building: &str,
        path: &Path,
        fetch: F,
    ) -> Result<Arc<Snapshot>, RefreshError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Vec<Event>, FetchError>>,
    {
        let events = match fetch(building.to_string()).await {
            Ok(events) => events,
            Err(err) => {
                warn!(building, error = %err, "timetable refresh failed, keeping previous data");
                return Err(err.into());
            }
        };

        let snapshot = Snapshot::new(building, events, Utc::now());
        if let Err(err) = self.persist(path, &snapshot).await {
            warn!(building, path = %path.display(), error = %err, "could not save timetable, serving it from memory");
        }
        info!(
            building,
            events = snapshot.events.len(),
            floors = snapshot.directory.floors.len(),
            "rebuilt room structure"
        );
        Ok(self.insert(snapshot))
    }

    pub async fn refresh(
        &self,
        building: &str,
        client: &TimetableClient,
    ) -> Result<Arc<Snapshot>, RefreshError> {
        self.refresh_with(building, |code| async move { client.fetch(&code).await })
            .await
    }
}
