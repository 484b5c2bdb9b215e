use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use actix_files::{Files, NamedFile};
use actix_session::config::PersistentSession;
use actix_session::storage::CookieSessionStore;
use actix_session::{Session, SessionMiddleware};
use actix_web::cookie::{time, Key};
use actix_web::{middleware, web, App, HttpResponse, HttpServer, Result};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::{is_valid_building_code, Snapshot, SnapshotStore};
use crate::config::ServeArgs;
use crate::error::{ApiError, CacheError, FetchError};
use crate::fetch::TimetableClient;
use crate::schedule::{
    availability, query_moment, room_events, schedule_by_room, Event, Page, RoomFilter,
    RoomSchedule, Slot, TimeOfDay, WorkingWindow,
};

const SESSION_BUILDING_KEY: &str = "currentBuilding";
const MAX_PAGE_SIZE: usize = 100;
const MIN_SESSION_KEY_LEN: usize = 32;

/// Shared server state; snapshots are swapped in by refreshes
pub struct AppState {
    pub store: SnapshotStore,
    pub client: TimetableClient,
    pub campus: String,
    pub public_dir: PathBuf,
    pub window: WorkingWindow,
    pub page_size: usize,
    active_building: RwLock<String>,
}

impl AppState {
    pub fn from_args(args: &ServeArgs, window: WorkingWindow) -> Result<Self, FetchError> {
        Ok(AppState {
            store: SnapshotStore::new(&args.data_dir),
            client: TimetableClient::new(&args.upstream_url, args.fetch_timeout())?,
            campus: args.campus.clone(),
            public_dir: args.public_dir.clone(),
            window,
            page_size: args.page_size.clamp(1, MAX_PAGE_SIZE),
            active_building: RwLock::new(args.building.clone()),
        })
    }

    /// Building used when a request names none and its session has none
    pub fn active_building(&self) -> String {
        self.active_building
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_active_building(&self, building: &str) {
        *self
            .active_building
            .write()
            .unwrap_or_else(PoisonError::into_inner) = building.to_string();
    }

    /// Query string first, then the visitor's session, then the server default
    fn resolve_building(&self, requested: Option<&str>, session: &Session) -> String {
        requested
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .or_else(|| session.get::<String>(SESSION_BUILDING_KEY).ok().flatten())
            .unwrap_or_else(|| self.active_building())
    }

    /// Snapshot from memory or, after a restart, from the building's cache file
    async fn snapshot(&self, building: &str) -> Result<Arc<Snapshot>, ApiError> {
        match self.store.get_or_load(building).await {
            Ok(Some(snapshot)) => Ok(snapshot),
            Ok(None) => Err(ApiError::NoData(building.to_string())),
            Err(CacheError::InvalidBuilding(code)) => {
                Err(ApiError::BadRequest(format!("Invalid building {code:?}")))
            }
            Err(err) => {
                warn!(building, error = %err, "could not read cached timetable");
                Err(ApiError::NoData(building.to_string()))
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBuildingRequest {
    building_code: Option<String>,
}

#[derive(Deserialize)]
pub struct BuildingQuery {
    building: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeRoomsQuery {
    building: Option<String>,
    date: Option<String>,
    time: Option<String>,
    floor: Option<String>,
    room: Option<String>,
    #[serde(default)]
    now_offset: usize,
    #[serde(default)]
    soon_offset: usize,
    limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeRoomsResponse {
    building: String,
    date: NaiveDate,
    time: TimeOfDay,
    free_now: Page<Slot>,
    free_soon: Page<Slot>,
}

#[derive(Deserialize)]
pub struct RoomEventsQuery {
    building: Option<String>,
    code: Option<String>,
    date: Option<String>,
}

#[derive(Serialize)]
pub struct RoomEventsResponse<'a> {
    room: String,
    date: NaiveDate,
    events: Vec<&'a Event>,
}

#[derive(Deserialize)]
pub struct ScheduleQuery {
    building: Option<String>,
    date: Option<String>,
    floor: Option<String>,
    room: Option<String>,
}

#[derive(Serialize)]
pub struct ScheduleResponse<'a> {
    building: String,
    date: NaiveDate,
    rooms: Vec<RoomSchedule<'a>>,
}

fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match raw.map(str::trim).filter(|d| !d.is_empty()) {
        Some(d) => d
            .parse()
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("Invalid date {d:?}, expected YYYY-MM-DD"))),
        None => Ok(None),
    }
}

fn parse_time(raw: Option<&str>) -> Result<Option<TimeOfDay>, ApiError> {
    match raw.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => t
            .parse()
            .map(Some)
            .map_err(|err| ApiError::BadRequest(format!("{err}"))),
        None => Ok(None),
    }
}

// Index page for visitors who picked a building, onboarding otherwise
async fn index(session: Session, state: web::Data<AppState>) -> Result<NamedFile> {
    let chosen = session
        .get::<String>(SESSION_BUILDING_KEY)
        .ok()
        .flatten()
        .is_some();
    let page = if chosen { "index.html" } else { "onboarding.html" };
    Ok(NamedFile::open_async(state.public_dir.join(page)).await?)
}

// Building selection from the onboarding page
async fn set_building(
    req: web::Json<SetBuildingRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let code = req
        .building_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing buildingCode".to_string()))?;
    if !is_valid_building_code(code) {
        return Err(ApiError::BadRequest(format!("Invalid buildingCode {code:?}")).into());
    }

    state.set_active_building(code);
    session.insert(SESSION_BUILDING_KEY, code)?;
    info!(building = code, "building selected");

    state
        .store
        .refresh(code, &state.client)
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": format!("Building set to {code}") })))
}

async fn current_selection_info(session: Session, state: web::Data<AppState>) -> Result<HttpResponse> {
    let building = state.resolve_building(None, &session);
    let fetched_at = state.store.get(&building).map(|s| s.fetched_at);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "campus": state.campus,
        "building": building,
        "fetchedAt": fetched_at,
    })))
}

// Cached events of a building
async fn get_rooms(
    query: web::Query<BuildingQuery>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let building = state.resolve_building(query.building.as_deref(), &session);
    let snapshot = state.snapshot(&building).await?;
    if snapshot.events.is_empty() {
        return Err(ApiError::NoData(building).into());
    }
    Ok(HttpResponse::Ok().json(&snapshot.events))
}

// Floors and rooms derived from the cached events
async fn get_structure(
    query: web::Query<BuildingQuery>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let building = state.resolve_building(query.building.as_deref(), &session);
    let snapshot = state
        .snapshot(&building)
        .await
        .ok()
        .filter(|s| !s.directory.is_empty())
        .ok_or_else(|| ApiError::NoStructure(building.clone()))?;
    Ok(HttpResponse::Ok().json(&snapshot.directory))
}

// Free-now and free-soon pages for a date and time
async fn get_free_rooms(
    query: web::Query<FreeRoomsQuery>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let building = state.resolve_building(query.building.as_deref(), &session);
    let snapshot = state.snapshot(&building).await?;

    let (date, time) = query_moment(
        Local::now().naive_local(),
        parse_date(query.date.as_deref())?,
        parse_time(query.time.as_deref())?,
        &state.window,
    );
    let filter = RoomFilter::new(query.floor.clone(), query.room.clone());
    let limit = query
        .limit
        .filter(|&l| l > 0)
        .unwrap_or(state.page_size)
        .min(MAX_PAGE_SIZE);

    let view = availability(
        &snapshot.directory,
        &snapshot.events,
        date,
        time,
        &filter,
        &state.window,
    );

    Ok(HttpResponse::Ok().json(FreeRoomsResponse {
        building,
        date,
        time,
        free_now: Page::after(&view.free_now, query.now_offset, limit),
        free_soon: Page::after(&view.free_soon, query.soon_offset, limit),
    }))
}

// All events of one room on a date, for the slot detail view
async fn get_room_events(
    query: web::Query<RoomEventsQuery>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let building = state.resolve_building(query.building.as_deref(), &session);
    let code = query
        .code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing code".to_string()))?;
    let snapshot = state.snapshot(&building).await?;
    let (date, _) = query_moment(
        Local::now().naive_local(),
        parse_date(query.date.as_deref())?,
        None,
        &state.window,
    );

    Ok(HttpResponse::Ok().json(RoomEventsResponse {
        room: code.to_string(),
        date,
        events: room_events(&snapshot.events, &building, code, date),
    }))
}

// Day schedule grouped by room
async fn get_schedule(
    query: web::Query<ScheduleQuery>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let building = state.resolve_building(query.building.as_deref(), &session);
    let snapshot = state.snapshot(&building).await?;
    let (date, _) = query_moment(
        Local::now().naive_local(),
        parse_date(query.date.as_deref())?,
        None,
        &state.window,
    );
    let filter = RoomFilter::new(query.floor.clone(), query.room.clone());
    let rooms = schedule_by_room(&snapshot.events, &building, date, &filter);

    Ok(HttpResponse::Ok().json(ScheduleResponse {
        building,
        date,
        rooms,
    }))
}

/// Page and API routes; static files are mounted separately
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/api/set-building", web::post().to(set_building))
        .route("/api/current-selection-info", web::get().to(current_selection_info))
        .route("/api/rooms", web::get().to(get_rooms))
        .route("/api/structure", web::get().to(get_structure))
        .route("/api/free-rooms", web::get().to(get_free_rooms))
        .route("/api/room-events", web::get().to(get_room_events))
        .route("/api/schedule", web::get().to(get_schedule));
}

/// Cookie-backed session holding the visitor's building choice
pub fn session_middleware(key: Key) -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_secure(false)
        .session_lifecycle(PersistentSession::default().session_ttl(time::Duration::days(365)))
        .build()
}

/// Signing key from the configured secret, or a random one for this process
pub fn session_key(secret: Option<&str>) -> Key {
    match secret {
        Some(secret) if secret.len() >= MIN_SESSION_KEY_LEN => Key::derive_from(secret.as_bytes()),
        Some(_) => {
            warn!("SESSION_KEY shorter than {MIN_SESSION_KEY_LEN} bytes, using a random key");
            Key::generate()
        }
        None => Key::generate(),
    }
}

/// Refreshes the active building and every building held in memory now,
/// then every `interval`
pub fn spawn_refresh_loop(
    state: web::Data<AppState>,
    interval: Option<Duration>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let active = state.active_building();
            let mut buildings = state.store.buildings();
            buildings.retain(|b| *b != active);
            buildings.insert(0, active);

            for building in buildings {
                if let Err(err) = state.store.refresh(&building, &state.client).await {
                    warn!(building = %building, error = %err, "scheduled refresh failed");
                }
            }

            let Some(period) = interval else {
                break;
            };
            tokio::time::sleep(period).await;
        }
    })
}

pub async fn start_server(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let window = args.window.window()?;
    std::fs::create_dir_all(&args.public_dir)?;

    let state = web::Data::new(AppState::from_args(&args, window)?);
    let building = state.active_building();
    if let Err(err) = state.store.load_cached(&building).await {
        warn!(building, error = %err, "could not read cached timetable");
    }
    spawn_refresh_loop(state.clone(), args.refresh_interval());

    let key = session_key(args.session_key.as_deref());
    let public_dir = args.public_dir.clone();
    info!(port = args.port, building, "listening on http://localhost:{}", args.port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(session_middleware(key.clone()))
            .wrap(middleware::Logger::default())
            .configure(routes)
            .service(Files::new("/", &public_dir))
    })
    .bind(("0.0.0.0", args.port))?
    .run()
    .await?;

    Ok(())
}
