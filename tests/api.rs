use std::path::Path;

use actix_web::cookie::Key;
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use chrono::Utc;
use serde_json::{json, Value};

use freespace::cache::Snapshot;
use freespace::config::{Cli, Command};
use freespace::schedule::Event;
use freespace::web::{routes, session_middleware, AppState};

use clap::Parser;

fn app_state(public_dir: &Path, data_dir: &Path) -> web::Data<AppState> {
    let cli = Cli::try_parse_from([
        "freespace",
        "web",
        "--building",
        "AP152",
        "--public-dir",
        public_dir.to_str().unwrap(),
        "--data-dir",
        data_dir.to_str().unwrap(),
        "--upstream-url",
        "http://127.0.0.1:9/feed?q={building}",
        "--fetch-timeout-secs",
        "2",
        "--page-size",
        "5",
    ])
    .unwrap();
    let Command::Web(args) = cli.command else {
        panic!("expected web command");
    };
    let window = args.window.window().unwrap();
    web::Data::new(AppState::from_args(&args, window).unwrap())
}

fn sample_events() -> Vec<Event> {
    serde_json::from_value(json!([
        {
            "title": "Lecture AP152.02.101a",
            "start": "2024-05-01T09:00:00",
            "end": "2024-05-01T10:00:00",
            "color": "#3366ff"
        },
        {
            "title": "Seminar",
            "className": ["AP152.02.102"],
            "start": "2024-05-02T09:00:00",
            "end": "2024-05-02T12:00:00"
        }
    ]))
    .unwrap()
}

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .wrap(session_middleware(Key::generate()))
                .configure(routes),
        )
        .await
    };
}

#[actix_web::test]
async fn serves_structure_and_events() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(dir.path(), dir.path());
    state
        .store
        .insert(Snapshot::new("AP152", sample_events(), Utc::now()));
    let app = init_app!(state);

    let req = test::TestRequest::get().uri("/api/structure").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        body,
        json!({"building": "AP152", "floors": {"02": ["101a", "102"]}})
    );

    let req = test::TestRequest::get().uri("/api/rooms?building=AP152").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[1]["className"], json!(["AP152.02.102"]));
}

#[actix_web::test]
async fn unknown_building_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(dir.path(), dir.path());
    let app = init_app!(state);

    let req = test::TestRequest::get().uri("/api/rooms?building=XY1").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "No data for XY1");

    let req = test::TestRequest::get().uri("/api/structure").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "No structure for AP152");
}

#[actix_web::test]
async fn lists_free_rooms_with_pages() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(dir.path(), dir.path());
    state
        .store
        .insert(Snapshot::new("AP152", sample_events(), Utc::now()));
    let app = init_app!(state);

    let req = test::TestRequest::get()
        .uri("/api/free-rooms?date=2024-05-01&time=08:30")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["date"], "2024-05-01");
    assert_eq!(body["time"], "08:30");
    assert_eq!(
        body["freeNow"]["items"],
        json!([
            {"roomCode": "AP152.02.102", "start": "08:30", "end": "18:15", "durationMinutes": 585},
            {"roomCode": "AP152.02.101a", "start": "08:30", "end": "09:00", "durationMinutes": 30}
        ])
    );
    assert_eq!(body["freeNow"]["hasMore"], false);
    assert_eq!(
        body["freeSoon"]["items"],
        json!([
            {"roomCode": "AP152.02.101a", "start": "10:00", "end": "18:15", "durationMinutes": 495}
        ])
    );

    let req = test::TestRequest::get()
        .uri("/api/free-rooms?date=2024-05-01&time=08:30&limit=1&nowOffset=1")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["freeNow"]["items"][0]["roomCode"], "AP152.02.101a");
    assert_eq!(body["freeNow"]["revealed"], 2);
    assert_eq!(body["freeNow"]["total"], 2);
    assert_eq!(body["freeNow"]["hasMore"], false);

    let req = test::TestRequest::get()
        .uri("/api/free-rooms?date=2024-05-01&time=08:30&floor=02&room=102")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["freeNow"]["total"], 1);
    assert_eq!(body["freeSoon"]["total"], 0);
}

#[actix_web::test]
async fn rejects_malformed_query_values() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(dir.path(), dir.path());
    state
        .store
        .insert(Snapshot::new("AP152", sample_events(), Utc::now()));
    let app = init_app!(state);

    for uri in [
        "/api/free-rooms?date=01.05.2024",
        "/api/free-rooms?date=2024-05-01&time=25:00",
        "/api/room-events?date=2024-05-01",
    ] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[actix_web::test]
async fn shows_room_events_and_day_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(dir.path(), dir.path());
    state
        .store
        .insert(Snapshot::new("AP152", sample_events(), Utc::now()));
    let app = init_app!(state);

    let req = test::TestRequest::get()
        .uri("/api/room-events?code=AP152.02.102&date=2024-05-02")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["room"], "AP152.02.102");
    assert_eq!(body["events"].as_array().unwrap().len(), 1);
    assert_eq!(body["events"][0]["title"], "Seminar");

    let req = test::TestRequest::get()
        .uri("/api/schedule?date=2024-05-01")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["rooms"].as_array().unwrap().len(), 1);
    assert_eq!(body["rooms"][0]["roomCode"], "AP152.02.101a");
    assert_eq!(body["rooms"][0]["color"], "#3366ff");
}

#[actix_web::test]
async fn set_building_validates_input() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(dir.path(), dir.path());
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/set-building")
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Missing buildingCode");

    let req = test::TestRequest::post()
        .uri("/api/set-building")
        .set_json(json!({"buildingCode": "../etc"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.active_building(), "AP152");
}

#[actix_web::test]
async fn failed_refresh_keeps_cached_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(dir.path(), dir.path());
    state
        .store
        .insert(Snapshot::new("EW1", sample_events(), Utc::now()));
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/set-building")
        .set_json(json!({"buildingCode": "EW1"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(state.active_building(), "EW1");
    assert_eq!(state.store.get("EW1").unwrap().events.len(), 2);

    let req = test::TestRequest::get()
        .uri("/api/current-selection-info")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["campus"], "FH JOANNEUM Graz");
    assert_eq!(body["building"], "EW1");
    assert!(body["fetchedAt"].is_string());
}

#[actix_web::test]
async fn reads_cache_file_of_building_not_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    let feed = json!([
        {
            "title": "Lab EW1.01.010",
            "start": "2024-05-01T09:00:00",
            "end": "2024-05-01T10:00:00"
        }
    ]);
    std::fs::write(dir.path().join("data_EW1.json"), feed.to_string()).unwrap();
    let state = app_state(dir.path(), dir.path());
    let app = init_app!(state);
    assert!(state.store.get("EW1").is_none());

    let req = test::TestRequest::get()
        .uri("/api/structure?building=EW1")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"building": "EW1", "floors": {"01": ["010"]}}));

    let req = test::TestRequest::get()
        .uri("/api/free-rooms?building=EW1&date=2024-05-01&time=09:30")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["freeNow"]["total"], 0);
    assert_eq!(body["freeSoon"]["items"][0]["roomCode"], "EW1.01.010");
    assert_eq!(body["freeSoon"]["items"][0]["start"], "10:00");

    let req = test::TestRequest::get()
        .uri("/api/rooms?building=../etc")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn new_visitors_get_onboarding_page() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("onboarding.html"), "<h1>Pick a building</h1>").unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>Schedule</h1>").unwrap();
    let state = app_state(dir.path(), dir.path());
    let app = init_app!(state);

    let req = test::TestRequest::get().uri("/").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, "<h1>Pick a building</h1>".as_bytes());
}
