// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use actix_web::cookie::{Cookie, SameSite};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use amtrak_board::auth::accounts::AccountsFile;
use amtrak_board::auth::sessions::{SESSION_COOKIE, Session, SessionStore};
use amtrak_board::board::overrides::Override;
use amtrak_board::board::{BoardRequest, BoardService, BoardType};
use amtrak_board::iso_date_to_key;
use amtrak_board::live_trains::{train_details, train_timeline};
use amtrak_board::preferences::{PreferenceStore, Preferences};
use amtrak_board::presentation::{ListView, SignageFrame};
use amtrak_board::realtime::feed::RawTrainFeed;
use amtrak_board::realtime::fetcher::RealtimeCache;
use amtrak_board::schedule::ScheduleStore;
use amtrak_board::schedule::loader::load_schedule_dir;
use amtrak_board::schedule_filtering::{
    RegionalSchedules, filter_realtime_stations, filter_realtime_trains,
};
use amtrak_board::station_detail::{DetailTab, station_detail};
use amtrak_board::station_status::{StationListView, list_station_status};
use amtrak_board::station_time::{Clock, local_date, resolve_station_time_zone};
use amtrak_board::trip_detail::trip_detail;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

pub struct AppState {
    pub data_dir: PathBuf,
    pub schedules: RwLock<Arc<RegionalSchedules>>,
    pub accounts: AccountsFile,
    pub sessions: SessionStore,
    pub boards: BoardService,
    pub preferences: PreferenceStore,
    pub realtime: Arc<RealtimeCache>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    fn schedule_for(&self, session: &Session) -> Arc<ScheduleStore> {
        match self.schedules.read() {
            Ok(schedules) => schedules.for_region(session.region()),
            Err(_) => Arc::new(ScheduleStore::default()),
        }
    }

    /// The cached train feed narrowed to the session's region.
    async fn live_feed_for(&self, session: &Session) -> Option<RawTrainFeed> {
        let feed = self.realtime.get().await?;
        Some(filter_realtime_trains((*feed).clone(), session.region()))
    }
}

pub type SharedState = web::Data<Arc<AppState>>;

fn json_error(mut builder: actix_web::HttpResponseBuilder, error: &str) -> HttpResponse {
    builder
        .insert_header(("Cache-Control", "no-store"))
        .json(json!({ "error": error }))
}

fn no_store_json(body: impl serde::Serialize) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header(("Cache-Control", "no-store"))
        .json(body)
}

fn current_session(state: &AppState, req: &HttpRequest) -> Option<Session> {
    let cookie = req.cookie(SESSION_COOKIE)?;
    state.sessions.get(cookie.value())
}

/// 401 without a live session, 403 when the session's routes do not cover `path`.
fn require_session(state: &AppState, req: &HttpRequest) -> Result<Session, HttpResponse> {
    let Some(session) = current_session(state, req) else {
        return Err(json_error(HttpResponse::Unauthorized(), "not_logged_in"));
    };

    if !session.is_authorized(req.path()) {
        return Err(json_error(HttpResponse::Forbidden(), "forbidden"));
    }

    Ok(session)
}

fn session_cookie(token: &str) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}

#[derive(Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

#[actix_web::post("/auth/login")]
pub async fn login(state: SharedState, body: web::Bytes) -> impl Responder {
    let Ok(credentials) = serde_json::from_slice::<LoginBody>(&body) else {
        return json_error(HttpResponse::BadRequest(), "bad_request");
    };

    let username = credentials.username.trim();

    match state.accounts.authenticate(username, &credentials.password) {
        Ok(Some(account)) => {
            let token = state.sessions.create(username, &account);
            info!("{} logged in", username);

            HttpResponse::Ok()
                .insert_header(("Cache-Control", "no-store"))
                .cookie(session_cookie(&token))
                .json(json!({
                    "ok": true,
                    "username": username,
                    "routes": account.routes,
                }))
        }
        Ok(None) => json_error(HttpResponse::Unauthorized(), "invalid_credentials"),
        Err(err) => {
            warn!("Could not read accounts: {}", err);
            json_error(HttpResponse::InternalServerError(), "accounts_unavailable")
        }
    }
}

#[actix_web::post("/auth/logout")]
pub async fn logout(state: SharedState, req: HttpRequest) -> impl Responder {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        state.sessions.destroy(cookie.value());
    }

    let mut removal = session_cookie("");
    removal.make_removal();

    HttpResponse::Ok()
        .insert_header(("Cache-Control", "no-store"))
        .cookie(removal)
        .json(json!({ "ok": true }))
}

#[actix_web::get("/auth/me")]
pub async fn me(state: SharedState, req: HttpRequest) -> impl Responder {
    match current_session(&state, &req) {
        Some(session) => no_store_json(json!({
            "ok": true,
            "username": session.username,
            "routes": session.routes,
            "filters": session.filters,
            "exp": session.expires_at.timestamp(),
        })),
        None => json_error(HttpResponse::Unauthorized(), "not_logged_in"),
    }
}

#[actix_web::get("/rt/ping")]
pub async fn ping() -> impl Responder {
    no_store_json(json!({ "ok": true }))
}

fn proxy_failed(err: impl std::fmt::Display) -> HttpResponse {
    warn!("Realtime proxy failed: {}", err);
    HttpResponse::BadGateway()
        .insert_header(("Cache-Control", "no-store"))
        .json(json!({ "error": "proxy_failed", "message": err.to_string() }))
}

#[actix_web::get("/rt/trains")]
pub async fn rt_trains(state: SharedState, req: HttpRequest) -> impl Responder {
    let session = match require_session(&state, &req) {
        Ok(session) => session,
        Err(response) => return response,
    };

    match state.realtime.fetcher().fetch_trains().await {
        Ok(feed) => no_store_json(filter_realtime_trains(feed, session.region())),
        Err(err) => proxy_failed(err),
    }
}

#[actix_web::get("/rt/stations")]
pub async fn rt_stations(state: SharedState, req: HttpRequest) -> impl Responder {
    let session = match require_session(&state, &req) {
        Ok(session) => session,
        Err(response) => return response,
    };

    match state.realtime.fetcher().fetch_stations().await {
        Ok(payload) => no_store_json(filter_realtime_stations(payload, session.region())),
        Err(err) => proxy_failed(err),
    }
}

#[actix_web::get("/data/{table}")]
pub async fn data_table(
    state: SharedState,
    req: HttpRequest,
    table: web::Path<String>,
) -> impl Responder {
    let session = match require_session(&state, &req) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let schedule = state.schedule_for(&session);

    match table.as_str() {
        "stops.json" => no_store_json(&schedule.stops),
        "tripmap.json" => no_store_json(&schedule.trips),
        "services_by_date.json" => no_store_json(&schedule.calendar),
        "stop_events.json" => no_store_json(&schedule.stop_events),
        _ => json_error(HttpResponse::NotFound(), "not_found"),
    }
}

#[actix_web::post("/data/reload")]
pub async fn reload_data(state: SharedState, req: HttpRequest) -> impl Responder {
    if let Err(response) = require_session(&state, &req) {
        return response;
    }

    let store = load_schedule_dir(&state.data_dir).await;
    let summary = json!({
        "ok": true,
        "stops": store.stops.len(),
        "trips": store.trips.len(),
        "dates": store.calendar.dates.len(),
    });

    let schedules = Arc::new(RegionalSchedules::new(store));

    match state.schedules.write() {
        Ok(mut current) => {
            *current = schedules;
            no_store_json(summary)
        }
        Err(_) => json_error(HttpResponse::InternalServerError(), "reload_failed"),
    }
}

fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>, HttpResponse> {
    match raw.map(str::trim).filter(|x| !x.is_empty()) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| json_error(HttpResponse::BadRequest(), "bad_date")),
    }
}

#[derive(Deserialize)]
pub struct BoardQuery {
    station: Option<String>,
    board: Option<String>,
    date: Option<String>,
    view: Option<String>,
    /// Viewport the signage canvas is fitted to.
    width: Option<f64>,
    height: Option<f64>,
}

#[actix_web::get("/board")]
pub async fn board(
    state: SharedState,
    req: HttpRequest,
    query: web::Query<BoardQuery>,
) -> impl Responder {
    let session = match require_session(&state, &req) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let schedule = state.schedule_for(&session);
    let prefs = state.preferences.load();

    let station = match query
        .station
        .as_deref()
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .or_else(|| prefs.station_or_default(&schedule))
    {
        Some(station) => station,
        None => return json_error(HttpResponse::NotFound(), "no_stations"),
    };

    let board_type = match query.board.as_deref() {
        Some(raw) => match raw.parse::<BoardType>() {
            Ok(board_type) => board_type,
            Err(_) => return json_error(HttpResponse::BadRequest(), "bad_board_type"),
        },
        None => prefs.board_type,
    };

    let date = match parse_date(query.date.as_deref().or(prefs.date_iso.as_deref())) {
        Ok(date) => date,
        Err(response) => return response,
    };

    let service_date = date.unwrap_or_else(|| {
        local_date(
            state.clock.now(),
            resolve_station_time_zone(schedule.stop(&station)),
        )
    });

    let request = BoardRequest {
        station: station.into(),
        board_type,
        service_date,
    };

    let rendered = state.boards.render(&schedule, &request).await;

    match query.view.as_deref() {
        Some("signage") => {
            let frame = SignageFrame::from_board(&rendered, &prefs.ticker);
            match (query.width, query.height) {
                (Some(width), Some(height)) => no_store_json(frame.fit_to(width, height)),
                _ => no_store_json(frame),
            }
        }
        _ => no_store_json(ListView::from_board(&rendered)),
    }
}

#[derive(Deserialize)]
pub struct StationsQuery {
    date: Option<String>,
    q: Option<String>,
    view: Option<StationListView>,
}

#[actix_web::get("/stations/status")]
pub async fn stations_status(
    state: SharedState,
    req: HttpRequest,
    query: web::Query<StationsQuery>,
) -> impl Responder {
    let session = match require_session(&state, &req) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let schedule = state.schedule_for(&session);
    let now = state.clock.now();

    let date = match parse_date(query.date.as_deref()) {
        Ok(date) => date.unwrap_or_else(|| local_date(now, resolve_station_time_zone(None))),
        Err(response) => return response,
    };

    let listing = list_station_status(
        &schedule,
        date,
        query.q.as_deref(),
        query.view.unwrap_or_default(),
        now,
    );

    no_store_json(json!({ "count": listing.len(), "stations": listing }))
}

#[derive(Deserialize)]
pub struct StationDetailQuery {
    date: Option<String>,
    tab: Option<DetailTab>,
    q: Option<String>,
}

#[actix_web::get("/stations/{code}")]
pub async fn get_station(
    state: SharedState,
    req: HttpRequest,
    code: web::Path<String>,
    query: web::Query<StationDetailQuery>,
) -> impl Responder {
    let session = match require_session(&state, &req) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let schedule = state.schedule_for(&session);
    let code = code.trim().to_ascii_uppercase();

    if schedule.stop(&code).is_none() {
        return json_error(HttpResponse::NotFound(), "unknown_station");
    }

    let now = state.clock.now();
    let date = match parse_date(query.date.as_deref()) {
        Ok(date) => date.unwrap_or_else(|| local_date(now, resolve_station_time_zone(schedule.stop(&code)))),
        Err(response) => return response,
    };

    no_store_json(station_detail(
        &schedule,
        &code,
        date,
        query.tab.unwrap_or_default(),
        query.q.as_deref(),
        now,
    ))
}

#[derive(Deserialize)]
pub struct TripQuery {
    station: String,
    date: Option<String>,
}

#[actix_web::get("/trips/{trip_id}")]
pub async fn get_trip(
    state: SharedState,
    req: HttpRequest,
    trip_id: web::Path<String>,
    query: web::Query<TripQuery>,
) -> impl Responder {
    let session = match require_session(&state, &req) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let schedule = state.schedule_for(&session);
    let now = state.clock.now();
    let station = query.station.trim().to_ascii_uppercase();

    let date = match parse_date(query.date.as_deref()) {
        Ok(date) => date.unwrap_or_else(|| local_date(now, resolve_station_time_zone(schedule.stop(&station)))),
        Err(response) => return response,
    };

    let feed = state.live_feed_for(&session).await;

    match trip_detail(&schedule, &station, trip_id.trim(), date, feed.as_ref(), now) {
        Some(detail) => no_store_json(detail),
        None => json_error(HttpResponse::NotFound(), "unknown_trip"),
    }
}

#[derive(Deserialize)]
pub struct TrainsQuery {
    q: Option<String>,
}

fn realtime_unavailable() -> HttpResponse {
    json_error(HttpResponse::BadGateway(), "realtime_unavailable")
}

#[actix_web::get("/trains")]
pub async fn get_trains(
    state: SharedState,
    req: HttpRequest,
    query: web::Query<TrainsQuery>,
) -> impl Responder {
    let session = match require_session(&state, &req) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let Some(feed) = state.live_feed_for(&session).await else {
        return realtime_unavailable();
    };

    let schedule = state.schedule_for(&session);
    let services = train_details(&schedule, &feed, query.q.as_deref(), state.clock.now());

    no_store_json(json!({ "count": services.len(), "services": services }))
}

#[actix_web::get("/trains/{number}")]
pub async fn get_train(
    state: SharedState,
    req: HttpRequest,
    number: web::Path<String>,
) -> impl Responder {
    let session = match require_session(&state, &req) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let Some(feed) = state.live_feed_for(&session).await else {
        return realtime_unavailable();
    };

    let schedule = state.schedule_for(&session);

    match train_timeline(&schedule, &feed, &number, state.clock.now()) {
        Some(timeline) => no_store_json(timeline),
        None => json_error(HttpResponse::NotFound(), "unknown_train"),
    }
}

#[actix_web::get("/overrides")]
pub async fn get_overrides(state: SharedState, req: HttpRequest) -> impl Responder {
    if let Err(response) = require_session(&state, &req) {
        return response;
    }

    no_store_json(state.boards.overrides().all())
}

#[derive(Deserialize)]
pub struct OverrideBody {
    date: String,
    station: String,
    trip: String,
    #[serde(flatten)]
    values: Override,
}

#[actix_web::put("/overrides")]
pub async fn put_override(
    state: SharedState,
    req: HttpRequest,
    body: web::Json<OverrideBody>,
) -> impl Responder {
    if let Err(response) = require_session(&state, &req) {
        return response;
    }

    let body = body.into_inner();
    let date_key = iso_date_to_key(body.date.trim());
    let station = body.station.trim().to_ascii_uppercase();

    match state
        .boards
        .overrides()
        .set(&date_key, &station, body.trip.trim(), body.values)
    {
        Ok(()) => no_store_json(json!({ "ok": true })),
        Err(err) => {
            warn!("Could not store override: {}", err);
            json_error(HttpResponse::InternalServerError(), "store_failed")
        }
    }
}

#[actix_web::get("/prefs")]
pub async fn get_prefs(state: SharedState, req: HttpRequest) -> impl Responder {
    if let Err(response) = require_session(&state, &req) {
        return response;
    }

    no_store_json(state.preferences.load())
}

#[actix_web::put("/prefs")]
pub async fn put_prefs(
    state: SharedState,
    req: HttpRequest,
    body: web::Json<Preferences>,
) -> impl Responder {
    if let Err(response) = require_session(&state, &req) {
        return response;
    }

    match state.preferences.save(&body) {
        Ok(()) => no_store_json(json!({ "ok": true })),
        Err(err) => {
            warn!("Could not store preferences: {}", err);
            json_error(HttpResponse::InternalServerError(), "store_failed")
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(login)
        .service(logout)
        .service(me)
        .service(ping)
        .service(rt_trains)
        .service(rt_stations)
        .service(reload_data)
        .service(data_table)
        .service(board)
        .service(stations_status)
        .service(get_station)
        .service(get_trip)
        .service(get_trains)
        .service(get_train)
        .service(get_overrides)
        .service(put_override)
        .service(get_prefs)
        .service(put_prefs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, test};
    use amtrak_board::auth::accounts::{Account, AccountFilters, Accounts, hash_password, write_accounts};
    use amtrak_board::board::overrides::OverrideStore;
    use amtrak_board::kv_store::MemoryStore;
    use amtrak_board::realtime::RealtimeError;
    use amtrak_board::realtime::feed::{RawTrainFeed, parse_train_feed};
    use amtrak_board::realtime::fetcher::RealtimeFetcher;
    use amtrak_board::station_time::FixedClock;
    use chrono::{TimeZone, Utc};
    use futures::future::BoxFuture;
    use serde_json::Value;

    struct StaticFetcher {
        trains: Option<Value>,
    }

    impl RealtimeFetcher for StaticFetcher {
        fn fetch_trains(&self) -> BoxFuture<'_, Result<RawTrainFeed, RealtimeError>> {
            let trains = self.trains.clone();
            Box::pin(async move {
                match trains {
                    Some(value) => parse_train_feed(value),
                    None => Err(RealtimeError::UpstreamStatus(503)),
                }
            })
        }

        fn fetch_stations(&self) -> BoxFuture<'_, Result<Value, RealtimeError>> {
            Box::pin(async { Ok(json!({"NYP": {"name": "New York"}, "CHI": {"name": "Chicago"}})) })
        }
    }

    fn schedule() -> ScheduleStore {
        ScheduleStore::from_json_tables(
            &json!({
                "NYP": {"n": "New York Penn", "lon": -73.99},
                "BOS": {"n": "Boston South Station", "lon": -71.05},
                "CHI": {"n": "Chicago Union Station", "lon": -87.64}
            }),
            &json!({
                "T1": {"svc": "WKD", "rl": "Acela", "ts": "2151", "hd": "Boston"},
                "T3": {"svc": "DAILY", "rl": "Lake Shore Limited", "ts": "49", "hd": "Chicago"}
            }),
            &json!({"20240601": ["WKD", "DAILY"]}),
            &json!({
                "NYP": [[null, 43200, "T1"], [null, 56100, "T3"]],
                "BOS": [[56000, null, "T1"]],
                "CHI": [[122000, null, "T3"]]
            }),
        )
    }

    fn state(trains: Option<Value>) -> Arc<AppState> {
        let accounts_path = std::env::temp_dir().join(format!(
            "amtrak-board-server-accounts-{}.json",
            uuid::Uuid::new_v4()
        ));

        let mut accounts = Accounts::new();
        accounts.insert(
            "ops".into(),
            Account {
                hash: hash_password("secret").unwrap(),
                routes: vec!["*".into()],
                filters: AccountFilters::default(),
            },
        );
        accounts.insert(
            "nec".into(),
            Account {
                hash: hash_password("secret").unwrap(),
                routes: vec!["/data/*".into(), "/rt/*".into()],
                filters: AccountFilters {
                    region: Some("nec".into()),
                },
            },
        );
        write_accounts(&accounts_path, &accounts).unwrap();

        // 11:50 in New York
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2024, 6, 1, 15, 50, 0).unwrap(),
        ));
        let kv = Arc::new(MemoryStore::new());
        let realtime = Arc::new(RealtimeCache::new(
            Arc::new(StaticFetcher { trains }),
            clock.clone(),
        ));

        Arc::new(AppState {
            data_dir: std::env::temp_dir(),
            schedules: RwLock::new(Arc::new(RegionalSchedules::new(schedule()))),
            accounts: AccountsFile::new(accounts_path),
            sessions: SessionStore::new(clock.clone()),
            boards: BoardService::new(
                OverrideStore::new(kv.clone()),
                Some(realtime.clone()),
                clock.clone(),
            ),
            preferences: PreferenceStore::new(kv),
            realtime,
            clock,
        })
    }

    fn login_request(username: &str) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({"username": username, "password": "secret"}))
    }

    fn session_from<B>(resp: &actix_web::dev::ServiceResponse<B>) -> Cookie<'static> {
        assert_eq!(resp.status(), 200);
        resp.response()
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .unwrap()
            .into_owned()
    }

    #[actix_web::test]
    async fn ping_is_public_and_board_is_not() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(None)))
                .configure(configure),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/rt/ping").to_request()).await;
        assert_eq!(resp.status(), 200);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/board").to_request()).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn login_rejects_bad_input() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(None)))
                .configure(configure),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/login")
                .set_payload("not json")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 400);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/login")
                .set_json(json!({"username": "ops", "password": "wrong"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn board_renders_for_logged_in_user() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(None)))
                .configure(configure),
        )
        .await;
        let resp = test::call_service(&app, login_request("ops").to_request()).await;
        let cookie = session_from(&resp);

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/board?station=nyp&board=departures&date=2024-06-01")
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;

        assert_eq!(body["title"], "Departures");
        assert_eq!(body["realtime_available"], false);
        assert_eq!(body["rows"][0]["time"], "12:00p");
        assert_eq!(body["rows"][0]["no"], "2151");
        assert_eq!(body["rows"][0]["status"], "Boarding");

        let me_body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/auth/me").cookie(cookie.clone()).to_request(),
        )
        .await;
        assert_eq!(me_body["username"], "ops");

        let frame: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/board?station=NYP&date=2024-06-01&view=signage&width=960&height=1080")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(frame["width"], 1920);
        assert_eq!(frame["scale"], 0.5);
        assert_eq!(frame["ticker_x"], 1920.0);
    }

    #[actix_web::test]
    async fn overrides_show_up_on_the_board() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(None)))
                .configure(configure),
        )
        .await;
        let resp = test::call_service(&app, login_request("ops").to_request()).await;
        let cookie = session_from(&resp);

        let resp = test::call_service(
            &app,
            test::TestRequest::put()
                .uri("/overrides")
                .cookie(cookie.clone())
                .set_json(json!({
                    "date": "2024-06-01",
                    "station": "NYP",
                    "trip": "T1",
                    "gate": "7W",
                    "track": "",
                    "status": ""
                }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/board?station=NYP&date=2024-06-01")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(body["rows"][0]["gate"], "7W");
        assert_eq!(body["rows"][0]["track"], "--");
    }

    #[actix_web::test]
    async fn region_filtered_data_and_route_permissions() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(None)))
                .configure(configure),
        )
        .await;
        let resp = test::call_service(&app, login_request("nec").to_request()).await;
        let cookie = session_from(&resp);

        let stops: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/data/stops.json")
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert!(stops.get("NYP").is_some());
        assert!(stops.get("CHI").is_none());

        let stations: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/rt/stations")
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert!(stations.get("CHI").is_none());

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/data/nope.json")
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 404);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/board").cookie(cookie).to_request(),
        )
        .await;
        assert_eq!(resp.status(), 403);
    }

    #[actix_web::test]
    async fn upstream_failure_is_bad_gateway() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(None)))
                .configure(configure),
        )
        .await;
        let resp = test::call_service(&app, login_request("ops").to_request()).await;
        let cookie = session_from(&resp);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/rt/trains").cookie(cookie).to_request(),
        )
        .await;
        assert_eq!(resp.status(), 502);
    }

    #[actix_web::test]
    async fn live_feed_hides_departed_train() {
        let feed = json!({
            "2151": [{"provider": "Amtrak", "stations": [{"code": "NYP", "status": "Departed"}]}]
        });
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(Some(feed))))
                .configure(configure),
        )
        .await;
        let resp = test::call_service(&app, login_request("ops").to_request()).await;
        let cookie = session_from(&resp);

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/board?station=NYP&date=2024-06-01")
                .cookie(cookie)
                .to_request(),
        )
        .await;

        assert_eq!(body["realtime_available"], true);
        assert_eq!(body["rows"].as_array().unwrap().len(), 1);
        assert_eq!(body["rows"][0]["no"], "49");
    }

    #[actix_web::test]
    async fn station_and_trip_pages_from_the_schedule() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(None)))
                .configure(configure),
        )
        .await;
        let resp = test::call_service(&app, login_request("ops").to_request()).await;
        let cookie = session_from(&resp);

        let station_body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/stations/nyp?date=2024-06-01&tab=all")
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(station_body["station_name"], "New York Penn");
        assert_eq!(station_body["count"], 2);
        assert_eq!(station_body["rows"][0]["time"], "12:00p");
        assert_eq!(station_body["rows"][0]["status"], "Scheduled");
        assert_eq!(station_body["rows"][1]["no"], "49");

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/stations/XYZ")
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 404);

        let trip_body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/trips/T1?station=NYP&date=2024-06-01")
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(trip_body["realtime"], false);
        assert_eq!(trip_body["train_number"], "2151");
        assert_eq!(trip_body["rows"][0]["schDep"], "12:00p");
        assert_eq!(trip_body["rows"][0]["status"], "Scheduled");

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/trips/NOPE?station=NYP")
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 404);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/trains").cookie(cookie).to_request(),
        )
        .await;
        assert_eq!(resp.status(), 502);
    }

    #[actix_web::test]
    async fn live_train_pages() {
        let feed = json!({
            "2151": [{
                "provider": "Amtrak",
                "routeName": "Acela",
                "stations": [
                    {"code": "NYP", "status": "Station",
                     "schDep": "2024-06-01T12:00:00-04:00", "dep": "2024-06-01T12:10:00-04:00"},
                    {"code": "BOS", "status": "Enroute", "schArr": "2024-06-01T15:33:00-04:00"}
                ]
            }]
        });
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(Some(feed))))
                .configure(configure),
        )
        .await;
        let resp = test::call_service(&app, login_request("ops").to_request()).await;
        let cookie = session_from(&resp);

        let services: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/trains").cookie(cookie.clone()).to_request(),
        )
        .await;
        assert_eq!(services["count"], 1);
        assert_eq!(services["services"][0]["label"], "Acela");
        assert_eq!(services["services"][0]["trains"][0]["num"], "2151");
        assert_eq!(services["services"][0]["trains"][0]["status"], "Now 12:10p");

        let timeline: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/trains/2151")
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(timeline["past"].as_array().unwrap().len(), 0);
        assert_eq!(timeline["planned"][0]["name"], "New York Penn");
        assert_eq!(timeline["planned"][1]["event"], "Enroute");

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/trains/999")
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 404);

        let trip_body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/trips/T1?station=NYP&date=2024-06-01")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(trip_body["realtime"], true);
        assert_eq!(trip_body["rows"][0]["dep"], "12:10p");
        assert_eq!(trip_body["rows"][1]["name"], "Boston South Station");

        let resp = test::call_service(&app, login_request("nec").to_request()).await;
        let nec_cookie = session_from(&resp);
        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/trains").cookie(nec_cookie).to_request(),
        )
        .await;
        assert_eq!(resp.status(), 403);
    }
}
