// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

// Larch serves and prints Amtrak station departure and arrival boards

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use amtrak_board::auth::accounts::AccountsFile;
use amtrak_board::auth::sessions::SessionStore;
use amtrak_board::board::overrides::OverrideStore;
use amtrak_board::board::{BoardRequest, BoardService, BoardType};
use amtrak_board::kv_store::{JsonFileStore, KeyValueStore, MemoryStore};
use amtrak_board::preferences::PreferenceStore;
use amtrak_board::presentation::{ListView, SignageFrame, ticker_text_width};
use amtrak_board::realtime::fetcher::{
    DEFAULT_REALTIME_UPSTREAM, HttpRealtimeFetcher, RealtimeCache,
};
use amtrak_board::schedule::loader::load_schedule_dir;
use amtrak_board::schedule_filtering::{Region, RegionalSchedules, apply_region_filter};
use amtrak_board::station_status::{StationListView, list_station_status};
use amtrak_board::station_time::{
    Clock, FixedClock, SystemClock, instant_from_service_seconds, local_date,
    resolve_station_time_zone,
};
use anyhow::{Context, anyhow};
use chrono::{NaiveDate, NaiveTime, Timelike};
use clap::Parser;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::info;

mod server;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding stops.json, tripmap.json, services_by_date.json and stop_events.json
    #[arg(long, env = "DATA_DIR", default_value = "data", global = true)]
    data_dir: PathBuf,
    /// JSON file for overrides and preferences. Kept in memory when unset.
    #[arg(long, env = "STORE_FILE", global = true)]
    store_file: Option<PathBuf>,
    #[arg(long, env = "REALTIME_UPSTREAM", default_value = DEFAULT_REALTIME_UPSTREAM, global = true)]
    realtime_upstream: String,
    #[arg(long, env = "REALTIME_TIMEOUT_SECS", global = true)]
    realtime_timeout_secs: Option<u64>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Serve boards, the realtime proxy and the schedule tables over HTTP
    Serve {
        #[arg(short, long, env = "BIND_ADDRESS", default_value = "127.0.0.1")]
        address: String,
        #[arg(short, long, env = "PORT", default_value_t = 8080)]
        port: u16,
        #[arg(long, env = "ACCOUNTS_FILE", default_value = "accounts.json")]
        accounts: PathBuf,
    },
    /// Print one board
    Board {
        /// Station code, e.g. NYP. Falls back to the saved preference.
        #[arg(short, long)]
        station: Option<String>,
        /// departures or arrivals
        #[arg(short, long)]
        board: Option<BoardType>,
        /// Service date as YYYY-MM-DD. Defaults to today at the station.
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// Pretend the station clock reads HH:MM on the service date
        #[arg(long)]
        at: Option<NaiveTime>,
        #[arg(long)]
        region: Option<Region>,
        #[arg(long)]
        no_realtime: bool,
        /// Print the fixed-canvas signage frame as JSON
        #[arg(long)]
        signage: bool,
        #[arg(long)]
        ticker: Option<String>,
        /// Fit the signage canvas to a WIDTHxHEIGHT viewport, e.g. 1280x720
        #[arg(long, value_parser = parse_viewport)]
        viewport: Option<(f64, f64)>,
        /// Animation frames to run the ticker before printing
        #[arg(long, default_value_t = 0)]
        ticker_frames: u32,
    },
    /// Print per-station counts and the next train
    Stations {
        #[arg(short, long)]
        date: Option<NaiveDate>,
        #[arg(short, long)]
        query: Option<String>,
        #[arg(long)]
        has_trains: bool,
        #[arg(long)]
        region: Option<Region>,
    },
}

fn parse_viewport(raw: &str) -> Result<(f64, f64), String> {
    let (width, height) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", raw))?;
    let width: f64 = width.trim().parse().map_err(|_| format!("bad width in '{}'", raw))?;
    let height: f64 = height.trim().parse().map_err(|_| format!("bad height in '{}'", raw))?;
    Ok((width, height))
}

fn open_store(path: Option<&PathBuf>) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    match path {
        Some(path) => {
            let store = JsonFileStore::open(path)
                .with_context(|| format!("opening store file {}", path.display()))?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryStore::new())),
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    let kv = open_store(args.store_file.as_ref())?;
    let fetcher = Arc::new(HttpRealtimeFetcher::new(
        &args.realtime_upstream,
        args.realtime_timeout_secs.map(Duration::from_secs),
    )?);

    let schedule = load_schedule_dir(&args.data_dir).await;

    match args.cmd {
        Command::Serve {
            address,
            port,
            accounts,
        } => {
            let clock: Arc<dyn Clock> = Arc::new(SystemClock);
            let realtime = Arc::new(RealtimeCache::new(fetcher, clock.clone()));

            let state = Arc::new(server::AppState {
                data_dir: args.data_dir,
                schedules: RwLock::new(Arc::new(RegionalSchedules::new(schedule))),
                accounts: AccountsFile::new(accounts),
                sessions: SessionStore::new(clock.clone()),
                boards: BoardService::new(
                    OverrideStore::new(kv.clone()),
                    Some(realtime.clone()),
                    clock.clone(),
                ),
                preferences: PreferenceStore::new(kv),
                realtime,
                clock,
            });

            info!("Starting board server on {}:{}", address, port);

            HttpServer::new(move || {
                App::new()
                    .wrap(Cors::permissive())
                    .wrap(middleware::Logger::default())
                    .app_data(web::Data::new(Arc::clone(&state)))
                    .configure(server::configure)
            })
            .workers(4)
            .bind((address, port))?
            .run()
            .await?;
        }
        Command::Board {
            station,
            board,
            date,
            at,
            region,
            no_realtime,
            signage,
            ticker,
            viewport,
            ticker_frames,
        } => {
            let schedule = apply_region_filter(schedule, region);
            let preferences = PreferenceStore::new(kv.clone()).load();

            let station = station
                .map(|s| s.trim().to_ascii_uppercase())
                .filter(|s| !s.is_empty())
                .or_else(|| preferences.station_or_default(&schedule))
                .ok_or_else(|| anyhow!("no stations in {}", args.data_dir.display()))?;

            let tz = resolve_station_time_zone(schedule.stop(&station));
            let service_date = match date {
                Some(date) => date,
                None => local_date(SystemClock.now(), tz),
            };

            let clock: Arc<dyn Clock> = match at {
                Some(at) => Arc::new(FixedClock(instant_from_service_seconds(
                    service_date,
                    at.num_seconds_from_midnight(),
                    tz,
                ))),
                None => Arc::new(SystemClock),
            };

            let realtime = (!no_realtime)
                .then(|| Arc::new(RealtimeCache::new(fetcher, clock.clone())));
            let boards = BoardService::new(OverrideStore::new(kv), realtime, clock);

            let request = BoardRequest {
                station: station.into(),
                board_type: board.unwrap_or(preferences.board_type),
                service_date,
            };

            let rendered = boards.render(&schedule, &request).await;

            if signage {
                let ticker = ticker.unwrap_or(preferences.ticker);
                let mut frame = SignageFrame::from_board(&rendered, &ticker);
                if let Some((width, height)) = viewport {
                    frame = frame.fit_to(width, height);
                }
                frame.advance_ticker(ticker_frames, ticker_text_width(&ticker));
                println!("{}", serde_json::to_string_pretty(&frame)?);
            } else {
                print!("{}", ListView::from_board(&rendered).to_text());
            }
        }
        Command::Stations {
            date,
            query,
            has_trains,
            region,
        } => {
            let schedule = apply_region_filter(schedule, region);
            let now = SystemClock.now();
            let date = date.unwrap_or_else(|| local_date(now, resolve_station_time_zone(None)));
            let view = if has_trains {
                StationListView::HasTrains
            } else {
                StationListView::All
            };

            for status in list_station_status(&schedule, date, query.as_deref(), view, now) {
                println!(
                    "{:<5} {:<40} {:>4} dep {:>4} arr   {}",
                    status.code, status.name, status.departures, status.arrivals, status.next_event
                );
            }
        }
    }

    Ok(())
}
