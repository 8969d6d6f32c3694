use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use aviapp::{
    media_content_present, AnnouncementSettings, AnnouncementTask, Navigator, ReplaySource,
    RouteStore, TrackLog, YamlRouteStore,
};
use aviconfig::get_config;
use avigeo::{GeofenceEngine, RouteHandle};
use aviplayer::{AnnouncementController, AudioDriver, NullDriver, PlayerProcessDriver};
use avitask::PeriodicTask;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = get_config();
    info!(dir = %config.config_dir().display(), "configuration loaded");

    // ========== Route data ==========

    let store = YamlRouteStore::new(config.routes_db_path()?);

    let route_id = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<i32>()
            .with_context(|| format!("invalid route id argument '{arg}'"))?,
        None => match config.selected_route() {
            Some(id) => id,
            None => {
                let available = store.available_routes().unwrap_or_default();
                for (id, name) in &available {
                    info!(id, name, "available route");
                }
                bail!("no route selected: pass a route id or set routes.selected");
            }
        },
    };

    let route = Arc::new(store.load(route_id)?);
    let media_dir = config.media_dir()?;
    if !media_content_present(&route, &media_dir) {
        warn!(route_id, "some announcement files are missing, playback of those frames will fail");
    }

    let handle = Arc::new(RouteHandle::with_route(route));

    // ========== Audio ==========

    let driver: Arc<dyn AudioDriver> = match config.audio_driver().as_str() {
        "process" => Arc::new(PlayerProcessDriver::new(config.audio_player_command())),
        "null" => Arc::new(NullDriver::new(Duration::from_millis(
            config.audio_null_duration_ms(),
        ))),
        other => bail!("unknown audio.driver '{other}' (expected 'null' or 'process')"),
    };

    let controller = Arc::new(AnnouncementController::new(
        Arc::clone(&driver),
        Arc::clone(&handle),
        media_dir,
    )?);

    // ========== Position feed ==========

    let Some(replay) = config.replay_path() else {
        bail!("no position source: set gps.replay_path to a recorded track file");
    };
    let source = Arc::new(ReplaySource::from_file(&replay)?);
    info!(file = %replay.display(), fixes = source.len(), "replaying recorded track");

    let navigator = Arc::new(Navigator::new(TrackLog::for_route(
        &config.track_path()?,
        route_id,
    )));

    // ========== Announcement loop ==========

    let task_body = AnnouncementTask::new(
        source,
        Arc::new(GeofenceEngine::new(Arc::clone(&handle))),
        Arc::clone(&controller),
        navigator,
        AnnouncementSettings {
            min_valid_speed_kmh: config.gps_min_valid_speed_kmh(),
            valid_threshold: config.gps_valid_threshold() as u32,
        },
    );

    let mut task = PeriodicTask::new("announce", task_body);
    task.set_period_with_tick(
        Duration::from_millis(config.gps_poll_period_ms()),
        Duration::from_millis(config.gps_tick_ms()),
    );
    task.start(true)?;

    let stop = task.handle();
    ctrlc::set_handler(move || {
        info!("shutdown requested");
        stop.stop();
    })
    .context("failed to install the Ctrl-C handler")?;

    info!(route_id, "announcement service running, press Ctrl+C to stop");
    task.wait();
    controller.shutdown();
    info!("bye");

    Ok(())
}
