use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use avigeo::{CourseMask, Frame, GeofenceEngine, GpsFix, MediaInfo, Mode, Route, RouteHandle, Zone};
use aviplayer::{AnnouncementController, AudioDriver, StoppedCallback};
use avitask::{Signal, TaskBody, TaskContext};

use aviapp::{
    AnnouncementSettings, AnnouncementTask, Navigator, PositionSource, TrackLog,
};

/// Driver that records every played path without producing sound.
struct MockDriver {
    played: Mutex<Vec<PathBuf>>,
    playing: AtomicBool,
    callback: Mutex<Option<StoppedCallback>>,
}

impl MockDriver {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            played: Mutex::new(Vec::new()),
            playing: AtomicBool::new(false),
            callback: Mutex::new(None),
        })
    }

    fn played(&self) -> Vec<PathBuf> {
        self.played.lock().unwrap().clone()
    }

    /// Simulate the current item reaching its natural end.
    fn finish(&self) {
        self.playing.store(false, Ordering::SeqCst);
        if let Some(cb) = self.callback.lock().unwrap().as_ref() {
            cb();
        }
    }
}

impl AudioDriver for MockDriver {
    fn play(&self, path: &Path) -> aviplayer::Result<()> {
        self.played.lock().unwrap().push(path.to_path_buf());
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        if self.playing.swap(false, Ordering::SeqCst) {
            if let Some(cb) = self.callback.lock().unwrap().as_ref() {
                cb();
            }
        }
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn set_stopped_callback(&self, callback: Option<StoppedCallback>) {
        *self.callback.lock().unwrap() = callback;
    }
}

/// Source handing out a pre-scripted sequence; past the end it repeats the
/// last fix.
struct ScriptedSource {
    fixes: Vec<GpsFix>,
    index: AtomicUsize,
}

impl ScriptedSource {
    fn new(fixes: Vec<GpsFix>) -> Arc<Self> {
        Arc::new(Self {
            fixes,
            index: AtomicUsize::new(0),
        })
    }
}

impl PositionSource for ScriptedSource {
    fn read(&self) -> anyhow::Result<GpsFix> {
        let i = self.index.fetch_add(1, Ordering::Relaxed);
        Ok(self.fixes[i.min(self.fixes.len() - 1)].clone())
    }
}

fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

const ZONE_LAT: f64 = 55.75;
const ZONE_LON: f64 = 37.62;

fn stop_zone(id: i32, filename: &str) -> Frame {
    Frame {
        id,
        zone: Some(
            Zone::circle(ZONE_LAT, ZONE_LON, CourseMask::IGNORE, 300.0).unwrap(),
        ),
        media: MediaInfo::new(filename, Mode::Interrupted),
    }
}

fn inside(speed: f64) -> GpsFix {
    GpsFix::new(ZONE_LAT, ZONE_LON, speed, 90.0)
}

fn far_away(speed: f64) -> GpsFix {
    GpsFix::new(ZONE_LAT + 1.0, ZONE_LON + 1.0, speed, 90.0)
}

struct Harness {
    driver: Arc<MockDriver>,
    controller: Arc<AnnouncementController>,
    task: AnnouncementTask,
    ctx: TaskContext,
    _dir: tempfile::TempDir,
}

fn setup(fixes: Vec<GpsFix>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let route = Route::new(7, vec![stop_zone(1, "stop1.mp3")], Default::default()).unwrap();
    let handle = Arc::new(RouteHandle::with_route(Arc::new(route)));

    let driver = MockDriver::new();
    let controller = Arc::new(
        AnnouncementController::new(
            driver.clone() as Arc<dyn AudioDriver>,
            Arc::clone(&handle),
            dir.path().to_path_buf(),
        )
        .unwrap(),
    );

    let navigator = Arc::new(Navigator::new(TrackLog::for_route(
        &dir.path().join("gps.track"),
        7,
    )));

    let task = AnnouncementTask::new(
        ScriptedSource::new(fixes),
        Arc::new(GeofenceEngine::new(handle)),
        Arc::clone(&controller),
        navigator,
        AnnouncementSettings {
            min_valid_speed_kmh: 6.0,
            valid_threshold: 4,
        },
    );

    Harness {
        driver,
        controller,
        task,
        ctx: TaskContext::detached("announce-test"),
        _dir: dir,
    }
}

fn run_ticks(h: &mut Harness, n: usize) {
    for _ in 0..n {
        h.task.run_once(&h.ctx).unwrap();
    }
}

#[test]
fn threshold_needs_consecutive_usable_samples() {
    // Three usable samples, one stationary, three more usable: the counter
    // restarts and never reaches four, so nothing is accepted even though
    // the vehicle sits inside the zone the whole time.
    let mut h = setup(vec![
        inside(30.0),
        inside(30.0),
        inside(30.0),
        inside(2.0),
        inside(30.0),
        inside(30.0),
        inside(30.0),
    ]);

    run_ticks(&mut h, 7);
    std::thread::sleep(Duration::from_millis(100));
    assert!(h.driver.played().is_empty());
}

#[test]
fn fourth_consecutive_usable_sample_triggers_the_announcement() {
    let mut h = setup(vec![inside(30.0); 4]);

    run_ticks(&mut h, 4);
    assert!(wait_for(|| !h.driver.played().is_empty()));
    assert!(h.driver.played()[0].ends_with("stop1.mp3"));
}

#[test]
fn invalid_samples_reset_the_counter() {
    let mut invalid = inside(30.0);
    invalid.valid = false;

    let mut h = setup(vec![
        inside(30.0),
        inside(30.0),
        inside(30.0),
        invalid,
        inside(30.0),
    ]);

    run_ticks(&mut h, 5);
    std::thread::sleep(Duration::from_millis(100));
    assert!(h.driver.played().is_empty());
}

#[test]
fn staying_inside_announces_only_once() {
    let mut h = setup(vec![inside(30.0); 12]);

    run_ticks(&mut h, 12);
    assert!(wait_for(|| !h.driver.played().is_empty()));
    h.driver.finish();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(h.driver.played().len(), 1);
}

#[test]
fn leaving_and_returning_announces_again() {
    let mut fixes = vec![inside(30.0); 4];
    fixes.extend(vec![far_away(30.0); 4]);
    fixes.extend(vec![inside(30.0); 4]);
    let mut h = setup(fixes);

    run_ticks(&mut h, 4);
    assert!(wait_for(|| h.driver.played().len() == 1));
    h.driver.finish();

    run_ticks(&mut h, 8);
    assert!(wait_for(|| h.driver.played().len() == 2));
}

#[test]
fn frame_listener_follows_entries_and_exits() {
    let seen: Arc<Mutex<Vec<Option<i32>>>> = Arc::new(Mutex::new(Vec::new()));

    let mut fixes = vec![inside(30.0); 4];
    fixes.extend(vec![far_away(30.0); 4]);
    let mut h = setup(fixes);

    let sink = Arc::clone(&seen);
    h.task
        .set_frame_listener(Box::new(move |id| sink.lock().unwrap().push(id)));

    run_ticks(&mut h, 8);
    assert_eq!(*seen.lock().unwrap(), vec![Some(1), None]);
}

#[test]
fn processed_fixes_land_in_the_track_log() {
    let mut h = setup(vec![inside(30.0), far_away(2.0)]);
    run_ticks(&mut h, 2);

    let track = h._dir.path().join("gps7.track");
    let content = std::fs::read_to_string(track).unwrap();
    assert_eq!(content.lines().count(), 2);
    assert!(content.contains("spd: 30.00"));
    assert!(content.contains("spd: 2.00"));

    h.controller.shutdown();
}

#[test]
fn current_position_tracks_the_latest_processed_fix() {
    let mut h = setup(vec![inside(30.0), far_away(2.0)]);

    assert_eq!(h.task.current_position().0, false);

    run_ticks(&mut h, 1);
    assert_eq!(h.task.current_position(), (true, ZONE_LAT, ZONE_LON));

    run_ticks(&mut h, 1);
    assert_eq!(
        h.task.current_position(),
        (true, ZONE_LAT + 1.0, ZONE_LON + 1.0)
    );
}

#[test]
fn stop_request_ends_the_loop() {
    let mut h = setup(vec![inside(30.0)]);
    h.ctx = TaskContext::detached("announce-test");

    // No stop pending: a normal tick asks to sleep.
    assert_eq!(h.task.run_once(&h.ctx).unwrap(), Signal::Sleep);
}
